//! Recurring upload schedules.
//!
//! A schedule names a platform, a set of wall-clock upload times, and the
//! weekdays it applies to. The planner checks each schedule once per tick
//! and creates an upload task for every slot whose time has arrived.

use std::path::PathBuf;

use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::id::generate_schedule_id;
use crate::task::TaskPriority;

/// How a schedule repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    /// Fires at the first matching slot, then never again.
    Once,
    /// Fires at every matching slot, bounded by the per-day cap.
    Daily,
    /// Fires at matching slots on the listed weekdays only.
    Weekly,
}

impl ScheduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleKind::Once => "once",
            ScheduleKind::Daily => "daily",
            ScheduleKind::Weekly => "weekly",
        }
    }
}

/// A recurring upload schedule.
///
/// Weekdays use 0 = Monday through 6 = Sunday. Times are minute-granular:
/// a slot matches when the current hour and minute equal the slot's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSchedule {
    pub id: String,
    pub name: String,
    pub platform: String,
    pub kind: ScheduleKind,
    pub upload_times: Vec<NaiveTime>,
    pub days_of_week: Vec<u8>,
    pub enabled: bool,
    /// Directory scanned for candidate media files.
    pub media_dir: PathBuf,
    /// Optional newline-separated caption pool.
    pub captions_file: Option<PathBuf>,
    pub max_per_day: u32,
    pub priority: TaskPriority,
    pub created_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
}

pub const DEFAULT_MAX_PER_DAY: u32 = 5;

impl UploadSchedule {
    pub fn new(
        name: impl Into<String>,
        platform: impl Into<String>,
        kind: ScheduleKind,
        upload_times: Vec<NaiveTime>,
        media_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: generate_schedule_id(),
            name: name.into(),
            platform: platform.into(),
            kind,
            upload_times,
            days_of_week: (0..7).collect(),
            enabled: true,
            media_dir: media_dir.into(),
            captions_file: None,
            max_per_day: DEFAULT_MAX_PER_DAY,
            priority: TaskPriority::Normal,
            created_at: Utc::now(),
            last_run: None,
        }
    }

    pub fn with_days_of_week(mut self, days: Vec<u8>) -> Self {
        self.days_of_week = days;
        self
    }

    pub fn with_captions_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.captions_file = Some(path.into());
        self
    }

    pub fn with_max_per_day(mut self, max_per_day: u32) -> Self {
        self.max_per_day = max_per_day;
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Whether this schedule should fire at `now`.
    ///
    /// True when the schedule is enabled, today's weekday is listed, `now`
    /// falls on one of the upload times (minute granularity), and the same
    /// slot has not already fired today. A once schedule never fires twice.
    pub fn should_fire(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        if self.kind == ScheduleKind::Once && self.last_run.is_some() {
            return false;
        }

        let weekday = now.weekday().num_days_from_monday() as u8;
        if !self.days_of_week.contains(&weekday) {
            return false;
        }

        let matches_slot = self
            .upload_times
            .iter()
            .any(|t| t.hour() == now.hour() && t.minute() == now.minute());
        if !matches_slot {
            return false;
        }

        if let Some(last) = self.last_run {
            let same_day = last.date_naive() == now.date_naive();
            let same_slot = last.hour() == now.hour() && last.minute() == now.minute();
            if same_day && same_slot {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn slot(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn daily_at_noon() -> UploadSchedule {
        UploadSchedule::new("noon drop", "tiktok", ScheduleKind::Daily, vec![slot(12, 0)], "/media")
    }

    #[test]
    fn test_fires_on_matching_slot() {
        let schedule = daily_at_noon();
        // 2026-01-05 is a Monday
        assert!(schedule.should_fire(at(2026, 1, 5, 12, 0)));
    }

    #[test]
    fn test_does_not_fire_off_slot() {
        let schedule = daily_at_noon();
        assert!(!schedule.should_fire(at(2026, 1, 5, 12, 1)));
        assert!(!schedule.should_fire(at(2026, 1, 5, 11, 59)));
    }

    #[test]
    fn test_disabled_never_fires() {
        let schedule = daily_at_noon().disabled();
        assert!(!schedule.should_fire(at(2026, 1, 5, 12, 0)));
    }

    #[test]
    fn test_weekday_restriction() {
        // Monday and Wednesday only
        let schedule = daily_at_noon().with_days_of_week(vec![0, 2]);
        assert!(schedule.should_fire(at(2026, 1, 5, 12, 0))); // Monday
        assert!(!schedule.should_fire(at(2026, 1, 6, 12, 0))); // Tuesday
        assert!(schedule.should_fire(at(2026, 1, 7, 12, 0))); // Wednesday
    }

    #[test]
    fn test_same_slot_not_refired_same_day() {
        let mut schedule = daily_at_noon();
        let noon = at(2026, 1, 5, 12, 0);
        assert!(schedule.should_fire(noon));
        schedule.last_run = Some(noon);
        assert!(!schedule.should_fire(noon));
        // Next day the same slot fires again
        assert!(schedule.should_fire(at(2026, 1, 6, 12, 0)));
    }

    #[test]
    fn test_multiple_slots_same_day() {
        let mut schedule = UploadSchedule::new(
            "twice",
            "tiktok",
            ScheduleKind::Daily,
            vec![slot(9, 0), slot(18, 0)],
            "/media",
        );
        let morning = at(2026, 1, 5, 9, 0);
        assert!(schedule.should_fire(morning));
        schedule.last_run = Some(morning);
        // The evening slot still fires even though one ran today
        assert!(schedule.should_fire(at(2026, 1, 5, 18, 0)));
    }

    #[test]
    fn test_once_fires_only_once() {
        let mut schedule =
            UploadSchedule::new("one-shot", "tiktok", ScheduleKind::Once, vec![slot(12, 0)], "/media");
        let noon = at(2026, 1, 5, 12, 0);
        assert!(schedule.should_fire(noon));
        schedule.last_run = Some(noon);
        assert!(!schedule.should_fire(at(2026, 1, 6, 12, 0)));
    }

    #[test]
    fn test_schedule_id_prefix() {
        let schedule = daily_at_noon();
        assert!(schedule.id.starts_with("sched-"));
    }

    #[test]
    fn test_kind_serde_names() {
        assert_eq!(serde_json::to_string(&ScheduleKind::Weekly).unwrap(), "\"weekly\"");
        let kind: ScheduleKind = serde_json::from_str("\"once\"").unwrap();
        assert_eq!(kind, ScheduleKind::Once);
    }
}
