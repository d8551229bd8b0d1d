//! Schedule book and planner tick.
//!
//! The `ScheduleBook` persists schedules together with the used-media and
//! used-caption sets, same temp-then-rename snapshot discipline as the task
//! store. The `Planner` owns a book and, on each tick, fires every due
//! schedule: pick an unused media file, pair it with an unused caption, and
//! hand the pair to the scheduler as a normal task.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::error::{Result, UploadrError};
use crate::recurring::schedule::{ScheduleKind, UploadSchedule};
use crate::scheduler::Scheduler;
use crate::task::{NewTask, TaskStatus};

const MEDIA_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm"];

#[derive(Debug, Default, Serialize, Deserialize)]
struct BookState {
    schedules: HashMap<String, UploadSchedule>,
    used_media: HashSet<String>,
    used_captions: HashSet<String>,
}

/// File-backed collection of schedules plus selection history.
#[derive(Debug)]
pub struct ScheduleBook {
    path: PathBuf,
    state: BookState,
}

impl ScheduleBook {
    /// Open or create the book at `<base_dir>/schedules.json`.
    pub fn open_at(base_dir: &Path) -> Result<Self> {
        fs::create_dir_all(base_dir)?;
        let path = base_dir.join("schedules.json");
        let state = if path.exists() {
            let json = fs::read_to_string(&path)?;
            serde_json::from_str(&json).map_err(|e| {
                UploadrError::Storage(format!("corrupt schedule book {}: {}", path.display(), e))
            })?
        } else {
            BookState::default()
        };
        Ok(Self { path, state })
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.state)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// Drives recurring schedules against a scheduler.
#[derive(Debug)]
pub struct Planner {
    book: ScheduleBook,
}

impl Planner {
    /// Open or create the planner's book under `base_dir`.
    pub fn open_at(base_dir: &Path) -> Result<Self> {
        Ok(Self {
            book: ScheduleBook::open_at(base_dir)?,
        })
    }

    /// Add a schedule and persist the book. Returns the schedule id.
    pub fn create_schedule(&mut self, schedule: UploadSchedule) -> Result<String> {
        let id = schedule.id.clone();
        tracing::info!(schedule_id = %id, name = %schedule.name, "Created schedule");
        self.book.state.schedules.insert(id.clone(), schedule);
        self.book.save()?;
        Ok(id)
    }

    /// Remove a schedule. Returns false for unknown ids.
    pub fn delete_schedule(&mut self, id: &str) -> Result<bool> {
        if self.book.state.schedules.remove(id).is_none() {
            return Ok(false);
        }
        self.book.save()?;
        tracing::info!(schedule_id = %id, "Deleted schedule");
        Ok(true)
    }

    /// Enable or disable a schedule. Returns false for unknown ids.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<bool> {
        let Some(schedule) = self.book.state.schedules.get_mut(id) else {
            return Ok(false);
        };
        schedule.enabled = enabled;
        self.book.save()?;
        Ok(true)
    }

    pub fn get_schedule(&self, id: &str) -> Option<&UploadSchedule> {
        self.book.state.schedules.get(id)
    }

    pub fn schedules(&self) -> impl Iterator<Item = &UploadSchedule> {
        self.book.state.schedules.values()
    }

    /// Check every schedule against `now` and create a task for each one
    /// that is due. Returns how many tasks were created.
    ///
    /// Callers drive this on an interval (a minute matches slot granularity).
    pub fn tick(&mut self, scheduler: &Scheduler, now: DateTime<Utc>) -> Result<usize> {
        let due: Vec<String> = self
            .book
            .state
            .schedules
            .values()
            .filter(|s| s.should_fire(now))
            .map(|s| s.id.clone())
            .collect();

        let mut fired = 0;
        for id in due {
            match self.fire(scheduler, &id, now) {
                Ok(true) => fired += 1,
                Ok(false) => {}
                Err(e) => {
                    // One misbehaving schedule must not starve the rest
                    tracing::error!(schedule_id = %id, error = %e, "Scheduled upload failed");
                }
            }
        }
        Ok(fired)
    }

    fn fire(&mut self, scheduler: &Scheduler, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let schedule = match self.book.state.schedules.get(id) {
            Some(s) => s.clone(),
            None => return Ok(false),
        };

        if schedule.kind == ScheduleKind::Daily
            && count_today_tasks(scheduler, &schedule.platform, now) >= schedule.max_per_day as usize
        {
            tracing::warn!(
                schedule_id = %id,
                platform = %schedule.platform,
                cap = schedule.max_per_day,
                "Daily task cap reached, skipping slot"
            );
            return Ok(false);
        }

        let Some(media) = self.select_media(&schedule.media_dir) else {
            tracing::warn!(schedule_id = %id, dir = %schedule.media_dir.display(), "No media available for schedule");
            return Ok(false);
        };

        let pool_caption = match &schedule.captions_file {
            Some(path) => self.select_caption(path),
            None => None,
        };
        let caption = pool_caption
            .clone()
            .unwrap_or_else(|| format!("Auto upload {}", now.format("%Y-%m-%d %H:%M")));

        let task_id = scheduler.add_task(
            NewTask::new(&schedule.platform, &media, &caption)
                .with_priority(schedule.priority)
                .with_metadata("schedule_id", serde_json::json!(schedule.id))
                .with_metadata("schedule_name", serde_json::json!(schedule.name))
                .with_metadata("auto_selected", serde_json::json!(true)),
        )?;

        // Selections count as used only once the task actually exists
        self.book
            .state
            .used_media
            .insert(media.to_string_lossy().to_string());
        if let Some(caption) = pool_caption {
            self.book.state.used_captions.insert(caption);
        }
        if let Some(entry) = self.book.state.schedules.get_mut(id) {
            entry.last_run = Some(now);
        }
        self.book.save()?;

        tracing::info!(
            schedule_id = %id,
            task_id = %task_id,
            media = %media.display(),
            caption = %caption,
            "Created task from schedule"
        );
        Ok(true)
    }

    /// Pick a random unused media file from the directory. When every
    /// candidate has been used the history resets and selection starts over.
    /// The pick is not marked used here; `fire` records it after the task
    /// is created, so a failed creation does not burn the entry.
    fn select_media(&mut self, dir: &Path) -> Option<PathBuf> {
        let mut candidates = Vec::new();
        for ext in MEDIA_EXTENSIONS {
            let pattern = format!("{}/*.{}", dir.display(), ext);
            let Ok(paths) = glob::glob(&pattern) else {
                continue;
            };
            candidates.extend(paths.flatten());
        }
        if candidates.is_empty() {
            return None;
        }

        let mut available: Vec<&PathBuf> = candidates
            .iter()
            .filter(|p| !self.book.state.used_media.contains(&p.to_string_lossy().to_string()))
            .collect();
        if available.is_empty() {
            tracing::info!(dir = %dir.display(), "All media used, resetting selection history");
            self.book.state.used_media.clear();
            available = candidates.iter().collect();
        }

        available.choose(&mut rand::rng()).map(|p| (*p).clone())
    }

    /// Pick a random unused caption line, resetting history when exhausted.
    fn select_caption(&mut self, path: &Path) -> Option<String> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Cannot read captions file");
                return None;
            }
        };
        let all: Vec<&str> = content.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if all.is_empty() {
            return None;
        }

        let mut available: Vec<&&str> = all
            .iter()
            .filter(|c| !self.book.state.used_captions.contains(**c))
            .collect();
        if available.is_empty() {
            tracing::info!(file = %path.display(), "All captions used, resetting selection history");
            self.book.state.used_captions.clear();
            available = all.iter().collect();
        }

        available.choose(&mut rand::rng()).map(|c| (**c).to_string())
    }
}

/// Tasks created today for a platform that still count against the cap.
fn count_today_tasks(scheduler: &Scheduler, platform: &str, now: DateTime<Utc>) -> usize {
    let today = now.date_naive();
    scheduler
        .get_all_tasks(None)
        .iter()
        .filter(|t| {
            t.platform == platform
                && t.created_at.date_naive() == today
                && matches!(
                    t.status,
                    TaskStatus::Pending | TaskStatus::Running | TaskStatus::Completed
                )
        })
        .count()
}
