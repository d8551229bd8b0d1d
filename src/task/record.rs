//! Task record types for scheduler persistence.
//!
//! A `TaskRecord` is one request to upload a specific media file with a
//! caption to a specific platform. Records are created through the `NewTask`
//! builder and mutated only by the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::id::generate_task_id;

/// Task priority. Lower numeric value is served first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Urgent,
    High,
    Normal,
    Low,
}

impl TaskPriority {
    /// Numeric ordering key: urgent=0 .. low=3.
    pub fn value(&self) -> u8 {
        match self {
            TaskPriority::Urgent => 0,
            TaskPriority::High => 1,
            TaskPriority::Normal => 2,
            TaskPriority::Low => 3,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Urgent => "urgent",
            TaskPriority::High => "high",
            TaskPriority::Normal => "normal",
            TaskPriority::Low => "low",
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Normal
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Task status state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Has a future due-time, not yet eligible
    Scheduled,
    /// Eligible, sitting in the ready queue
    Pending,
    /// Claimed by a worker
    Running,
    /// Terminal success
    Completed,
    /// Terminal failure, attempts exhausted
    Failed,
    /// Terminal, user-requested
    Cancelled,
}

impl TaskStatus {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }

    /// Check if a task in this status may be cancelled.
    ///
    /// Running tasks cannot be cancelled; they are allowed to finish.
    pub fn can_cancel(&self) -> bool {
        matches!(self, TaskStatus::Scheduled | TaskStatus::Pending)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Visibility of the published video.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Friends,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Friends => "friends",
        }
    }
}

/// Per-upload privacy flags passed through to the platform executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrivacyOptions {
    pub visibility: Visibility,
    pub allow_comments: bool,
    pub allow_duet: bool,
    pub allow_stitch: bool,
}

impl Default for PrivacyOptions {
    fn default() -> Self {
        Self {
            visibility: Visibility::Public,
            allow_comments: true,
            allow_duet: true,
            allow_stitch: true,
        }
    }
}

/// The unit of work tracked by the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    /// Unique id, immutable for the task's lifetime
    pub id: String,

    /// Target platform key (must be registered with the scheduler)
    pub platform: String,

    /// Source media file
    pub media_path: PathBuf,

    /// Caption text posted with the video
    pub caption: String,

    /// Optional longer description
    pub description: Option<String>,

    /// Hashtags / tags
    pub tags: Vec<String>,

    /// Earliest time this task becomes eligible (None = run now)
    pub due_at: Option<DateTime<Utc>>,

    /// Ordering key among eligible tasks
    pub priority: TaskPriority,

    /// Current status
    pub status: TaskStatus,

    /// Attempts consumed so far
    pub attempts: u32,

    /// Retry budget
    pub max_attempts: u32,

    /// Error text from the most recent failed attempt
    pub last_error: Option<String>,

    /// Privacy flags for the platform executor
    pub privacy: PrivacyOptions,

    /// Free-form caller bookkeeping
    pub metadata: HashMap<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Create a record from a `NewTask`, assigning a fresh id.
    ///
    /// Initial status is `Pending` when the task is already due, `Scheduled`
    /// otherwise.
    pub fn new(spec: NewTask) -> Self {
        let now = Utc::now();
        let status = match spec.due_at {
            Some(due) if due > now => TaskStatus::Scheduled,
            _ => TaskStatus::Pending,
        };
        Self {
            id: generate_task_id(),
            platform: spec.platform,
            media_path: spec.media_path,
            caption: spec.caption,
            description: spec.description,
            tags: spec.tags,
            due_at: spec.due_at,
            priority: spec.priority,
            status,
            attempts: 0,
            max_attempts: spec.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            last_error: None,
            privacy: spec.privacy,
            metadata: spec.metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check whether the task is due at the given time.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at.map(|due| due <= now).unwrap_or(true)
    }

    /// Check whether the retry budget is exhausted.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Update the timestamp to now.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Builder for a new upload task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub platform: String,
    pub media_path: PathBuf,
    pub caption: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub priority: TaskPriority,
    /// Per-task retry budget override; None defers to the scheduler's
    /// retry policy (or `DEFAULT_MAX_ATTEMPTS` outside a scheduler).
    pub max_attempts: Option<u32>,
    pub privacy: PrivacyOptions,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Default retry budget when the caller doesn't specify one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

impl NewTask {
    pub fn new(platform: impl Into<String>, media_path: impl Into<PathBuf>, caption: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            media_path: media_path.into(),
            caption: caption.into(),
            description: None,
            tags: Vec::new(),
            due_at: None,
            priority: TaskPriority::Normal,
            max_attempts: None,
            privacy: PrivacyOptions::default(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_privacy(mut self, privacy: PrivacyOptions) -> Self {
        self.privacy = privacy;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_priority_ordering() {
        assert!(TaskPriority::Urgent < TaskPriority::High);
        assert!(TaskPriority::High < TaskPriority::Normal);
        assert!(TaskPriority::Normal < TaskPriority::Low);
    }

    #[test]
    fn test_priority_values() {
        assert_eq!(TaskPriority::Urgent.value(), 0);
        assert_eq!(TaskPriority::High.value(), 1);
        assert_eq!(TaskPriority::Normal.value(), 2);
        assert_eq!(TaskPriority::Low.value(), 3);
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(TaskStatus::Scheduled.as_str(), "scheduled");
        assert_eq!(TaskStatus::Pending.as_str(), "pending");
        assert_eq!(TaskStatus::Running.as_str(), "running");
        assert_eq!(TaskStatus::Cancelled.as_str(), "cancelled");
    }

    #[test]
    fn test_status_is_terminal() {
        assert!(!TaskStatus::Scheduled.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_can_cancel() {
        assert!(TaskStatus::Scheduled.can_cancel());
        assert!(TaskStatus::Pending.can_cancel());
        assert!(!TaskStatus::Running.can_cancel());
        assert!(!TaskStatus::Completed.can_cancel());
        assert!(!TaskStatus::Failed.can_cancel());
        assert!(!TaskStatus::Cancelled.can_cancel());
    }

    #[test]
    fn test_new_task_without_due_time_is_pending() {
        let record = TaskRecord::new(NewTask::new("tiktok", "a.mp4", "hello"));
        assert_eq!(record.status, TaskStatus::Pending);
        assert_eq!(record.attempts, 0);
        assert_eq!(record.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(record.last_error.is_none());
        assert!(record.is_due(Utc::now()));
    }

    #[test]
    fn test_new_task_with_future_due_time_is_scheduled() {
        let due = Utc::now() + Duration::hours(2);
        let record = TaskRecord::new(NewTask::new("tiktok", "a.mp4", "hello").with_due_at(due));
        assert_eq!(record.status, TaskStatus::Scheduled);
        assert!(!record.is_due(Utc::now()));
        assert!(record.is_due(due));
    }

    #[test]
    fn test_new_task_with_past_due_time_is_pending() {
        let due = Utc::now() - Duration::minutes(5);
        let record = TaskRecord::new(NewTask::new("tiktok", "a.mp4", "hello").with_due_at(due));
        assert_eq!(record.status, TaskStatus::Pending);
    }

    #[test]
    fn test_builder_fields() {
        let record = TaskRecord::new(
            NewTask::new("instagram", "clip.mp4", "caption")
                .with_description("longer text")
                .with_tags(vec!["fyp".into(), "rust".into()])
                .with_priority(TaskPriority::High)
                .with_max_attempts(5)
                .with_metadata("campaign", serde_json::json!("spring")),
        );
        assert_eq!(record.platform, "instagram");
        assert_eq!(record.description.as_deref(), Some("longer text"));
        assert_eq!(record.tags.len(), 2);
        assert_eq!(record.priority, TaskPriority::High);
        assert_eq!(record.max_attempts, 5);
        assert_eq!(record.metadata["campaign"], serde_json::json!("spring"));
    }

    #[test]
    fn test_attempts_exhausted() {
        let mut record = TaskRecord::new(NewTask::new("tiktok", "a.mp4", "x").with_max_attempts(2));
        assert!(!record.attempts_exhausted());
        record.attempts = 2;
        assert!(record.attempts_exhausted());
    }

    #[test]
    fn test_privacy_defaults() {
        let privacy = PrivacyOptions::default();
        assert_eq!(privacy.visibility, Visibility::Public);
        assert!(privacy.allow_comments);
        assert!(privacy.allow_duet);
        assert!(privacy.allow_stitch);
    }

    #[test]
    fn test_record_serialization_roundtrip() {
        let due = Utc::now() + Duration::hours(1);
        let mut record = TaskRecord::new(
            NewTask::new("tiktok", "a.mp4", "hello")
                .with_due_at(due)
                .with_priority(TaskPriority::Urgent)
                .with_metadata("batch", serde_json::json!(7)),
        );
        record.attempts = 2;
        record.last_error = Some("timeout".into());

        let json = serde_json::to_string(&record).unwrap();
        let restored: TaskRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(record, restored);
    }

    #[test]
    fn test_enums_serialize_as_stable_names() {
        let json = serde_json::to_string(&TaskStatus::Scheduled).unwrap();
        assert_eq!(json, "\"scheduled\"");
        let json = serde_json::to_string(&TaskPriority::Urgent).unwrap();
        assert_eq!(json, "\"urgent\"");
        let json = serde_json::to_string(&Visibility::Friends).unwrap();
        assert_eq!(json, "\"friends\"");
    }

    #[test]
    fn test_touch_updates_timestamp() {
        let mut record = TaskRecord::new(NewTask::new("tiktok", "a.mp4", "x"));
        let original = record.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        record.touch();
        assert!(record.updated_at > original);
    }
}
