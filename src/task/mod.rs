//! Task model for the upload scheduler.
//!
//! One `TaskRecord` = one request to upload a specific media item with a
//! caption to a specific platform.

mod record;

pub use record::{
    DEFAULT_MAX_ATTEMPTS, NewTask, PrivacyOptions, TaskPriority, TaskRecord, TaskStatus, Visibility,
};
