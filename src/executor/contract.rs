//! The contract between the scheduler and platform upload implementations.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::task::{PrivacyOptions, TaskRecord};

/// Everything a platform implementation needs to perform one upload attempt.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub task_id: String,
    pub platform: String,
    pub media_path: PathBuf,
    pub caption: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub privacy: PrivacyOptions,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl UploadRequest {
    /// Build a request from the task's current state.
    pub fn from_task(task: &TaskRecord) -> Self {
        Self {
            task_id: task.id.clone(),
            platform: task.platform.clone(),
            media_path: task.media_path.clone(),
            caption: task.caption.clone(),
            description: task.description.clone(),
            tags: task.tags.clone(),
            privacy: task.privacy.clone(),
            metadata: task.metadata.clone(),
        }
    }
}

/// Whether a failed attempt is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network blip, browser crash: retry per policy
    Transient,
    /// Bad credentials, unsupported format: retrying cannot help
    Permanent,
}

/// Result of one upload attempt.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub success: bool,
    pub message: String,
    pub video_id: Option<String>,
    pub url: Option<String>,
    pub failure: Option<FailureKind>,
}

impl UploadOutcome {
    /// A successful upload.
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            video_id: None,
            url: None,
            failure: None,
        }
    }

    /// Attach the platform-assigned video id and URL.
    pub fn with_result(mut self, video_id: impl Into<String>, url: impl Into<String>) -> Self {
        self.video_id = Some(video_id.into());
        self.url = Some(url.into());
        self
    }

    /// A retryable failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            video_id: None,
            url: None,
            failure: Some(FailureKind::Transient),
        }
    }

    /// A failure that no retry can fix.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            video_id: None,
            url: None,
            failure: Some(FailureKind::Permanent),
        }
    }

    /// Whether this outcome should skip the remaining retry budget.
    pub fn is_permanent(&self) -> bool {
        self.failure == Some(FailureKind::Permanent)
    }
}

/// Platform-specific upload implementation.
///
/// The scheduler treats this as opaque: it hands over a request, awaits the
/// outcome, and never looks inside. Implementations may block on browser
/// automation within their own worker context.
#[async_trait]
pub trait UploadExecutor: Send + Sync {
    /// Platform key this executor serves (e.g. "tiktok").
    fn platform(&self) -> &str;

    /// Perform one upload attempt.
    async fn upload(&self, request: UploadRequest) -> UploadOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::NewTask;

    #[test]
    fn test_outcome_succeeded() {
        let outcome = UploadOutcome::succeeded("posted").with_result("v123", "https://t.example/v123");
        assert!(outcome.success);
        assert!(outcome.failure.is_none());
        assert_eq!(outcome.video_id.as_deref(), Some("v123"));
        assert_eq!(outcome.url.as_deref(), Some("https://t.example/v123"));
    }

    #[test]
    fn test_outcome_transient() {
        let outcome = UploadOutcome::transient("connection reset");
        assert!(!outcome.success);
        assert!(!outcome.is_permanent());
        assert_eq!(outcome.failure, Some(FailureKind::Transient));
    }

    #[test]
    fn test_outcome_permanent() {
        let outcome = UploadOutcome::permanent("invalid credentials");
        assert!(!outcome.success);
        assert!(outcome.is_permanent());
    }

    #[test]
    fn test_request_from_task() {
        let task = TaskRecord::new(
            NewTask::new("tiktok", "clip.mp4", "hello world")
                .with_tags(vec!["fyp".into()])
                .with_metadata("campaign", serde_json::json!("launch")),
        );
        let request = UploadRequest::from_task(&task);
        assert_eq!(request.task_id, task.id);
        assert_eq!(request.platform, "tiktok");
        assert_eq!(request.caption, "hello world");
        assert_eq!(request.tags, vec!["fyp".to_string()]);
        assert_eq!(request.metadata["campaign"], serde_json::json!("launch"));
    }
}
