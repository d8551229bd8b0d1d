//! Error types for uploadr
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in uploadr
#[derive(Debug, Error)]
pub enum UploadrError {
    /// Task not found in the task table
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Task rejected at validation time
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// No executor registered for the platform key
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for uploadr operations
pub type Result<T> = std::result::Result<T, UploadrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_not_found_error() {
        let err = UploadrError::TaskNotFound("abc123".to_string());
        assert_eq!(err.to_string(), "Task not found: abc123");
    }

    #[test]
    fn test_invalid_task_error() {
        let err = UploadrError::InvalidTask("empty platform key".to_string());
        assert_eq!(err.to_string(), "Invalid task: empty platform key");
    }

    #[test]
    fn test_unknown_platform_error() {
        let err = UploadrError::UnknownPlatform("myspace".to_string());
        assert_eq!(err.to_string(), "Unknown platform: myspace");
    }

    #[test]
    fn test_storage_error() {
        let err = UploadrError::Storage("state file locked".to_string());
        assert_eq!(err.to_string(), "Storage error: state file locked");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: UploadrError = io_err.into();
        assert!(matches!(err, UploadrError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: UploadrError = json_err.into();
        assert!(matches!(err, UploadrError::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(UploadrError::InvalidState("test".to_string()))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
