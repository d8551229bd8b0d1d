//! Uploadr - task scheduling and retry for social video auto-posting
//!
//! Uploadr queues upload tasks with priorities and due-times, runs them on a
//! bounded worker pool, retries transient failures with backoff, and persists
//! every state change so a restart resumes where the previous run left off.

pub mod config;
pub mod error;
pub mod executor;
pub mod id;
pub mod recurring;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod task;

pub use error::{Result, UploadrError};
