//! Typed registry of platform executors.
//!
//! Platform dispatch goes through this registry rather than duck-typed
//! lookups; a task whose platform key has no registered executor is rejected
//! at `add_task` time.

use std::collections::HashMap;
use std::sync::Arc;

use super::contract::UploadExecutor;

/// Maps platform keys to their upload implementations.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn UploadExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under its own platform key.
    pub fn register(mut self, executor: Arc<dyn UploadExecutor>) -> Self {
        self.executors.insert(executor.platform().to_string(), executor);
        self
    }

    /// Look up the executor for a platform key.
    pub fn get(&self, platform: &str) -> Option<Arc<dyn UploadExecutor>> {
        self.executors.get(platform).cloned()
    }

    /// Check whether a platform key is registered.
    pub fn contains(&self, platform: &str) -> bool {
        self.executors.contains_key(platform)
    }

    /// Registered platform keys.
    pub fn platforms(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.executors.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}
