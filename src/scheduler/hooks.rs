//! Lifecycle hooks fired at task transition points.
//!
//! Hook errors are logged at the call site and never abort the worker loop.

use crate::error::Result;
use crate::task::TaskRecord;

/// Observer for task lifecycle transitions.
///
/// All methods default to no-ops; implement the ones you care about.
/// Hooks run on the worker's context, so keep them fast: a notification
/// send or a counter bump, not another upload.
pub trait TaskHooks: Send + Sync {
    /// Called when a worker claims the task, before the executor runs.
    fn on_task_start(&self, _task: &TaskRecord) -> Result<()> {
        Ok(())
    }

    /// Called after an attempt finishes; `success` reflects the outcome.
    fn on_task_complete(&self, _task: &TaskRecord, _success: bool) -> Result<()> {
        Ok(())
    }

    /// Called once when the task lands in terminal failure.
    fn on_task_fail(&self, _task: &TaskRecord) -> Result<()> {
        Ok(())
    }
}

/// Default hooks that do nothing.
pub struct NoopHooks;

impl TaskHooks for NoopHooks {}
