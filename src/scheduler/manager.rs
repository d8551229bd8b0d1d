//! Upload task scheduler.
//!
//! The scheduler owns the task table and its lifecycle: it accepts tasks,
//! promotes due scheduled ones into the ready queue on a sweep interval,
//! dispatches to a fixed pool of workers, applies the retry policy on
//! failure, and persists the full task set after every mutation.
//!
//! One mutex guards the table; it is held for state transitions and queue
//! bookkeeping only, never across an executor call.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::error::{Result, UploadrError};
use crate::executor::{ExecutorRegistry, UploadOutcome, UploadRequest};
use crate::retry::RetryPolicy;
use crate::scheduler::hooks::{NoopHooks, TaskHooks};
use crate::scheduler::queue::ReadyQueue;
use crate::store::TaskStore;
use crate::task::{NewTask, TaskRecord, TaskStatus};

/// Configuration for the Scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Instance name carried as a field on every log event.
    pub name: String,
    /// Fixed worker pool size; the backpressure mechanism.
    pub workers: usize,
    /// How long an idle worker sleeps between queue polls.
    pub poll_interval: Duration,
    /// How often the sweep promotes due scheduled tasks.
    pub promotion_interval: Duration,
    /// How long `stop` waits for each worker before aborting it.
    pub stop_timeout: Duration,
    /// Optional bound on a single executor attempt (None = unbounded).
    pub attempt_timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: "uploadr".to_string(),
            workers: 2,
            poll_interval: Duration::from_secs(1),
            promotion_interval: Duration::from_secs(30),
            stop_timeout: Duration::from_secs(5),
            attempt_timeout: None,
        }
    }
}

impl SchedulerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_promotion_interval(mut self, interval: Duration) -> Self {
        self.promotion_interval = interval;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }
}

/// Read-only snapshot of queue and status counts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub scheduled: usize,
    pub queue_size: usize,
    pub running_workers: usize,
}

/// Task table plus queue membership, guarded by one lock.
#[derive(Default)]
struct TaskTable {
    tasks: HashMap<String, TaskRecord>,
    queue: ReadyQueue,
    in_flight: HashSet<String>,
}

struct Shared {
    config: SchedulerConfig,
    retry: RetryPolicy,
    registry: ExecutorRegistry,
    hooks: Arc<dyn TaskHooks>,
    table: Mutex<TaskTable>,
    store: Mutex<TaskStore>,
    running: AtomicBool,
}

/// Builder for a `Scheduler`.
pub struct SchedulerBuilder {
    store: TaskStore,
    registry: ExecutorRegistry,
    config: SchedulerConfig,
    retry: RetryPolicy,
    hooks: Arc<dyn TaskHooks>,
}

impl SchedulerBuilder {
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn TaskHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn build(self) -> Scheduler {
        Scheduler {
            shared: Arc::new(Shared {
                config: self.config,
                retry: self.retry,
                registry: self.registry,
                hooks: self.hooks,
                table: Mutex::new(TaskTable::default()),
                store: Mutex::new(self.store),
                running: AtomicBool::new(false),
            }),
            handles: Mutex::new(Vec::new()),
        }
    }
}

/// The task scheduler.
pub struct Scheduler {
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler with default config, retry policy, and no-op hooks.
    pub fn new(store: TaskStore, registry: ExecutorRegistry) -> Self {
        Self::builder(store, registry).build()
    }

    /// Start building a scheduler.
    pub fn builder(store: TaskStore, registry: ExecutorRegistry) -> SchedulerBuilder {
        SchedulerBuilder {
            store,
            registry,
            config: SchedulerConfig::default(),
            retry: RetryPolicy::default(),
            hooks: Arc::new(NoopHooks),
        }
    }

    /// Whether workers are currently running.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Add a task. Never blocks on the executor.
    ///
    /// The task is persisted immediately and, when already due, enqueued for
    /// the next free worker. Returns the new task id.
    pub fn add_task(&self, spec: NewTask) -> Result<String> {
        let mut spec = spec;
        if spec.platform.trim().is_empty() {
            return Err(UploadrError::InvalidTask("platform key is empty".to_string()));
        }
        if !self.shared.registry.contains(&spec.platform) {
            return Err(UploadrError::UnknownPlatform(spec.platform));
        }
        if spec.media_path.as_os_str().is_empty() {
            return Err(UploadrError::InvalidTask("media path is empty".to_string()));
        }

        // Tasks without their own budget inherit the retry policy's
        if spec.max_attempts.is_none() {
            spec.max_attempts = Some(self.shared.retry.max_attempts);
        }

        let record = TaskRecord::new(spec);
        let id = record.id.clone();

        {
            let mut table = self.shared.table.lock().unwrap();
            if record.status == TaskStatus::Pending {
                table.queue.enqueue(&record);
                tracing::info!(
                    scheduler = %self.shared.config.name,
                    task_id = %id,
                    platform = %record.platform,
                    priority = %record.priority,
                    "Task added to queue immediately"
                );
            } else {
                tracing::info!(
                    scheduler = %self.shared.config.name,
                    task_id = %id,
                    platform = %record.platform,
                    due_at = ?record.due_at,
                    "Task scheduled for later"
                );
            }
            table.tasks.insert(id.clone(), record);
        }

        self.shared.persist()?;
        Ok(id)
    }

    /// Cancel a task.
    ///
    /// Returns false for unknown ids, running tasks (an in-flight upload
    /// cannot be cancelled, only allowed to finish), and terminal tasks.
    pub fn cancel_task(&self, id: &str) -> bool {
        let cancelled = {
            let mut table = self.shared.table.lock().unwrap();
            match table.tasks.get_mut(id) {
                Some(task) if task.status.can_cancel() => {
                    task.status = TaskStatus::Cancelled;
                    task.touch();
                    true
                }
                Some(task) => {
                    tracing::warn!(
                        scheduler = %self.shared.config.name,
                        task_id = %id,
                        status = %task.status,
                        "Cannot cancel task in this status"
                    );
                    false
                }
                None => false,
            }
        };

        if cancelled {
            tracing::info!(scheduler = %self.shared.config.name, task_id = %id, "Task cancelled");
            if let Err(e) = self.shared.persist() {
                tracing::error!(scheduler = %self.shared.config.name, error = %e, "Failed to persist after cancel");
            }
        }
        cancelled
    }

    /// Current status of a task, or None for unknown ids.
    pub fn get_task_status(&self, id: &str) -> Option<TaskStatus> {
        let table = self.shared.table.lock().unwrap();
        table.tasks.get(id).map(|t| t.status)
    }

    /// Snapshot of a task's full record.
    pub fn get_task(&self, id: &str) -> Result<TaskRecord> {
        let table = self.shared.table.lock().unwrap();
        table
            .tasks
            .get(id)
            .cloned()
            .ok_or_else(|| UploadrError::TaskNotFound(id.to_string()))
    }

    /// Snapshots of all tasks, optionally filtered by status.
    pub fn get_all_tasks(&self, status_filter: Option<TaskStatus>) -> Vec<TaskRecord> {
        let table = self.shared.table.lock().unwrap();
        table
            .tasks
            .values()
            .filter(|t| status_filter.map(|s| t.status == s).unwrap_or(true))
            .cloned()
            .collect()
    }

    /// Consistent snapshot of queue and status counts.
    pub fn get_queue_stats(&self) -> QueueStats {
        let table = self.shared.table.lock().unwrap();
        let mut stats = QueueStats {
            total: table.tasks.len(),
            queue_size: table.queue.len(),
            running_workers: table.in_flight.len(),
            ..QueueStats::default()
        };
        for task in table.tasks.values() {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Running => stats.running += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Failed => stats.failed += 1,
                TaskStatus::Scheduled => stats.scheduled += 1,
                TaskStatus::Cancelled => {}
            }
        }
        stats
    }

    /// Load persisted state and spin up the worker pool and promotion sweep.
    ///
    /// Tasks found persisted as running are treated as crashed-in-flight and
    /// demoted to pending so a worker can reclaim them.
    pub fn start(&self) -> Result<()> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            tracing::warn!(scheduler = %self.shared.config.name, "Scheduler already running");
            return Ok(());
        }

        let loaded = match self.shared.store.lock().unwrap().load() {
            Ok(tasks) => tasks,
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let recovered = {
            let mut table = self.shared.table.lock().unwrap();
            let mut recovered = 0;
            for mut task in loaded {
                if task.status == TaskStatus::Running {
                    task.status = TaskStatus::Pending;
                    task.touch();
                    recovered += 1;
                }
                if task.status == TaskStatus::Pending {
                    table.queue.enqueue(&task);
                }
                table.tasks.insert(task.id.clone(), task);
            }
            recovered
        };
        if recovered > 0 {
            tracing::warn!(
                scheduler = %self.shared.config.name,
                recovered,
                "Recovered tasks left running by a previous crash"
            );
            self.shared.persist()?;
        }

        let mut handles = self.handles.lock().unwrap();
        for worker in 0..self.shared.config.workers {
            let shared = self.shared.clone();
            handles.push(tokio::spawn(async move { worker_loop(shared, worker).await }));
        }
        let shared = self.shared.clone();
        handles.push(tokio::spawn(async move { sweep_loop(shared).await }));

        tracing::info!(
            scheduler = %self.shared.config.name,
            workers = self.shared.config.workers,
            "Scheduler started"
        );
        Ok(())
    }

    /// Signal workers to exit their poll loop, join them with a bounded
    /// timeout, and flush state.
    pub async fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let drained: Vec<JoinHandle<()>> = {
            let mut handles = self.handles.lock().unwrap();
            handles.drain(..).collect()
        };
        for mut handle in drained {
            if tokio::time::timeout(self.shared.config.stop_timeout, &mut handle).await.is_err() {
                tracing::warn!(scheduler = %self.shared.config.name, "Worker did not stop in time, aborting");
                handle.abort();
            }
        }

        if let Err(e) = self.shared.persist() {
            tracing::error!(scheduler = %self.shared.config.name, error = %e, "Final state flush failed");
        }
        tracing::info!(scheduler = %self.shared.config.name, "Scheduler stopped");
    }

    /// Promote due scheduled tasks into the ready queue.
    ///
    /// Exposed for tests; normally driven by the sweep loop.
    pub fn promote_due(&self) -> usize {
        self.shared.promote_due()
    }
}

impl Shared {
    /// Write-through: snapshot the table and save it atomically.
    fn persist(&self) -> Result<()> {
        let tasks: Vec<TaskRecord> = {
            let table = self.table.lock().unwrap();
            table.tasks.values().cloned().collect()
        };
        self.store.lock().unwrap().save(&tasks)
    }

    fn persist_logged(&self) {
        if let Err(e) = self.persist() {
            tracing::error!(scheduler = %self.config.name, error = %e, "Failed to persist scheduler state");
        }
    }

    /// Claim the next runnable task: pop queue entries until one maps to a
    /// task that is still pending, transition it to running, and bump its
    /// attempt count, all under the lock.
    fn claim_next(&self) -> Option<TaskRecord> {
        let mut table = self.table.lock().unwrap();
        loop {
            let id = table.queue.pop()?;
            let Some(task) = table.tasks.get_mut(&id) else {
                continue;
            };
            // A task may have been cancelled while queued; skip it without
            // invoking the executor.
            if task.status != TaskStatus::Pending {
                continue;
            }
            task.status = TaskStatus::Running;
            task.attempts += 1;
            task.touch();
            let claimed = task.clone();
            table.in_flight.insert(id);
            return Some(claimed);
        }
    }

    fn promote_due(&self) -> usize {
        let now = Utc::now();
        let promoted = {
            let mut table = self.table.lock().unwrap();
            let TaskTable { tasks, queue, .. } = &mut *table;
            let mut promoted = 0;
            for task in tasks.values_mut() {
                if task.status == TaskStatus::Scheduled && task.is_due(now) {
                    task.status = TaskStatus::Pending;
                    task.touch();
                    queue.enqueue(task);
                    promoted += 1;
                }
            }
            promoted
        };
        if promoted > 0 {
            tracing::debug!(scheduler = %self.config.name, promoted, "Promoted due tasks to pending");
            self.persist_logged();
        }
        promoted
    }

    /// Run one attempt for a claimed task and apply the outcome.
    async fn run_attempt(&self, claimed: TaskRecord) {
        self.persist_logged();

        if let Err(e) = self.hooks.on_task_start(&claimed) {
            tracing::warn!(scheduler = %self.config.name, task_id = %claimed.id, error = %e, "on_task_start hook failed");
        }
        tracing::info!(
            scheduler = %self.config.name,
            task_id = %claimed.id,
            platform = %claimed.platform,
            attempt = claimed.attempts,
            max_attempts = claimed.max_attempts,
            "Starting upload attempt"
        );

        let outcome = self.execute(&claimed).await;
        self.apply_outcome(&claimed.id, outcome);
    }

    /// Invoke the executor outside the lock, containing panics and applying
    /// the per-attempt timeout when configured.
    async fn execute(&self, task: &TaskRecord) -> UploadOutcome {
        let Some(executor) = self.registry.get(&task.platform) else {
            // Registry is fixed at construction, so this means the task was
            // persisted by an instance with a different registry.
            return UploadOutcome::permanent(format!("no executor registered for platform {}", task.platform));
        };

        let request = UploadRequest::from_task(task);
        let attempt = std::panic::AssertUnwindSafe(executor.upload(request)).catch_unwind();

        let caught = match self.config.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, attempt).await {
                Ok(caught) => caught,
                Err(_) => {
                    return UploadOutcome::transient(format!("attempt timed out after {:.1}s", limit.as_secs_f64()));
                }
            },
            None => attempt.await,
        };

        match caught {
            Ok(outcome) => outcome,
            Err(_) => UploadOutcome::transient("executor panicked".to_string()),
        }
    }

    /// Apply the attempt outcome under the lock and fire hooks after it is
    /// released. The in-flight entry is removed on every path.
    fn apply_outcome(&self, id: &str, outcome: UploadOutcome) {
        let applied = {
            let mut table = self.table.lock().unwrap();
            table.in_flight.remove(id);
            let Some(task) = table.tasks.get_mut(id) else {
                return;
            };

            if outcome.success {
                task.status = TaskStatus::Completed;
                task.last_error = None;
            } else {
                task.last_error = Some(outcome.message.clone());
                if outcome.is_permanent() || task.attempts_exhausted() {
                    task.status = TaskStatus::Failed;
                } else {
                    let delay = self.retry.delay(task.attempts);
                    task.status = TaskStatus::Scheduled;
                    task.due_at =
                        Some(Utc::now() + chrono::Duration::from_std(delay).unwrap_or(chrono::TimeDelta::MAX));
                }
            }
            task.touch();
            task.clone()
        };

        match applied.status {
            TaskStatus::Completed => {
                tracing::info!(scheduler = %self.config.name, task_id = %id, "Task completed successfully");
            }
            TaskStatus::Scheduled => {
                tracing::warn!(
                    scheduler = %self.config.name,
                    task_id = %id,
                    attempt = applied.attempts,
                    max_attempts = applied.max_attempts,
                    retry_at = ?applied.due_at,
                    error = %outcome.message,
                    "Attempt failed, retry scheduled"
                );
            }
            TaskStatus::Failed => {
                tracing::error!(
                    scheduler = %self.config.name,
                    task_id = %id,
                    attempts = applied.attempts,
                    error = %outcome.message,
                    "Task failed permanently"
                );
            }
            _ => {}
        }

        self.persist_logged();

        if let Err(e) = self.hooks.on_task_complete(&applied, outcome.success) {
            tracing::warn!(scheduler = %self.config.name, task_id = %id, error = %e, "on_task_complete hook failed");
        }
        if applied.status == TaskStatus::Failed {
            if let Err(e) = self.hooks.on_task_fail(&applied) {
                tracing::warn!(scheduler = %self.config.name, task_id = %id, error = %e, "on_task_fail hook failed");
            }
        }
    }
}

/// Worker loop: poll the queue, run attempts, observe the shutdown flag.
async fn worker_loop(shared: Arc<Shared>, worker: usize) {
    tracing::debug!(scheduler = %shared.config.name, worker, "Worker started");
    while shared.running.load(Ordering::SeqCst) {
        match shared.claim_next() {
            Some(claimed) => shared.run_attempt(claimed).await,
            None => tokio::time::sleep(shared.config.poll_interval).await,
        }
    }
    tracing::debug!(scheduler = %shared.config.name, worker, "Worker stopped");
}

/// Promotion sweep: move scheduled tasks whose due-time has arrived into the
/// ready queue. Polling, not push-based; worst-case promotion latency is one
/// sweep interval.
async fn sweep_loop(shared: Arc<Shared>) {
    while shared.running.load(Ordering::SeqCst) {
        shared.promote_due();
        tokio::time::sleep(shared.config.promotion_interval).await;
    }
}
