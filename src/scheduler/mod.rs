//! Priority scheduling, worker pool, and lifecycle hooks.

pub mod hooks;
pub mod manager;
mod queue;

pub use hooks::{NoopHooks, TaskHooks};
pub use manager::{QueueStats, Scheduler, SchedulerBuilder, SchedulerConfig};
