//! Recurring schedules that feed the scheduler automatically.

pub mod planner;
pub mod schedule;

pub use planner::{Planner, ScheduleBook};
pub use schedule::{DEFAULT_MAX_PER_DAY, ScheduleKind, UploadSchedule};
