//! ID generation utilities for uploadr
//!
//! Provides unique identifiers for tasks and recurring schedules.

use rand::Rng;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Generate a unique task ID
///
/// Format: `{timestamp_ms}-{random_hex}`
/// Example: `1738300800123-a1b2`
pub fn generate_task_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("{}-{:04x}", timestamp, random)
}

/// Generate a recurring schedule ID
///
/// Format: `sched-{timestamp_ms}-{random_hex}`
pub fn generate_schedule_id() -> String {
    let timestamp = now_ms();
    let random: u16 = rand::rng().random();
    format!("sched-{}-{:04x}", timestamp, random)
}
