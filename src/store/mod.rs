//! Storage layer: restart-safe record of every task ever created.
//!
//! The scheduler saves the full task set after every mutation; snapshots are
//! written atomically (temp file + rename) so the current state file is never
//! seen half-written.

mod state_file;

pub use state_file::{TaskStore, compute_instance_hash};
