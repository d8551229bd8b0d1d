//! Durable task state: atomic whole-snapshot JSON persistence.
//!
//! The scheduler writes the full task set after every mutating operation
//! (write-through), so a crash loses at most the in-flight mutation. Saves go
//! through a temp file followed by a rename so a partially-written snapshot is
//! never visible as current. Loading an absent file yields an empty task set;
//! a corrupt-but-present file is a hard error, never a silent discard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, UploadrError};
use crate::task::TaskRecord;

/// On-disk snapshot of all known tasks, keyed by task id.
#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    saved_at: DateTime<Utc>,
    tasks: HashMap<String, TaskRecord>,
}

/// File-backed store for the scheduler's task table.
pub struct TaskStore {
    state_path: PathBuf,
}

impl TaskStore {
    /// Open or create the store for the given instance directory.
    ///
    /// State lives at `~/.uploadr/<instance-hash>/state.json`, hashed from
    /// the canonical instance path so co-located schedulers stay isolated.
    pub fn open(instance_dir: &Path) -> Result<Self> {
        let hash = compute_instance_hash(instance_dir)?;
        let base = dirs::home_dir()
            .ok_or_else(|| UploadrError::Storage("cannot determine home directory".to_string()))?
            .join(".uploadr")
            .join(&hash);
        Self::open_at(&base)
    }

    /// Open or create the store at the specified directory.
    ///
    /// Useful for testing with custom paths.
    pub fn open_at(base_dir: &Path) -> Result<Self> {
        fs::create_dir_all(base_dir)?;
        Ok(Self {
            state_path: base_dir.join("state.json"),
        })
    }

    /// Path of the state file.
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Serialize the full task set atomically.
    pub fn save(&self, tasks: &[TaskRecord]) -> Result<()> {
        let snapshot = Snapshot {
            saved_at: Utc::now(),
            tasks: tasks.iter().map(|t| (t.id.clone(), t.clone())).collect(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;

        // Write-temp-then-rename keeps the current snapshot intact on crash.
        let tmp_path = self.state_path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &self.state_path)?;
        Ok(())
    }

    /// Reconstruct the task set from disk.
    ///
    /// Returns an empty set when no snapshot exists yet.
    pub fn load(&self) -> Result<Vec<TaskRecord>> {
        if !self.state_path.exists() {
            return Ok(Vec::new());
        }
        let json = fs::read_to_string(&self.state_path)?;
        let snapshot: Snapshot = serde_json::from_str(&json).map_err(|e| {
            UploadrError::Storage(format!(
                "corrupt state file {}: {}",
                self.state_path.display(),
                e
            ))
        })?;
        Ok(snapshot.tasks.into_values().collect())
    }
}

/// Hash the canonical instance path for storage isolation.
pub fn compute_instance_hash(instance_dir: &Path) -> Result<String> {
    let canonical = instance_dir.canonicalize()?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(&result[..8]))
}
