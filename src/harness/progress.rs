//! Progress persistence for watch mode.
//!
//! Watch mode tracks which exercises have passed and which one the student
//! is currently on in `.zenlings-progress.json` at the pack root. The file
//! is written atomically (temp file plus rename) so an interrupted save
//! never leaves a torn JSON document behind. Exercises are keyed by name,
//! which the manifest keeps unique within a pack.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::manifest::Exercise;

/// Progress file name, stored at the pack root.
pub const PROGRESS_FILENAME: &str = ".zenlings-progress.json";

/// Errors raised while loading or saving the progress file.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("failed to read progress file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to parse progress file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to write progress file {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Persisted watch-mode progress.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressFile {
    pub version: u32,
    /// Names of exercises that have passed, in completion order.
    #[serde(default)]
    pub completed: Vec<String>,
    /// Name of the exercise the student is currently on.
    #[serde(default)]
    pub current: Option<String>,
    /// Times a hint was shown, per exercise name.
    #[serde(default)]
    pub hints_used: HashMap<String, u32>,
    /// Unix timestamps (seconds).
    #[serde(default)]
    pub started_at: Option<u64>,
    #[serde(default)]
    pub last_activity: Option<u64>,
}

impl ProgressFile {
    fn new() -> Self {
        Self {
            version: 1,
            completed: Vec::new(),
            current: None,
            hints_used: HashMap::new(),
            started_at: Some(epoch_seconds()),
            last_activity: Some(epoch_seconds()),
        }
    }

    /// Load the progress file from the pack root, or start fresh when none
    /// exists yet.
    pub fn load(pack_root: &Path) -> Result<Self, ProgressError> {
        let path = pack_root.join(PROGRESS_FILENAME);
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(&path).map_err(|err| ProgressError::Read {
            path: path.clone(),
            message: err.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|err| ProgressError::Parse {
            path,
            message: err.to_string(),
        })
    }

    /// Save atomically to the pack root, bumping the activity timestamp.
    pub fn save(&mut self, pack_root: &Path) -> Result<(), ProgressError> {
        self.last_activity = Some(epoch_seconds());

        let path = pack_root.join(PROGRESS_FILENAME);
        let tmp_path = path.with_extension("json.tmp");
        let write_err = |err: std::io::Error| ProgressError::Write {
            path: path.clone(),
            message: err.to_string(),
        };

        let content = serde_json::to_string_pretty(self).map_err(|err| ProgressError::Write {
            path: path.clone(),
            message: err.to_string(),
        })?;

        let mut file = fs::File::create(&tmp_path).map_err(&write_err)?;
        file.write_all(content.as_bytes()).map_err(&write_err)?;
        file.sync_all().map_err(&write_err)?;
        fs::rename(&tmp_path, &path).map_err(&write_err)?;
        Ok(())
    }

    pub fn is_completed(&self, name: &str) -> bool {
        self.completed.iter().any(|done| done == name)
    }

    /// Record a pass; completing the same exercise twice is a no-op.
    pub fn mark_completed(&mut self, name: &str) {
        if !self.is_completed(name) {
            self.completed.push(name.to_string());
        }
    }

    /// Count one hint display for the exercise.
    pub fn record_hint_used(&mut self, name: &str) {
        *self.hints_used.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Index of the exercise the watch loop should run first: the recorded
    /// current exercise if it still exists, otherwise the first incomplete
    /// one, otherwise the last exercise.
    pub fn resolve_current_index(&self, exercises: &[Exercise]) -> usize {
        if let Some(current_name) = &self.current {
            if let Some(idx) = exercises.iter().position(|ex| &ex.name == current_name) {
                return idx;
            }
        }

        exercises
            .iter()
            .position(|ex| !self.is_completed(&ex.name))
            .unwrap_or(exercises.len().saturating_sub(1))
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }
}

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ============================================================================
// Tests
// ============================================================================
