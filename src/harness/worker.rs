//! Per-worker isolation.
//!
//! When an external distributor fans the check out across processes, each
//! process carries an assigned worker identity and must never share state
//! with its siblings. ZenML persists global config and a local database
//! under `$HOME`, so every worker gets a private HOME and a private
//! repository directory; within one process the directories are created
//! once and reused for the whole session.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use tempfile::TempDir;

use super::env::zenml_env_from_process;

/// Environment variable through which a distributor assigns worker ids.
pub const WORKER_ID_VAR: &str = "ZENLINGS_WORKER_ID";

/// Sentinel identity used when running single-process.
pub const SINGLE_PROCESS_WORKER_ID: &str = "master";

/// Resolve the active worker identity from the process environment.
pub fn resolve_worker_id() -> String {
    worker_id_from(std::env::var(WORKER_ID_VAR).ok().as_deref())
}

/// Worker identity from an optional assigned value; empty counts as absent.
pub fn worker_id_from(assigned: Option<&str>) -> String {
    match assigned {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => SINGLE_PROCESS_WORKER_ID.to_string(),
    }
}

/// Exclusively-owned scratch state for one worker.
///
/// The temp directories embed the worker id in their prefix and are unique
/// per creation, so two workers (or two sessions of the same worker) never
/// collide on disk. Cleanup is delegated to process teardown; the context
/// lives for the whole session.
#[derive(Debug)]
pub struct WorkerContext {
    worker_id: String,
    home: TempDir,
    repo: TempDir,
}

impl WorkerContext {
    /// Allocate fresh isolation directories for the given worker.
    pub fn create(worker_id: &str) -> io::Result<Self> {
        let home = scratch_dir("zenlings_home", worker_id)?;
        let repo = scratch_dir("zenlings_repo", worker_id)?;
        tracing::debug!(
            worker_id,
            home = %home.path().display(),
            repo = %repo.path().display(),
            "created worker isolation directories"
        );
        Ok(Self {
            worker_id: worker_id.to_string(),
            home,
            repo,
        })
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Isolated stand-in for the user's home directory.
    pub fn home_dir(&self) -> &Path {
        self.home.path()
    }

    /// Scratch directory that becomes an initialized ZenML repository.
    pub fn repo_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Subprocess environment for this worker: process env with HOME pinned
    /// to the isolated home plus the deterministic ZenML overrides.
    pub fn subprocess_env(&self) -> BTreeMap<String, String> {
        zenml_env_from_process(self.home_dir())
    }
}

fn scratch_dir(kind: &str, worker_id: &str) -> io::Result<TempDir> {
    tempfile::Builder::new()
        .prefix(&format!("{kind}_{worker_id}_"))
        .tempdir()
}

// ============================================================================
// Tests
// ============================================================================
