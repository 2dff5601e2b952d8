//! One-time ZenML repository initialization per worker session.
//!
//! Before any solution runs, the worker's scratch repository has to become a
//! real ZenML repository: the solutions tree is staged into it (ZenML
//! resolves importable pipeline sources relative to its repository root),
//! `zenml init` runs inside it, and the `.zen` marker directory is checked
//! as proof the command actually did its work. All of this happens at most
//! once per worker; any failure here is fatal for every case the worker
//! would have run, and is surfaced with the captured output verbatim.

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

use thiserror::Error;

use super::runner::{RunnerError, run_tool};
use super::worker::{WorkerContext, resolve_worker_id};
use super::HarnessConfig;

/// Subdirectory whose presence proves `zenml init` succeeded.
pub const ZEN_MARKER: &str = ".zen";

/// Fatal setup errors. These abort the whole worker session and are never
/// retried.
#[derive(Debug, Clone, Error)]
pub enum SetupError {
    #[error("zenml CLI not found in PATH ('{0}'). Install with: pip install zenml[local]")]
    ZenmlNotFound(String),

    #[error("failed to create worker directories: {0}")]
    Workspace(String),

    #[error("failed to stage solutions into {path}: {message}")]
    Stage { path: PathBuf, message: String },

    #[error(
        "zenml init failed with exit code {exit_code}:\n--- STDOUT ---\n{stdout}\n--- STDERR ---\n{stderr}"
    )]
    InitFailed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("zenml init timed out after {timeout_s} s:\n--- STDOUT ---\n{stdout}\n--- STDERR ---\n{stderr}")]
    InitTimedOut {
        timeout_s: u64,
        stdout: String,
        stderr: String,
    },

    #[error("zenml init could not be run: {0}")]
    InitSpawn(String),

    #[error("{marker} directory not created in {repo} after zenml init")]
    MarkerMissing { marker: String, repo: PathBuf },
}

/// Locate the ZenML executable.
///
/// A value containing a path separator is taken as an explicit path;
/// otherwise the process `PATH` is searched. Absence is setup-fatal: there
/// is nothing to retry.
pub fn locate_zenml(zenml_bin: &str) -> Result<PathBuf, SetupError> {
    locate_in(zenml_bin, env::var_os("PATH").as_deref())
}

fn locate_in(zenml_bin: &str, path_value: Option<&OsStr>) -> Result<PathBuf, SetupError> {
    let candidate = Path::new(zenml_bin);
    if candidate.components().count() > 1 {
        return if candidate.is_file() {
            Ok(candidate.to_path_buf())
        } else {
            Err(SetupError::ZenmlNotFound(zenml_bin.to_string()))
        };
    }

    if let Some(path_value) = path_value {
        for dir in env::split_paths(path_value) {
            let full = dir.join(zenml_bin);
            if full.is_file() {
                return Ok(full);
            }
        }
    }

    Err(SetupError::ZenmlNotFound(zenml_bin.to_string()))
}

/// Stage a copy of the solutions tree into `repo_dir/solutions`.
///
/// Skips without error when the source tree does not exist; not every
/// deployment ships staged sources.
pub fn stage_solutions(solutions_root: &Path, repo_dir: &Path) -> Result<(), SetupError> {
    if !solutions_root.exists() {
        tracing::debug!(
            solutions = %solutions_root.display(),
            "no solutions directory to stage"
        );
        return Ok(());
    }

    let dest = repo_dir.join("solutions");
    copy_dir_recursive(solutions_root, &dest).map_err(|err| SetupError::Stage {
        path: dest,
        message: err.to_string(),
    })
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Run `zenml init` inside the worker's repository directory and verify the
/// marker. Assumed idempotent per directory; attempted exactly once.
pub fn initialize_repo(
    config: &HarnessConfig,
    context: &WorkerContext,
    env: &BTreeMap<String, String>,
) -> Result<(), SetupError> {
    let zenml = locate_zenml(&config.zenml_bin)?;

    stage_solutions(&config.solutions_dir(), context.repo_dir())?;

    tracing::debug!(worker_id = context.worker_id(), "running zenml init");
    let output = run_tool(
        &zenml.to_string_lossy(),
        &["init"],
        context.repo_dir(),
        env,
        config.init_timeout,
    )
    .map_err(|err| match err {
        RunnerError::TimedOut {
            timeout_s,
            stdout,
            stderr,
            ..
        } => SetupError::InitTimedOut {
            timeout_s,
            stdout,
            stderr,
        },
        other => SetupError::InitSpawn(other.to_string()),
    })?;

    if !output.success() {
        return Err(SetupError::InitFailed {
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        });
    }

    // Do not trust the exit code alone; the marker directory is the
    // post-condition that the repository actually exists.
    let marker = context.repo_dir().join(ZEN_MARKER);
    if !marker.exists() {
        return Err(SetupError::MarkerMissing {
            marker: ZEN_MARKER.to_string(),
            repo: context.repo_dir().to_path_buf(),
        });
    }

    Ok(())
}

// ============================================================================
// Worker session (once per worker, memoized)
// ============================================================================

/// A fully prepared worker session: isolation directories allocated, the
/// subprocess environment computed, and the repository initialized.
#[derive(Debug)]
pub struct Session {
    context: WorkerContext,
    env: BTreeMap<String, String>,
}

/// Outcome of establishing a session; failures are shared with every case of
/// the worker rather than re-derived per case.
pub type SessionResult = Result<Session, SetupError>;

static SESSIONS: LazyLock<Mutex<HashMap<String, Arc<SessionResult>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

impl Session {
    pub fn context(&self) -> &WorkerContext {
        &self.context
    }

    pub fn repo_dir(&self) -> &Path {
        self.context.repo_dir()
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Obtain the session for the active worker, establishing it on first
    /// access. Subsequent calls for the same worker id return the memoized
    /// outcome, success or failure; the first caller's config wins.
    pub fn obtain(config: &HarnessConfig) -> Arc<SessionResult> {
        let worker_id = config
            .worker_id
            .clone()
            .unwrap_or_else(resolve_worker_id);

        let mut sessions = match SESSIONS.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(existing) = sessions.get(&worker_id) {
            return Arc::clone(existing);
        }

        let result = Arc::new(Self::establish(config, &worker_id));
        sessions.insert(worker_id, Arc::clone(&result));
        result
    }

    fn establish(config: &HarnessConfig, worker_id: &str) -> SessionResult {
        let context = WorkerContext::create(worker_id)
            .map_err(|err| SetupError::Workspace(err.to_string()))?;
        let env = context.subprocess_env();
        initialize_repo(config, &context, &env)?;
        tracing::debug!(worker_id, repo = %context.repo_dir().display(), "worker session ready");
        Ok(Self { context, env })
    }
}

// ============================================================================
// Tests
// ============================================================================
