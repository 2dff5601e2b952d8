//! Subprocess execution with bounded waits.
//!
//! The runner launches one child process (a Python solution file, or the
//! `zenml` CLI during setup) with a caller-supplied working directory and
//! environment, captures both output streams as text, and waits under a
//! timeout. It never interprets exit codes or output content; that is the
//! caller's job. A timeout is a distinct failure from a non-zero exit, and
//! whatever output was captured before the kill is preserved in the error.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use wait_timeout::ChildExt;

/// Captured outcome of a completed child process.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Exit code as reported by the OS; -1 if terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    /// Whether the child exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Errors raised while running a child process.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn `{program}` for {file}: {message}")]
    Spawn {
        program: String,
        file: PathBuf,
        message: String,
    },

    /// The child did not terminate within its budget. Output captured up to
    /// the kill is carried along so diagnostics are never lost.
    #[error("`{program}` for {file} timed out after {timeout_s} s")]
    TimedOut {
        program: String,
        file: PathBuf,
        timeout_s: u64,
        stdout: String,
        stderr: String,
    },

    #[error("I/O error while waiting on `{program}` for {file}: {message}")]
    Wait {
        program: String,
        file: PathBuf,
        message: String,
    },
}

/// Run a Python file as a child process.
///
/// Mirrors `python <file>` with the given working directory and environment;
/// the environment replaces the child's environment entirely.
pub fn run_python_file(
    python_bin: &str,
    file: &Path,
    cwd: &Path,
    env: &BTreeMap<String, String>,
    timeout: Duration,
) -> Result<RunOutput, RunnerError> {
    let mut command = Command::new(python_bin);
    command.arg(file);
    run_command(command, python_bin, file, cwd, env, timeout)
}

/// Run an arbitrary tool with arguments, same capture and timeout contract.
///
/// `label` names the invocation in errors (for tools the "file" slot holds
/// the working directory the tool operates on).
pub fn run_tool(
    program: &str,
    args: &[&str],
    cwd: &Path,
    env: &BTreeMap<String, String>,
    timeout: Duration,
) -> Result<RunOutput, RunnerError> {
    let mut command = Command::new(program);
    command.args(args);
    run_command(command, program, cwd, cwd, env, timeout)
}

fn run_command(
    mut command: Command,
    program: &str,
    file: &Path,
    cwd: &Path,
    env: &BTreeMap<String, String>,
    timeout: Duration,
) -> Result<RunOutput, RunnerError> {
    tracing::debug!(program, file = %file.display(), cwd = %cwd.display(), "spawning child process");

    let mut child = command
        .current_dir(cwd)
        .env_clear()
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| RunnerError::Spawn {
            program: program.to_string(),
            file: file.to_path_buf(),
            message: err.to_string(),
        })?;

    // Drain both pipes on dedicated threads so a chatty child cannot fill a
    // pipe buffer and deadlock against our wait.
    let stdout_handle = drain_pipe(child.stdout.take());
    let stderr_handle = drain_pipe(child.stderr.take());

    let status = child
        .wait_timeout(timeout)
        .map_err(|err| RunnerError::Wait {
            program: program.to_string(),
            file: file.to_path_buf(),
            message: err.to_string(),
        })?;

    let Some(status) = status else {
        // Budget exceeded: kill, reap, and surface the partial output.
        let _ = child.kill();
        let _ = child.wait();
        let stdout = join_captured(stdout_handle);
        let stderr = join_captured(stderr_handle);
        return Err(RunnerError::TimedOut {
            program: program.to_string(),
            file: file.to_path_buf(),
            timeout_s: timeout.as_secs(),
            stdout,
            stderr,
        });
    };

    let stdout = join_captured(stdout_handle);
    let stderr = join_captured(stderr_handle);
    let exit_code = status.code().unwrap_or(-1);

    tracing::debug!(program, exit_code, "child process completed");

    Ok(RunOutput {
        exit_code,
        stdout,
        stderr,
    })
}

fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        buffer
    })
}

fn join_captured(handle: thread::JoinHandle<Vec<u8>>) -> String {
    let bytes = handle.join().unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

// ============================================================================
// Tests
// ============================================================================
