//! CLI for the zenlings checker
//!
//! ## Commands
//!
//! - `check` - run every solution in the pack and report pytest-style
//! - `watch` - re-check the current exercise whenever a solution changes
//! - `list` - print the exercises declared in `info.toml`
//! - `verify <NAME>` - run one solution and deep-check its pipeline run
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;
pub mod driver;
pub mod watch;

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::harness::{HarnessConfig, manifest};

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
    /// No cases were collected (pytest exits 5 for the same situation, so a
    /// typo'd filter never looks like a green run).
    pub const NO_CASES: ExitCode = ExitCode(5);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Run zenlings solution pipelines in isolated ZenML environments
#[derive(Parser, Debug)]
#[command(name = "zenlings")]
#[command(version = VERSION)]
#[command(about = "Run zenlings solution pipelines in isolated ZenML environments")]
pub struct Cli {
    /// Path to the zenlings pack (directory containing info.toml)
    #[arg(long, global = true, value_name = "DIR")]
    pub pack: Option<PathBuf>,

    /// Python binary used to run solution files
    #[arg(long, global = true, default_value = "python")]
    pub python: String,

    /// ZenML binary name or path
    #[arg(long, global = true, default_value = "zenml")]
    pub zenml: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every solution in the pack and report pytest-style
    Check {
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
        /// Stop on first failure
        #[arg(short = 'x', long = "exitfirst")]
        stop_on_fail: bool,
        /// Filter cases by substring of their "<dir>/<name>" id
        #[arg(short = 'k', value_name = "EXPR")]
        filter: Option<String>,
        /// Per-solution timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        /// Override the worker identity (normally taken from
        /// ZENLINGS_WORKER_ID, falling back to "master")
        #[arg(long, value_name = "ID")]
        worker_id: Option<String>,
    },

    /// Watch the solutions tree, re-checking the current exercise on change
    Watch {
        /// Override the worker identity (normally taken from
        /// ZENLINGS_WORKER_ID, falling back to "master")
        #[arg(long, value_name = "ID")]
        worker_id: Option<String>,
    },

    /// Print the exercises declared in info.toml
    List,

    /// Run one solution and deep-check its pipeline run status
    Verify {
        /// Exercise name or "<dir>/<name>" id
        #[arg(value_name = "NAME")]
        name: String,
        /// Only check the exit code, skip the ZenML run-status query
        #[arg(long)]
        simple: bool,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    let mut config = build_config(cli.pack, cli.python, cli.zenml)?;

    match cli.command {
        Command::Check {
            verbose,
            stop_on_fail,
            filter,
            timeout,
            worker_id,
        } => {
            if let Some(secs) = timeout {
                config.case_timeout = Duration::from_secs(secs);
            }
            config.worker_id = worker_id;
            let opts = driver::CheckOptions {
                verbose,
                stop_on_fail,
                filter,
            };
            driver::run_check(&config, &opts)
        }
        Command::Watch { worker_id } => {
            config.worker_id = worker_id;
            watch::run_watch(&config)
        }
        Command::List => commands::list_exercises(&config),
        Command::Verify { name, simple } => commands::verify_solution(&config, &name, simple),
    }
}

/// Resolve the pack root: the explicit `--pack` value, or an upward search
/// from the current directory for info.toml.
fn build_config(
    pack: Option<PathBuf>,
    python_bin: String,
    zenml_bin: String,
) -> CliResult<HarnessConfig> {
    let pack_root = match pack {
        Some(path) => path,
        None => {
            let cwd = env::current_dir().map_err(|e| {
                CliError::failure(format!("cannot determine current directory: {e}"))
            })?;
            manifest::find_pack_root(&cwd).map_err(|e| CliError::failure(e.to_string()))?
        }
    };

    let mut config = HarnessConfig::new(pack_root);
    config.python_bin = python_bin;
    config.zenml_bin = zenml_bin;
    Ok(config)
}

// ============================================================================
// Tests
// ============================================================================
