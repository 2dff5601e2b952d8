#![forbid(unsafe_code)]
//! Zenlings solution checker
//!
//! Zenlings teaches ZenML's dynamic pipelines through fill-in-the-blank
//! Python exercises. This crate is the pack's checker: it loads the
//! `info.toml` manifest, builds an isolated per-worker ZenML environment
//! (private HOME, private repository, `zenml init` run once per worker),
//! executes every solution file as a subprocess under a timeout, and
//! reports pass/fail pytest-style. Watch mode re-checks the current
//! exercise on file change, tracking progress and surfacing the
//! manifest's hints.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module
//!   enforces `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod harness;

pub use harness::HarnessConfig;
pub use harness::env::zenml_env;
pub use harness::init::{Session, SetupError};
pub use harness::manifest::{Exercise, ManifestError, load_exercises};
pub use harness::runner::{RunOutput, RunnerError, run_python_file};
pub use harness::worker::{WorkerContext, resolve_worker_id};
