//! Watch mode: re-check the current exercise as solutions change.
//!
//! `zenlings watch` is the interactive counterpart to `check`: instead of
//! running the whole pack once, it settles on the first incomplete exercise
//! and re-runs it whenever a `.py` file under `solutions/` changes. A pass
//! is recorded in the progress file and the loop advances to the next
//! incomplete exercise (running straight through any that already pass); a
//! failure prints the usual diagnostics plus the manifest's hint for the
//! exercise, when it has one.
//!
//! File events come from a `notify` watcher on a background thread and are
//! debounced: after the first event the loop drains further events until
//! the tree has been quiet for a short window, then re-runs once.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::harness::HarnessConfig;
use crate::harness::init::Session;
use crate::harness::manifest::Exercise;
use crate::harness::progress::ProgressFile;

use super::driver::{CaseStatus, run_case};
use super::{CliError, CliResult, ExitCode};

/// Quiet period after the last file event before re-running.
const DEBOUNCE: Duration = Duration::from_millis(300);

/// Events delivered to the watch loop.
#[derive(Debug)]
pub enum WatchEvent {
    /// A `.py` file under the watched tree was created or modified.
    FileChanged(PathBuf),
    /// The underlying watcher reported an error.
    Error(String),
}

/// Keeps the filesystem watcher alive for the duration of the loop.
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
}

/// Start watching `watch_root` recursively, forwarding relevant events to
/// `tx` from a background thread.
pub fn start_watch(watch_root: &Path, tx: Sender<WatchEvent>) -> CliResult<WatchHandle> {
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let _ = notify_tx.send(res);
        },
        Config::default().with_poll_interval(Duration::from_millis(200)),
    )
    .map_err(|err| CliError::failure(format!("cannot create file watcher: {err}")))?;

    watcher
        .watch(watch_root, RecursiveMode::Recursive)
        .map_err(|err| {
            CliError::failure(format!("cannot watch {}: {err}", watch_root.display()))
        })?;

    thread::spawn(move || forward_notify_events(notify_rx, tx));

    Ok(WatchHandle { _watcher: watcher })
}

/// Translate raw notify events into `WatchEvent`s; exits when the loop's
/// receiver is gone.
fn forward_notify_events(notify_rx: Receiver<notify::Result<Event>>, tx: Sender<WatchEvent>) {
    for res in notify_rx {
        match res {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    continue;
                }
                for path in event.paths {
                    let is_python = path.extension().is_some_and(|ext| ext == "py");
                    if is_python && tx.send(WatchEvent::FileChanged(path)).is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                if tx.send(WatchEvent::Error(err.to_string())).is_err() {
                    return;
                }
            }
        }
    }
}

// ============================================================================
// Watch Reporter
// ============================================================================

/// Trait for reporting watch-loop activity.
pub trait WatchReporter {
    /// Called when the loop settles on an exercise and waits for edits
    fn on_waiting(&mut self, _test_id: &str) {}

    /// Called after each run of the current exercise; `hint` is the
    /// manifest's hint, passed only when the run failed
    fn on_case_complete(&mut self, test_id: &str, status: &CaseStatus, hint: Option<&str>);

    /// Called when every exercise in the pack has passed
    fn on_all_complete(&mut self, _total: usize) {}
}

/// Default console reporter for watch mode.
#[derive(Default)]
pub struct ConsoleWatchReporter;

impl WatchReporter for ConsoleWatchReporter {
    fn on_waiting(&mut self, test_id: &str) {
        println!();
        println!("watching {test_id} (edit the solution to re-run, Ctrl-C to quit)");
    }

    fn on_case_complete(&mut self, test_id: &str, status: &CaseStatus, hint: Option<&str>) {
        match status {
            CaseStatus::Passed(d) => {
                println!("{test_id} \x1b[32mPASSED\x1b[0m ({:.1}s)", d.as_secs_f64());
            }
            CaseStatus::Failed(_, message) => {
                println!("{test_id} \x1b[31mFAILED\x1b[0m");
                println!();
                println!("{message}");
                if let Some(hint) = hint {
                    println!("\x1b[33mHint:\x1b[0m {hint}");
                }
            }
            CaseStatus::TimedOut(d, message) => {
                println!("{test_id} \x1b[31mTIMEOUT\x1b[0m ({:.1}s)", d.as_secs_f64());
                println!();
                println!("{message}");
                if let Some(hint) = hint {
                    println!("\x1b[33mHint:\x1b[0m {hint}");
                }
            }
        }
    }

    fn on_all_complete(&mut self, total: usize) {
        println!();
        println!("\x1b[1;32mAll {total} exercise(s) passing. You're done!\x1b[0m");
    }
}

// ============================================================================
// Watch loop
// ============================================================================

/// Run watch mode with the default console reporter and a live filesystem
/// watcher on the pack's solutions tree.
pub fn run_watch(config: &HarnessConfig) -> CliResult<ExitCode> {
    let (tx, rx) = mpsc::channel();
    let _handle = start_watch(&config.solutions_dir(), tx)?;
    let mut reporter = ConsoleWatchReporter;
    run_watch_with_events(config, rx, &mut reporter)
}

/// Run the watch loop against an arbitrary event source and reporter.
///
/// The loop ends with `SUCCESS` either when every exercise passes or when
/// the event sender disconnects (the watcher went away).
pub fn run_watch_with_events(
    config: &HarnessConfig,
    rx: Receiver<WatchEvent>,
    reporter: &mut dyn WatchReporter,
) -> CliResult<ExitCode> {
    let exercises = config
        .load_exercises()
        .map_err(|err| CliError::failure(format!("Failed to load exercises from info.toml: {err}")))?;
    let mut progress =
        ProgressFile::load(&config.pack_root).map_err(|err| CliError::failure(err.to_string()))?;

    let session = Session::obtain(config);
    let session = match session.as_ref() {
        Ok(session) => session,
        Err(setup_err) => {
            return Err(CliError::failure(format!(
                "worker session setup failed: {setup_err}"
            )));
        }
    };

    let mut current = progress.resolve_current_index(&exercises);

    loop {
        // Run the current exercise, advancing through everything that
        // passes until one fails or the pack is done.
        loop {
            let exercise = &exercises[current];
            let test_id = exercise.test_id();
            let status = run_case(config, session, exercise);

            if status.is_failure() {
                if exercise.hint.is_some() {
                    progress.record_hint_used(&exercise.name);
                }
                progress.current = Some(exercise.name.clone());
                progress
                    .save(&config.pack_root)
                    .map_err(|err| CliError::failure(err.to_string()))?;
                reporter.on_case_complete(&test_id, &status, exercise.hint.as_deref());
                break;
            }

            reporter.on_case_complete(&test_id, &status, None);
            progress.mark_completed(&exercise.name);
            progress.current = Some(exercise.name.clone());
            progress
                .save(&config.pack_root)
                .map_err(|err| CliError::failure(err.to_string()))?;

            match next_incomplete(&exercises, &progress) {
                Some(idx) => current = idx,
                None => {
                    reporter.on_all_complete(exercises.len());
                    return Ok(ExitCode::SUCCESS);
                }
            }
        }

        reporter.on_waiting(&exercises[current].test_id());

        // Block for the next change, then coalesce the burst of events a
        // single save typically produces.
        match rx.recv() {
            Ok(WatchEvent::FileChanged(_)) => drain_until_quiet(&rx),
            Ok(WatchEvent::Error(message)) => {
                tracing::warn!(error = %message, "file watcher error");
                continue;
            }
            Err(_) => return Ok(ExitCode::SUCCESS),
        }
    }
}

fn next_incomplete(exercises: &[Exercise], progress: &ProgressFile) -> Option<usize> {
    exercises
        .iter()
        .position(|ex| !progress.is_completed(&ex.name))
}

fn drain_until_quiet(rx: &Receiver<WatchEvent>) {
    while rx.recv_timeout(DEBOUNCE).is_ok() {}
}

// ============================================================================
// Tests
// ============================================================================
