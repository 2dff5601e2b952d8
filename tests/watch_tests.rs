//! End-to-end tests for watch mode
//!
//! The loop is driven through `run_watch_with_events` with a synthetic
//! event channel, so no real filesystem watcher is involved. Solutions are
//! shell scripts run with `sh` and the ZenML CLI is a stub, as in the
//! check driver tests. Every test assigns its own `worker_id` because the
//! worker session cache is process-global.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use zenlings::cli::ExitCode;
use zenlings::cli::driver::CaseStatus;
use zenlings::cli::watch::{WatchEvent, WatchReporter, run_watch_with_events};
use zenlings::harness::HarnessConfig;
use zenlings::harness::init::Session;
use zenlings::harness::progress::ProgressFile;

// ============================================================================
// Fixtures
// ============================================================================

/// One recorded run of the current exercise.
#[derive(Debug, Clone)]
struct RunRecord {
    test_id: String,
    passed: bool,
    hint: Option<String>,
}

/// Reporter whose records are shared across threads.
#[derive(Clone, Default)]
struct SharedReporter {
    runs: Arc<Mutex<Vec<RunRecord>>>,
    waits: Arc<Mutex<Vec<String>>>,
    all_complete: Arc<Mutex<Option<usize>>>,
}

impl SharedReporter {
    fn runs(&self) -> Vec<RunRecord> {
        self.runs.lock().unwrap().clone()
    }

    fn wait_for_runs(&self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while self.runs.lock().unwrap().len() < count {
            assert!(Instant::now() < deadline, "timed out waiting for {count} run(s)");
            thread::sleep(Duration::from_millis(25));
        }
    }
}

impl WatchReporter for SharedReporter {
    fn on_waiting(&mut self, test_id: &str) {
        self.waits.lock().unwrap().push(test_id.to_string());
    }

    fn on_case_complete(&mut self, test_id: &str, status: &CaseStatus, hint: Option<&str>) {
        self.runs.lock().unwrap().push(RunRecord {
            test_id: test_id.to_string(),
            passed: !status.is_failure(),
            hint: hint.map(str::to_string),
        });
    }

    fn on_all_complete(&mut self, total: usize) {
        *self.all_complete.lock().unwrap() = Some(total);
    }
}

fn write_executable(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Pack builder with optional hints: `(dir, name, hint, body)`.
fn write_pack(root: &Path, entries: &[(&str, &str, Option<&str>, &str)]) {
    let mut manifest = String::from("format_version = 1\n");
    for (dir, name, hint, body) in entries {
        manifest.push_str(&format!(
            "\n[[exercises]]\nname = \"{name}\"\ndir = \"{dir}\"\n"
        ));
        if let Some(hint) = hint {
            manifest.push_str(&format!("hint = \"{hint}\"\n"));
        }
        let solution_dir = root.join("solutions").join(dir);
        fs::create_dir_all(&solution_dir).unwrap();
        fs::write(solution_dir.join(format!("{name}.py")), body).unwrap();
    }
    fs::write(root.join("info.toml"), manifest).unwrap();
}

fn write_zenml_stub(dir: &Path) -> PathBuf {
    let path = dir.join("zenml");
    write_executable(&path, "#!/bin/sh\nmkdir -p .zen\nexit 0\n");
    path
}

fn test_config(pack_root: &Path, zenml_bin: &Path, worker_id: &str) -> HarnessConfig {
    let mut config = HarnessConfig::new(pack_root);
    config.python_bin = "sh".to_string();
    config.zenml_bin = zenml_bin.to_string_lossy().into_owned();
    config.worker_id = Some(worker_id.to_string());
    config
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_watch_advances_past_passes_and_shows_hint_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    write_pack(
        dir.path(),
        &[
            ("00_intro", "intro1", None, "#!/bin/sh\nexit 0\n"),
            (
                "01_loading",
                "load1",
                Some("Use the @step decorator on load_data"),
                "#!/bin/sh\nexit 1\n",
            ),
        ],
    );
    let zenml = write_zenml_stub(dir.path());
    let config = test_config(dir.path(), &zenml, "wtest-hint");

    // Sender dropped up front: the loop runs its initial cascade, settles
    // on the failing exercise, then finds the event source gone.
    let (tx, rx) = mpsc::channel();
    drop(tx);
    let mut reporter = SharedReporter::default();
    let exit = run_watch_with_events(&config, rx, &mut reporter).unwrap();
    assert_eq!(exit, ExitCode::SUCCESS);

    let runs = reporter.runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].test_id, "00_intro/intro1");
    assert!(runs[0].passed);
    assert_eq!(runs[0].hint, None);
    assert_eq!(runs[1].test_id, "01_loading/load1");
    assert!(!runs[1].passed);
    assert_eq!(
        runs[1].hint.as_deref(),
        Some("Use the @step decorator on load_data")
    );
    assert_eq!(*reporter.waits.lock().unwrap(), ["01_loading/load1"]);

    // Progress reflects the state of the loop.
    let progress = ProgressFile::load(dir.path()).unwrap();
    assert_eq!(progress.completed, ["intro1"]);
    assert_eq!(progress.current.as_deref(), Some("load1"));
    assert_eq!(progress.hints_used.get("load1"), Some(&1));
}

#[test]
fn test_watch_reruns_current_exercise_on_file_change() {
    let dir = tempfile::tempdir().unwrap();
    // Fails until a marker file appears in the working directory (the
    // worker repo), standing in for the student fixing the solution.
    write_pack(
        dir.path(),
        &[(
            "00_intro",
            "fixme",
            None,
            "#!/bin/sh\n[ -f fixed ] && exit 0\nexit 1\n",
        )],
    );
    let zenml = write_zenml_stub(dir.path());
    let config = test_config(dir.path(), &zenml, "wtest-rerun");

    let (tx, rx) = mpsc::channel();
    let reporter = SharedReporter::default();
    let loop_handle = {
        let config = config.clone();
        let mut reporter = reporter.clone();
        thread::spawn(move || run_watch_with_events(&config, rx, &mut reporter))
    };

    // First run fails; "fix" the exercise and announce a change.
    reporter.wait_for_runs(1);
    assert!(!reporter.runs()[0].passed);

    let session = Session::obtain(&config);
    let session = session.as_ref().as_ref().unwrap();
    fs::write(session.repo_dir().join("fixed"), "").unwrap();
    tx.send(WatchEvent::FileChanged(PathBuf::from(
        "solutions/00_intro/fixme.py",
    )))
    .unwrap();

    let exit = loop_handle.join().unwrap().unwrap();
    assert_eq!(exit, ExitCode::SUCCESS);

    let runs = reporter.runs();
    assert_eq!(runs.len(), 2);
    assert!(runs[1].passed);
    assert_eq!(*reporter.all_complete.lock().unwrap(), Some(1));

    let progress = ProgressFile::load(dir.path()).unwrap();
    assert_eq!(progress.completed, ["fixme"]);
}

#[test]
fn test_watch_resumes_from_saved_progress() {
    let dir = tempfile::tempdir().unwrap();
    // broken1 would fail if run; recorded progress says it already passed.
    write_pack(
        dir.path(),
        &[
            ("00_intro", "broken1", None, "#!/bin/sh\nexit 1\n"),
            ("01_loading", "good1", None, "#!/bin/sh\nexit 0\n"),
        ],
    );
    fs::write(
        dir.path().join(".zenlings-progress.json"),
        r#"{"version":1,"completed":["broken1"]}"#,
    )
    .unwrap();
    let zenml = write_zenml_stub(dir.path());
    let config = test_config(dir.path(), &zenml, "wtest-resume");

    let (tx, rx) = mpsc::channel();
    drop(tx);
    let mut reporter = SharedReporter::default();
    let exit = run_watch_with_events(&config, rx, &mut reporter).unwrap();
    assert_eq!(exit, ExitCode::SUCCESS);

    // Only the incomplete exercise ran.
    let runs = reporter.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].test_id, "01_loading/good1");
    assert!(runs[0].passed);
    assert_eq!(*reporter.all_complete.lock().unwrap(), Some(2));

    let progress = ProgressFile::load(dir.path()).unwrap();
    assert_eq!(progress.completed, ["broken1", "good1"]);
}
