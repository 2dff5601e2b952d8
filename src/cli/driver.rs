//! The `check` driver (pytest-style)
//!
//! One case per manifest entry, run sequentially in manifest order inside
//! the worker's initialized repository. A case passes iff its solution
//! subprocess exits 0 within the budget; a timeout is reported distinctly
//! from a non-zero exit. Reporting goes through the `Reporter` trait so
//! other output formats can be swapped in; the default is a pytest-style
//! console reporter.
//!
//! Failure containment follows the harness error taxonomy: a collection
//! failure surfaces as a single failing "exercises loaded" case instead of
//! an empty run, and a setup failure fails every collected case with the
//! same message rather than re-deriving the error per case.

use std::time::{Duration, Instant};

use crate::harness::HarnessConfig;
use crate::harness::init::Session;
use crate::harness::manifest::Exercise;
use crate::harness::runner::{RunOutput, RunnerError, run_python_file};

use super::{CliError, CliResult, ExitCode};

/// Synthetic case id used when the manifest itself fails to load.
const COLLECTION_CASE_ID: &str = "exercises loaded";

/// Options for the `check` subcommand.
#[derive(Debug, Default)]
pub struct CheckOptions {
    pub verbose: bool,
    pub stop_on_fail: bool,
    /// Substring match against case ids (`"<dir>/<name>"`).
    pub filter: Option<String>,
}

/// Outcome of one case.
#[derive(Debug, Clone)]
pub enum CaseStatus {
    Passed(Duration),
    /// Non-zero exit, spawn failure, or a poisoned session; the message
    /// carries the full diagnostics.
    Failed(Duration, String),
    /// The solution did not terminate within its budget.
    TimedOut(Duration, String),
}

impl CaseStatus {
    pub fn is_failure(&self) -> bool {
        !matches!(self, Self::Passed(_))
    }
}

/// Counts for a completed session.
#[derive(Debug)]
pub struct CheckSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub duration: Duration,
}

impl CheckSummary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.timed_out == 0
    }
}

// ============================================================================
// Reporter Trait
// ============================================================================

/// Trait for reporting check execution results.
///
/// Implement this trait to customize output format (JSON, TAP, etc.)
pub trait Reporter {
    /// Called when collection is complete
    fn on_collection_complete(&mut self, case_count: usize);

    /// Called when a case begins
    fn on_case_start(&mut self, _test_id: &str) {}

    /// Called when a case completes
    fn on_case_complete(&mut self, test_id: &str, status: &CaseStatus);

    /// Called when the session has completed
    fn on_session_complete(&mut self, summary: &CheckSummary);
}

/// Default console reporter (pytest-style).
#[derive(Default)]
pub struct ConsoleReporter {
    verbose: bool,
    failures: Vec<(String, String)>,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            failures: Vec::new(),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn on_collection_complete(&mut self, case_count: usize) {
        println!("\x1b[1m=================== check session starts ===================\x1b[0m");
        println!("collected {} item(s)", case_count);
        println!();
    }

    fn on_case_complete(&mut self, test_id: &str, status: &CaseStatus) {
        let label = match status {
            CaseStatus::Passed(d) => {
                if self.verbose {
                    format!("\x1b[32mPASSED\x1b[0m ({:.0}ms)", d.as_millis())
                } else {
                    "\x1b[32mPASSED\x1b[0m".to_string()
                }
            }
            CaseStatus::Failed(d, message) => {
                self.failures.push((test_id.to_string(), message.clone()));
                if self.verbose {
                    format!("\x1b[31mFAILED\x1b[0m ({:.0}ms)", d.as_millis())
                } else {
                    "\x1b[31mFAILED\x1b[0m".to_string()
                }
            }
            CaseStatus::TimedOut(d, message) => {
                self.failures.push((test_id.to_string(), message.clone()));
                format!("\x1b[31mTIMEOUT\x1b[0m ({:.1}s)", d.as_secs_f64())
            }
        };

        println!("{} {}", test_id, label);
    }

    fn on_session_complete(&mut self, summary: &CheckSummary) {
        if !self.failures.is_empty() {
            println!();
            println!("\x1b[1;31m=================== FAILURES ===================\x1b[0m");
            for (test_id, message) in &self.failures {
                println!();
                println!("\x1b[1m___________ {} ___________\x1b[0m", test_id);
                println!();
                println!("{}", message);
            }
        }

        let summary_color = if summary.all_passed() {
            "\x1b[1;32m"
        } else {
            "\x1b[1;31m"
        };

        let mut parts = Vec::new();
        if summary.passed > 0 {
            parts.push(format!("{} passed", summary.passed));
        }
        if summary.failed > 0 {
            parts.push(format!("{} failed", summary.failed));
        }
        if summary.timed_out > 0 {
            parts.push(format!("{} timed out", summary.timed_out));
        }
        if parts.is_empty() {
            parts.push("no cases run".to_string());
        }

        println!();
        println!(
            "{}=================== {} in {:.2}s ===================\x1b[0m",
            summary_color,
            parts.join(", "),
            summary.duration.as_secs_f64()
        );
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Run the `check` driver with the default console reporter.
pub fn run_check(config: &HarnessConfig, opts: &CheckOptions) -> CliResult<ExitCode> {
    let mut reporter = ConsoleReporter::new(opts.verbose);
    run_check_with_reporter(config, opts, &mut reporter)
}

/// Run the `check` driver against an arbitrary reporter.
pub fn run_check_with_reporter(
    config: &HarnessConfig,
    opts: &CheckOptions,
    reporter: &mut dyn Reporter,
) -> CliResult<ExitCode> {
    let start_time = Instant::now();

    // Collection. A broken manifest must be visible as a failing case, not
    // as an empty run.
    let exercises = match config.load_exercises() {
        Ok(exercises) => exercises,
        Err(err) => {
            reporter.on_collection_complete(1);
            let status = CaseStatus::Failed(
                Duration::ZERO,
                format!("Failed to load exercises from info.toml: {err}"),
            );
            reporter.on_case_start(COLLECTION_CASE_ID);
            reporter.on_case_complete(COLLECTION_CASE_ID, &status);
            reporter.on_session_complete(&CheckSummary {
                total: 1,
                passed: 0,
                failed: 1,
                timed_out: 0,
                duration: start_time.elapsed(),
            });
            return Err(CliError::new("", ExitCode::FAILURE));
        }
    };

    let cases: Vec<Exercise> = exercises
        .into_iter()
        .filter(|ex| match &opts.filter {
            Some(keyword) => ex.test_id().contains(keyword),
            None => true,
        })
        .collect();

    if cases.is_empty() {
        // An empty collection still goes through the reporter, and exits
        // distinctly so a typo'd filter cannot pass for a green run.
        reporter.on_collection_complete(0);
        reporter.on_session_complete(&CheckSummary {
            total: 0,
            passed: 0,
            failed: 0,
            timed_out: 0,
            duration: start_time.elapsed(),
        });
        return Ok(ExitCode::NO_CASES);
    }

    reporter.on_collection_complete(cases.len());

    // Shared one-time setup for this worker. A setup failure poisons every
    // case with the same message.
    let session = Session::obtain(config);

    let mut passed = 0;
    let mut failed = 0;
    let mut timed_out = 0;
    let total = cases.len();

    match session.as_ref() {
        Err(setup_err) => {
            let message = format!("worker session setup failed: {setup_err}");
            for exercise in &cases {
                let test_id = exercise.test_id();
                let status = CaseStatus::Failed(Duration::ZERO, message.clone());
                reporter.on_case_start(&test_id);
                reporter.on_case_complete(&test_id, &status);
                failed += 1;
            }
        }
        Ok(session) => {
            for exercise in &cases {
                let test_id = exercise.test_id();
                reporter.on_case_start(&test_id);

                let status = run_case(config, session, exercise);
                match &status {
                    CaseStatus::Passed(_) => passed += 1,
                    CaseStatus::Failed(_, _) => failed += 1,
                    CaseStatus::TimedOut(_, _) => timed_out += 1,
                }
                let stop = opts.stop_on_fail && status.is_failure();
                reporter.on_case_complete(&test_id, &status);
                if stop {
                    break;
                }
            }
        }
    }

    let summary = CheckSummary {
        total,
        passed,
        failed,
        timed_out,
        duration: start_time.elapsed(),
    };
    let all_passed = summary.all_passed();
    reporter.on_session_complete(&summary);

    if all_passed {
        Ok(ExitCode::SUCCESS)
    } else {
        // Summary already printed; exit non-zero without repeating it.
        Err(CliError::new("", ExitCode::FAILURE))
    }
}

/// Run one solution file inside the initialized worker repository. Shared
/// with watch mode, which re-runs single cases on file change.
pub(crate) fn run_case(config: &HarnessConfig, session: &Session, exercise: &Exercise) -> CaseStatus {
    let started = Instant::now();

    let outcome = run_python_file(
        &config.python_bin,
        &exercise.solution_path,
        session.repo_dir(),
        session.env(),
        config.case_timeout,
    );

    match outcome {
        Ok(output) if output.success() => CaseStatus::Passed(started.elapsed()),
        Ok(output) => CaseStatus::Failed(started.elapsed(), failure_message(exercise, &output)),
        Err(RunnerError::TimedOut {
            timeout_s,
            stdout,
            stderr,
            ..
        }) => CaseStatus::TimedOut(
            started.elapsed(),
            timeout_message(exercise, timeout_s, &stdout, &stderr),
        ),
        Err(other) => CaseStatus::Failed(
            started.elapsed(),
            format!(
                "Could not run solution {}:\nSolution file: {}\n{}",
                exercise.test_id(),
                exercise.solution_path.display(),
                other
            ),
        ),
    }
}

/// Diagnostics for a non-zero exit: everything needed to reproduce and
/// debug without rerunning.
fn failure_message(exercise: &Exercise, output: &RunOutput) -> String {
    format!(
        "Solution pipeline failed: {}\n\
         Pipeline name: {}\n\
         Solution file: {}\n\
         Exit code: {}\n\
         \n--- STDOUT ---\n{}\n\
         \n--- STDERR ---\n{}\n",
        exercise.test_id(),
        exercise.pipeline_name,
        exercise.solution_path.display(),
        output.exit_code,
        output.stdout,
        output.stderr,
    )
}

/// Diagnostics for a timeout; distinct from a non-zero exit because the
/// child never terminated on its own.
fn timeout_message(exercise: &Exercise, timeout_s: u64, stdout: &str, stderr: &str) -> String {
    format!(
        "Solution pipeline timed out: {}\n\
         Pipeline name: {}\n\
         Solution file: {}\n\
         No exit within {} s; the process was killed\n\
         \n--- STDOUT (partial) ---\n{}\n\
         \n--- STDERR (partial) ---\n{}\n",
        exercise.test_id(),
        exercise.pipeline_name,
        exercise.solution_path.display(),
        timeout_s,
        stdout,
        stderr,
    )
}

// ============================================================================
// Tests
// ============================================================================
