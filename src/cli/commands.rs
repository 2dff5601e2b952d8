//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use crate::harness::HarnessConfig;
use crate::harness::init::{Session, locate_zenml};
use crate::harness::manifest::Exercise;
use crate::harness::runner::{RunnerError, run_python_file, run_tool};

use super::{CliError, CliResult, ExitCode};

/// Pipeline run status that counts as a verified pass.
const EXPECTED_RUN_STATUS: &str = "completed";

// ============================================================================
// list
// ============================================================================

/// Print the exercises declared in info.toml, in manifest order.
pub fn list_exercises(config: &HarnessConfig) -> CliResult<ExitCode> {
    let exercises = config
        .load_exercises()
        .map_err(|e| CliError::failure(e.to_string()))?;

    for exercise in &exercises {
        println!(
            "{:<30} {}",
            exercise.test_id(),
            exercise.solution_path.display()
        );
    }
    println!();
    println!("{} exercise(s)", exercises.len());

    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// verify
// ============================================================================

/// Run one named solution in the worker's initialized repository.
///
/// With `simple`, only the exit code is checked. Otherwise the latest run of
/// the exercise's pipeline is queried through the ZenML CLI and must report
/// "completed" status.
pub fn verify_solution(config: &HarnessConfig, name: &str, simple: bool) -> CliResult<ExitCode> {
    let exercises = config
        .load_exercises()
        .map_err(|e| CliError::failure(e.to_string()))?;

    let exercise = exercises
        .iter()
        .find(|ex| ex.name == name || ex.test_id() == name)
        .ok_or_else(|| CliError::failure(format!("no exercise named '{name}' in info.toml")))?;

    let session = Session::obtain(config);
    let session = match session.as_ref() {
        Ok(session) => session,
        Err(setup_err) => {
            return Err(CliError::failure(format!(
                "worker session setup failed: {setup_err}"
            )));
        }
    };

    let output = run_python_file(
        &config.python_bin,
        &exercise.solution_path,
        session.repo_dir(),
        session.env(),
        config.case_timeout,
    )
    .map_err(|err| match err {
        RunnerError::TimedOut {
            timeout_s, stdout, ..
        } => CliError::failure(format!(
            "{} timed out after {} s\n--- STDOUT (partial) ---\n{}",
            exercise.test_id(),
            timeout_s,
            stdout
        )),
        other => CliError::failure(other.to_string()),
    })?;

    if !output.success() {
        return Err(CliError::failure(format!(
            "{} failed with exit code {}\n--- STDOUT ---\n{}\n--- STDERR ---\n{}",
            exercise.test_id(),
            output.exit_code,
            output.stdout,
            output.stderr
        )));
    }

    if simple {
        println!("{}: exit code 0", exercise.test_id());
        return Ok(ExitCode::SUCCESS);
    }

    check_run_status(config, session, exercise)
}

/// Query the latest run of the exercise's pipeline via the ZenML CLI.
fn check_run_status(
    config: &HarnessConfig,
    session: &Session,
    exercise: &Exercise,
) -> CliResult<ExitCode> {
    let zenml = locate_zenml(&config.zenml_bin).map_err(|e| CliError::failure(e.to_string()))?;

    let output = run_tool(
        &zenml.to_string_lossy(),
        &[
            "pipeline",
            "runs",
            "list",
            "--pipeline",
            &exercise.pipeline_name,
            "--size",
            "1",
            "--output",
            "json",
        ],
        session.repo_dir(),
        session.env(),
        config.query_timeout,
    )
    .map_err(|e| CliError::failure(format!("zenml run-status query failed: {e}")))?;

    if !output.success() {
        return Err(CliError::failure(format!(
            "zenml run-status query failed with exit code {}\n{}\n{}",
            output.exit_code, output.stdout, output.stderr
        )));
    }

    match parse_run_status(&output.stdout) {
        Some(status) if status == EXPECTED_RUN_STATUS => {
            println!(
                "{}: pipeline '{}' {}",
                exercise.test_id(),
                exercise.pipeline_name,
                status
            );
            Ok(ExitCode::SUCCESS)
        }
        Some(status) => Err(CliError::failure(format!(
            "{}: pipeline '{}' status '{}', expected '{}'",
            exercise.test_id(),
            exercise.pipeline_name,
            status,
            EXPECTED_RUN_STATUS
        ))),
        None => Err(CliError::failure(format!(
            "{}: no runs recorded for pipeline '{}'",
            exercise.test_id(),
            exercise.pipeline_name
        ))),
    }
}

/// Extract the latest run status from `zenml pipeline runs list` JSON.
fn parse_run_status(json_str: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(json_str).ok()?;

    value
        .get("items")?
        .get(0)?
        .get("body")?
        .get("status")?
        .as_str()
        .map(|s| s.to_string())
}

// ============================================================================
// Tests
// ============================================================================
