//! Environment construction for ZenML subprocesses.
//!
//! Every child process the harness launches (solution scripts and the
//! `zenml` CLI itself) runs with an environment built here: the parent
//! environment plus a fixed set of overrides that pin HOME to an isolated
//! directory and force ZenML into deterministic, non-interactive behavior.

use std::collections::BTreeMap;
use std::path::Path;

/// Overrides applied on top of the base environment, in addition to `HOME`.
///
/// These disable analytics, the dashboard auto-open, and rich traceback
/// rendering, and fix logging verbosity and text encoding so captured
/// output is stable across platforms.
const FIXED_OVERRIDES: &[(&str, &str)] = &[
    ("ZENML_ANALYTICS_OPT_IN", "false"),
    ("ZENML_LOGGING_VERBOSITY", "INFO"),
    ("AUTO_OPEN_DASHBOARD", "false"),
    ("ZENML_ENABLE_RICH_TRACEBACK", "false"),
    ("PYTHONIOENCODING", "utf-8"),
];

/// Build the subprocess environment from an explicit base environment.
///
/// Pure function of its inputs: the same base and home always produce the
/// same mapping. The base environment is copied wholesale (which preserves
/// `PATH`), then `HOME` is pointed at `home` and the fixed overrides are
/// applied.
pub fn zenml_env<I, K, V>(base: I, home: &Path) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut env: BTreeMap<String, String> =
        base.into_iter().map(|(k, v)| (k.into(), v.into())).collect();

    env.insert("HOME".to_string(), home.display().to_string());
    for (key, value) in FIXED_OVERRIDES {
        env.insert((*key).to_string(), (*value).to_string());
    }

    env
}

/// Build the subprocess environment from the current process environment.
pub fn zenml_env_from_process(home: &Path) -> BTreeMap<String, String> {
    zenml_env(std::env::vars(), home)
}

// ============================================================================
// Tests
// ============================================================================
