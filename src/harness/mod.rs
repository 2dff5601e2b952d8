//! The solution-check harness.
//!
//! Everything needed to run a zenlings pack's solutions unattended:
//!
//! - `manifest` - loads `info.toml` into validated exercise descriptors
//! - `env` - builds the deterministic subprocess environment
//! - `worker` - per-worker HOME/repo isolation
//! - `init` - one-shot `zenml init` per worker session
//! - `runner` - subprocess execution with bounded waits
//! - `progress` - watch-mode progress persistence
//!
//! The harness performs no concurrency of its own. Parallelism, when
//! present, comes from an external distributor that launches separate
//! processes with disjoint worker identities; disjoint scratch directories
//! make cross-worker coordination unnecessary.

pub mod env;
pub mod init;
pub mod manifest;
pub mod progress;
pub mod runner;
pub mod worker;

use std::path::PathBuf;
use std::time::Duration;

/// Per-case execution budget (seconds).
pub const DEFAULT_CASE_TIMEOUT_S: u64 = 300;

/// Budget for `zenml init` (seconds).
pub const DEFAULT_INIT_TIMEOUT_S: u64 = 120;

/// Budget for ZenML CLI metadata queries, e.g. run-status lookups (seconds).
pub const DEFAULT_QUERY_TIMEOUT_S: u64 = 60;

/// Shared harness configuration, threaded explicitly through the driver and
/// setup code; there is no global state beyond the per-worker session cache.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Pack root: the directory holding `info.toml` and `solutions/`.
    pub pack_root: PathBuf,
    /// Python interpreter used to run solution files.
    pub python_bin: String,
    /// ZenML CLI binary name or explicit path.
    pub zenml_bin: String,
    /// Budget for one solution run.
    pub case_timeout: Duration,
    /// Budget for `zenml init`.
    pub init_timeout: Duration,
    /// Budget for ZenML CLI metadata queries.
    pub query_timeout: Duration,
    /// Explicit worker identity; `None` resolves from the environment.
    pub worker_id: Option<String>,
}

impl HarnessConfig {
    pub fn new(pack_root: impl Into<PathBuf>) -> Self {
        Self {
            pack_root: pack_root.into(),
            python_bin: "python".to_string(),
            zenml_bin: "zenml".to_string(),
            case_timeout: Duration::from_secs(DEFAULT_CASE_TIMEOUT_S),
            init_timeout: Duration::from_secs(DEFAULT_INIT_TIMEOUT_S),
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_S),
            worker_id: None,
        }
    }

    /// Root of the solutions tree inside the pack.
    pub fn solutions_dir(&self) -> PathBuf {
        self.pack_root.join("solutions")
    }

    /// Load the pack's exercises with this config's pack root.
    pub fn load_exercises(&self) -> Result<Vec<manifest::Exercise>, manifest::ManifestError> {
        manifest::load_exercises(&self.pack_root)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_timeouts_are_independent_budgets() {
        let config = HarnessConfig::new("/pack");
        assert_eq!(config.case_timeout, Duration::from_secs(DEFAULT_CASE_TIMEOUT_S));
        assert_eq!(config.init_timeout, Duration::from_secs(DEFAULT_INIT_TIMEOUT_S));
        assert_eq!(config.query_timeout, Duration::from_secs(DEFAULT_QUERY_TIMEOUT_S));
        assert_ne!(config.query_timeout, config.init_timeout);
        assert_ne!(config.query_timeout, config.case_timeout);
    }
}
