//! Exercise manifest loading.
//!
//! A zenlings pack is a directory containing `info.toml` and a `solutions/`
//! tree. The manifest declares an ordered list of exercises; each entry maps
//! to one solution file at `solutions/<dir>/<name>.py`. Loading fails fast
//! on any entry whose solution file does not exist, so a broken manifest is
//! caught at collection time rather than mid-run.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The only manifest format this harness understands.
const SUPPORTED_FORMAT_VERSION: u32 = 1;

/// Errors raised while loading the exercise manifest.
#[derive(Debug, Clone, Error)]
pub enum ManifestError {
    #[error("info.toml not found at {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unsupported info.toml format version: {0} (expected {SUPPORTED_FORMAT_VERSION})")]
    FormatVersion(u32),

    #[error("no exercises declared in {0}")]
    Empty(PathBuf),

    #[error("solution file not found: {path} (declared in info.toml as '{name}')")]
    MissingSolution { path: PathBuf, name: String },
}

/// Root structure of `info.toml`.
#[derive(Debug, Deserialize)]
struct InfoToml {
    #[serde(default = "default_format_version")]
    format_version: u32,
    #[serde(default)]
    exercises: Vec<ExerciseEntry>,
}

fn default_format_version() -> u32 {
    SUPPORTED_FORMAT_VERSION
}

/// Raw exercise entry as declared in the manifest.
#[derive(Debug, Deserialize)]
struct ExerciseEntry {
    name: String,
    dir: String,
    #[serde(default)]
    hint: Option<String>,
    #[serde(default)]
    pipeline_name: Option<String>,
}

/// A loaded, validated exercise. Immutable after collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exercise {
    /// Exercise name, unique within its group.
    pub name: String,
    /// Category subdirectory under `solutions/` (the manifest's `dir`).
    pub group: String,
    /// Optional hint shown by watch mode when the exercise fails.
    pub hint: Option<String>,
    /// Top-level pipeline callable the solution is expected to define.
    /// Defaults to `{name}_pipeline` when the manifest does not say.
    pub pipeline_name: String,
    /// Resolved path to the solution source file. Exists at load time.
    pub solution_path: PathBuf,
}

impl Exercise {
    /// Human-readable case identifier, `"{group}/{name}"`.
    pub fn test_id(&self) -> String {
        format!("{}/{}", self.group, self.name)
    }
}

/// Load and validate all exercises from a pack root.
///
/// Output order matches the manifest's declared order; case ids and any
/// ordering-sensitive tooling depend on this.
pub fn load_exercises(pack_root: &Path) -> Result<Vec<Exercise>, ManifestError> {
    let manifest_path = pack_root.join("info.toml");
    if !manifest_path.exists() {
        return Err(ManifestError::NotFound(manifest_path));
    }

    let content = fs::read_to_string(&manifest_path).map_err(|err| ManifestError::Read {
        path: manifest_path.clone(),
        message: err.to_string(),
    })?;

    let info: InfoToml = toml::from_str(&content).map_err(|err| ManifestError::Parse {
        path: manifest_path.clone(),
        message: err.to_string(),
    })?;

    if info.format_version != SUPPORTED_FORMAT_VERSION {
        return Err(ManifestError::FormatVersion(info.format_version));
    }
    if info.exercises.is_empty() {
        return Err(ManifestError::Empty(manifest_path));
    }

    let solutions_root = pack_root.join("solutions");
    let mut exercises = Vec::with_capacity(info.exercises.len());

    for entry in info.exercises {
        let solution_path = solutions_root
            .join(&entry.dir)
            .join(format!("{}.py", entry.name));

        if !solution_path.exists() {
            return Err(ManifestError::MissingSolution {
                path: solution_path,
                name: entry.name,
            });
        }

        let pipeline_name = entry
            .pipeline_name
            .unwrap_or_else(|| format!("{}_pipeline", entry.name));

        exercises.push(Exercise {
            name: entry.name,
            group: entry.dir,
            hint: entry.hint,
            pipeline_name,
            solution_path,
        });
    }

    Ok(exercises)
}

/// Find the pack root by searching upward from `start` for `info.toml`.
pub fn find_pack_root(start: &Path) -> Result<PathBuf, ManifestError> {
    let mut current = if start.is_file() {
        start.parent().unwrap_or(start).to_path_buf()
    } else {
        start.to_path_buf()
    };

    loop {
        if current.join("info.toml").exists() {
            return Ok(current);
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return Err(ManifestError::NotFound(start.join("info.toml"))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exercise_test_id() {
        let exercise = Exercise {
            name: "load1".to_string(),
            group: "01_loading".to_string(),
            hint: None,
            pipeline_name: "load1_pipeline".to_string(),
            solution_path: PathBuf::from("/pack/solutions/01_loading/load1.py"),
        };
        assert_eq!(exercise.test_id(), "01_loading/load1");
    }

    #[test]
    fn test_missing_manifest_names_path() {
        let err = load_exercises(Path::new("/nonexistent/pack")).unwrap_err();
        match err {
            ManifestError::NotFound(path) => {
                assert_eq!(path, PathBuf::from("/nonexistent/pack/info.toml"));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_format_version_rejected() {
        let info: InfoToml = toml::from_str("format_version = 2\n").unwrap();
        assert_eq!(info.format_version, 2);
        // Loader-level rejection is covered by the integration tests; here we
        // only pin the parse default.
        let defaulted: InfoToml = toml::from_str("").unwrap();
        assert_eq!(defaulted.format_version, SUPPORTED_FORMAT_VERSION);
    }

    #[test]
    fn test_entry_optional_fields() {
        let info: InfoToml = toml::from_str(
            r#"
            [[exercises]]
            name = "intro1"
            dir = "00_intro"

            [[exercises]]
            name = "map1"
            dir = "02_map"
            hint = "Use the @step decorator"
            pipeline_name = "fan_out_pipeline"
            "#,
        )
        .unwrap();

        assert_eq!(info.exercises[0].pipeline_name, None);
        assert_eq!(info.exercises[0].hint, None);
        assert_eq!(
            info.exercises[1].pipeline_name.as_deref(),
            Some("fan_out_pipeline")
        );
        assert_eq!(
            info.exercises[1].hint.as_deref(),
            Some("Use the @step decorator")
        );
    }
}
