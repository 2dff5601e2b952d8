//! Property-based tests for the environment builder and manifest loader

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use proptest::prelude::*;

use zenlings::harness::env::zenml_env;
use zenlings::harness::manifest::load_exercises;

/// Environment variable names that never collide with the fixed overrides.
fn base_key() -> impl Strategy<Value = String> {
    "[A-Z][A-Z0-9_]{0,11}".prop_filter("reserved by the harness", |k| {
        !matches!(
            k.as_str(),
            "HOME"
                | "ZENML_ANALYTICS_OPT_IN"
                | "ZENML_LOGGING_VERBOSITY"
                | "AUTO_OPEN_DASHBOARD"
                | "ZENML_ENABLE_RICH_TRACEBACK"
                | "PYTHONIOENCODING"
        )
    })
}

fn base_env() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map(base_key(), "[ -~]{0,16}", 0..8)
}

fn exercise_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,11}"
}

proptest! {
    /// Same base and home always produce the same mapping.
    #[test]
    fn prop_env_is_deterministic(base in base_env(), home in "[a-z0-9_/]{1,24}") {
        let home = PathBuf::from(format!("/{home}"));
        let first = zenml_env(base.clone(), &home);
        let second = zenml_env(base, &home);
        prop_assert_eq!(first, second);
    }

    /// HOME and the fixed ZenML overrides win over whatever the base says.
    #[test]
    fn prop_env_overrides_always_win(
        base in base_env(),
        stale_home in "[ -~]{0,16}",
        stale_opt_in in "[ -~]{0,16}",
        home in "[a-z0-9_/]{1,24}",
    ) {
        let home = PathBuf::from(format!("/{home}"));
        let mut base = base;
        base.insert("HOME".to_string(), stale_home);
        base.insert("ZENML_ANALYTICS_OPT_IN".to_string(), stale_opt_in);

        let env = zenml_env(base, &home);
        prop_assert_eq!(env.get("HOME"), Some(&home.display().to_string()));
        prop_assert_eq!(
            env.get("ZENML_ANALYTICS_OPT_IN").map(String::as_str),
            Some("false")
        );
        prop_assert_eq!(
            env.get("PYTHONIOENCODING").map(String::as_str),
            Some("utf-8")
        );
    }

    /// Every base variable outside the override set passes through untouched.
    #[test]
    fn prop_env_passes_base_through(base in base_env(), home in "[a-z0-9_/]{1,24}") {
        let home = PathBuf::from(format!("/{home}"));
        let env = zenml_env(base.clone(), &home);
        for (key, value) in &base {
            prop_assert_eq!(env.get(key), Some(value));
        }
    }

    /// Loaded exercises come back in manifest order with `"{dir}/{name}"` ids.
    #[test]
    fn prop_manifest_order_is_preserved(
        names in prop::collection::btree_set(exercise_name(), 1..6),
        dir in "[0-9]{2}_[a-z]{1,8}",
    ) {
        // btree_set deduplicates; reverse so the manifest order differs from
        // the sorted directory listing.
        let names: Vec<String> = names.into_iter().rev().collect();

        let pack = tempfile::tempdir().unwrap();
        let mut manifest = String::from("format_version = 1\n");
        for name in &names {
            manifest.push_str(&format!(
                "\n[[exercises]]\nname = \"{name}\"\ndir = \"{dir}\"\n"
            ));
            let solution_dir = pack.path().join("solutions").join(&dir);
            fs::create_dir_all(&solution_dir).unwrap();
            fs::write(solution_dir.join(format!("{name}.py")), "print('ok')\n").unwrap();
        }
        fs::write(pack.path().join("info.toml"), manifest).unwrap();

        let exercises = load_exercises(pack.path()).unwrap();
        let ids: Vec<String> = exercises.iter().map(|e| e.test_id()).collect();
        let expected: Vec<String> = names.iter().map(|n| format!("{dir}/{n}")).collect();
        prop_assert_eq!(ids, expected);

        for exercise in &exercises {
            prop_assert_eq!(exercise.pipeline_name.clone(), format!("{}_pipeline", exercise.name));
        }
    }
}
