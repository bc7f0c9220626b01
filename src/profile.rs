//! Technology profile resolution.
//!
//! A profile supplies the glob patterns and compile/test commands the Phase
//! Guard and Build Verifier use. Auto-detecting *which* profile fits a
//! project from its file tree is out of scope here (a pure-helper concern
//! named as deliberately excluded); this module only resolves an already-
//! named profile out of `wp-config.json` / `wp-override.json`, falling back
//! to a small set of built-ins.

use serde_json::Value;
use std::path::Path;
use waypoints_common::TechnologyProfile;

const OVERRIDE_FILENAME: &str = "wp-override.json";
const PROJECT_CONFIG_FILENAME: &str = "wp-config.json";

/// Resolve the active profile id: override file, then `WP_DEFAULT_PROFILE`,
/// then the generic fallback. The auto-detection scoring algorithm the
/// original implements (points per matching file/pattern) is not ported.
pub fn detect_profile_id(working_dir: &Path) -> String {
    if let Some(id) = read_override_profile_id() {
        return id;
    }
    if let Ok(id) = std::env::var("WP_DEFAULT_PROFILE") {
        if !id.is_empty() {
            return id;
        }
    }
    let _ = working_dir; // reserved for a future real detector
    "generic".to_string()
}

fn read_override_profile_id() -> Option<String> {
    let override_path = override_file_path();
    let value = read_json_file(&override_path)?;
    value
        .get("activeProfile")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn override_file_path() -> std::path::PathBuf {
    if let Ok(path) = std::env::var("WP_OVERRIDE_FILE") {
        return std::path::PathBuf::from(path);
    }
    home_dir().join(".claude").join(OVERRIDE_FILENAME)
}

fn home_dir() -> std::path::PathBuf {
    dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from("."))
}

fn read_json_file(path: &Path) -> Option<Value> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Dotted-path lookup into a `serde_json::Value`, e.g. `profiles.rust.compile`.
fn get_path<'a>(value: &'a Value, dotted_path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in dotted_path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Load a profile by id, reading `wp-config.json` at the project root (if
/// present) and overlaying the operator override file. Falls back to
/// [`TechnologyProfile::default`] (a generic profile with no compile/test
/// commands) if nothing configures this id.
pub fn load_profile(working_dir: &Path, profile_id: &str) -> TechnologyProfile {
    let project_config = read_json_file(&working_dir.join(PROJECT_CONFIG_FILENAME));
    let override_config = read_json_file(&override_file_path());

    let lookup = |field: &str| -> Option<Value> {
        let path = format!("profiles.{profile_id}.{field}");
        override_config
            .as_ref()
            .and_then(|v| get_path(v, &path))
            .or_else(|| project_config.as_ref().and_then(|v| get_path(v, &path)))
            .cloned()
    };

    // `sourcePatterns.{main,test,config}` may be a single glob string or an
    // array of them; either form is accepted.
    let string_list = |field: &str| -> Vec<String> {
        match lookup(field) {
            Some(Value::Array(arr)) => arr
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => vec![s],
            _ => Vec::new(),
        }
    };

    let string_field =
        |field: &str| -> Option<String> { lookup(field).and_then(|v| v.as_str().map(str::to_string)) };

    let mut profile = TechnologyProfile {
        id: profile_id.to_string(),
        main_source_patterns: string_list("sourcePatterns.main"),
        test_source_patterns: string_list("sourcePatterns.test"),
        config_file_patterns: string_list("sourcePatterns.config"),
        compile: string_field("commands.compile"),
        test_compile: string_field("commands.testCompile"),
        test: string_field("commands.test"),
        todo_placeholder: string_field("todoPlaceholder"),
    };

    if profile.main_source_patterns.is_empty()
        && profile.test_source_patterns.is_empty()
        && profile.compile.is_none()
    {
        // Nothing configured this profile id at all; use the generic built-in
        // rather than an empty, always-allow profile.
        let generic = TechnologyProfile::default();
        profile.main_source_patterns = generic.main_source_patterns;
        profile.test_source_patterns = generic.test_source_patterns;
        profile.todo_placeholder = generic.todo_placeholder;
    }

    profile
}

pub fn is_main_source(profile: &TechnologyProfile, path: &str) -> bool {
    crate::pattern::matches_any(&profile.main_source_patterns, path)
}

pub fn is_test_source(profile: &TechnologyProfile, path: &str) -> bool {
    crate::pattern::matches_any(&profile.test_source_patterns, path)
}

pub fn is_config_file(profile: &TechnologyProfile, path: &str) -> bool {
    crate::pattern::matches_any(&profile.config_file_patterns, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_classifies_rust_layout() {
        let profile = TechnologyProfile::default();
        assert!(is_main_source(&profile, "src/lib.rs"));
        assert!(is_test_source(&profile, "tests/foo.rs"));
        assert!(!is_main_source(&profile, "tests/foo.rs"));
    }

    #[test]
    fn detect_profile_id_falls_back_to_generic() {
        // No override file / env var present in a clean test process.
        std::env::remove_var("WP_DEFAULT_PROFILE");
        let dir = std::env::temp_dir();
        assert_eq!(detect_profile_id(&dir), "generic");
    }

    #[test]
    fn load_profile_reads_nested_commands_and_source_patterns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILENAME),
            r#"{
                "profiles": {
                    "rust": {
                        "sourcePatterns": {
                            "main": ["src/**/*.rs"],
                            "test": ["tests/**/*.rs"],
                            "config": "Cargo.toml"
                        },
                        "commands": {
                            "compile": "cargo build",
                            "testCompile": "cargo build --tests",
                            "test": "cargo test"
                        },
                        "todoPlaceholder": "{file}"
                    }
                }
            }"#,
        )
        .unwrap();
        // Point the override file somewhere empty so it doesn't shadow the
        // project config written above.
        std::env::set_var("WP_OVERRIDE_FILE", dir.path().join("no-override.json"));

        let profile = load_profile(dir.path(), "rust");

        assert_eq!(profile.compile.as_deref(), Some("cargo build"));
        assert_eq!(profile.test_compile.as_deref(), Some("cargo build --tests"));
        assert_eq!(profile.test.as_deref(), Some("cargo test"));
        assert_eq!(profile.main_source_patterns, vec!["src/**/*.rs".to_string()]);
        assert_eq!(profile.test_source_patterns, vec!["tests/**/*.rs".to_string()]);
        assert_eq!(profile.config_file_patterns, vec!["Cargo.toml".to_string()]);
        assert_eq!(profile.todo_placeholder.as_deref(), Some("{file}"));

        std::env::remove_var("WP_OVERRIDE_FILE");
    }
}
