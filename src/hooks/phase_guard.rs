//! `PreToolUse` hook: denies `Write`/`Edit` calls that would touch the wrong
//! kind of file for the workflow's current phase.

use crate::hooks::protocol::HookOutput;
use crate::logger::SupervisorLogger;
use waypoints_common::{Phase, TechnologyProfile};

#[derive(Debug, PartialEq, Eq)]
enum FileClass {
    MainSource,
    TestSource,
    Config,
    Other,
}

fn classify(profile: &TechnologyProfile, path: &str) -> FileClass {
    if crate::profile::is_config_file(profile, path) {
        FileClass::Config
    } else if crate::profile::is_test_source(profile, path) {
        FileClass::TestSource
    } else if crate::profile::is_main_source(profile, path) {
        FileClass::MainSource
    } else {
        FileClass::Other
    }
}

/// The phase/file-class denial table from the design: `None` means allow.
fn denial_reason(phase: Phase, class: &FileClass) -> Option<&'static str> {
    match (phase, class) {
        (1, FileClass::MainSource) | (1, FileClass::TestSource) => {
            Some("Phase 1 is for gathering requirements — no source or test edits yet")
        }
        (2, FileClass::TestSource) => {
            Some("Phase 2 is for designing interfaces — tests come in phase 3")
        }
        (3, FileClass::MainSource) => {
            Some("Phase 3 is for writing tests — implementation comes in phase 4")
        }
        _ => None,
    }
}

/// Runs the blocking glob classification on a worker thread and returns the
/// hook's decision. `path` is the tool's target file, already extracted
/// from `tool_input` by the caller.
pub async fn check_write(
    profile: TechnologyProfile,
    phase: Phase,
    path: String,
    logger: &SupervisorLogger,
) -> HookOutput {
    let path_for_classify = path.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let class = classify(&profile, &path_for_classify);
        denial_reason(phase, &class)
    })
    .await
    .unwrap_or(None);

    match outcome {
        Some(reason) => {
            logger.log_wp(&format!("Blocked {path} - {reason}"));
            HookOutput::deny(reason)
        }
        None => HookOutput::allow(),
    }
}

/// Unmatched `PreToolUse` hook: logs every tool invocation, never denies.
pub fn log_tool_use(logger: &SupervisorLogger, tool_name: &str, file_path: Option<&str>, command: Option<&str>) {
    let preview = match (file_path, command) {
        (Some(path), _) => path.to_string(),
        (None, Some(cmd)) => truncate(cmd, 50),
        (None, None) => String::new(),
    };
    logger.log_event("TOOL", &format!("{tool_name} {preview}"));
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let prefix: String = s.chars().take(max_chars).collect();
        format!("{prefix}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rust_profile() -> TechnologyProfile {
        TechnologyProfile::default()
    }

    #[tokio::test]
    async fn phase_one_denies_main_source() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SupervisorLogger::new(dir.path(), "wf");
        let result = check_write(rust_profile(), 1, "src/lib.rs".to_string(), &logger).await;
        assert!(result.is_deny());
    }

    #[tokio::test]
    async fn phase_two_denies_test_source_but_allows_main() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SupervisorLogger::new(dir.path(), "wf");
        let denied = check_write(rust_profile(), 2, "tests/foo.rs".to_string(), &logger).await;
        assert!(denied.is_deny());

        let allowed = check_write(rust_profile(), 2, "src/lib.rs".to_string(), &logger).await;
        assert!(allowed.is_allow());
    }

    #[tokio::test]
    async fn phase_three_denies_main_source_allows_tests() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SupervisorLogger::new(dir.path(), "wf");
        let denied = check_write(rust_profile(), 3, "src/lib.rs".to_string(), &logger).await;
        assert!(denied.is_deny());

        let allowed = check_write(rust_profile(), 3, "tests/foo.rs".to_string(), &logger).await;
        assert!(allowed.is_allow());
    }

    #[tokio::test]
    async fn phase_four_allows_everything() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SupervisorLogger::new(dir.path(), "wf");
        let result = check_write(rust_profile(), 4, "src/lib.rs".to_string(), &logger).await;
        assert!(result.is_allow());
    }
}
