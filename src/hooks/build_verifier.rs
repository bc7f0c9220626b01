//! `Stop` hook: runs the active profile's compile/test commands before
//! letting the assistant end its turn, blocking on the first failure.

use crate::hooks::protocol::HookOutput;
use crate::logger::SupervisorLogger;
use std::time::Duration;
use waypoints_common::{Phase, TechnologyProfile};

const OUTPUT_TRUNCATE_BYTES: usize = 2000;
const PHASE_FOUR_TEST_TIMEOUT_SECS: u64 = 300;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

const PLACEHOLDER_TOKENS: &[&str] = &["{file}", "{testClass}", "{testName}", "{testFile}"];

fn contains_placeholder(text: &str) -> bool {
    PLACEHOLDER_TOKENS.iter().any(|token| text.contains(token))
}

struct CommandOutcome {
    success: bool,
    output: String,
}

async fn run_command(cmd: &str, timeout_secs: u64) -> CommandOutcome {
    let spawn = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .output();

    match tokio::time::timeout(Duration::from_secs(timeout_secs), spawn).await {
        Ok(Ok(output)) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            CommandOutcome {
                success: output.status.success(),
                output: combined,
            }
        }
        Ok(Err(err)) => CommandOutcome {
            success: false,
            output: format!("failed to spawn command: {err}"),
        },
        Err(_) => CommandOutcome {
            success: false,
            output: format!("Command timed out after {timeout_secs} seconds"),
        },
    }
}

fn truncate_output(output: &str) -> String {
    if output.len() <= OUTPUT_TRUNCATE_BYTES {
        output.to_string()
    } else {
        output.chars().take(OUTPUT_TRUNCATE_BYTES).collect()
    }
}

fn format_compile_error(profile: &str, command: &str, output: &str) -> String {
    format!(
        "## Compilation FAILED ({profile})\n\n**Command:** `{command}`\n\n**Output:**\n```\n{}\n```\n\nFix the compilation errors and try again.",
        truncate_output(output)
    )
}

fn format_test_failure(profile: &str, output: &str) -> String {
    format!(
        "## Tests FAILED ({profile})\n\n**Output:**\n```\n{}\n```\n\nFix the failing tests and try again.",
        truncate_output(output)
    )
}

/// Phase document + input context concatenated, used only to check for
/// leftover placeholder tokens.
pub async fn verify(
    profile: &TechnologyProfile,
    phase: Phase,
    phase_text: &str,
    stop_hook_active: bool,
    logger: &SupervisorLogger,
) -> HookOutput {
    if stop_hook_active {
        return HookOutput::allow();
    }

    match phase {
        1 => HookOutput::allow(),
        2 => verify_single(profile, profile.compile.as_deref(), phase_text, DEFAULT_TIMEOUT_SECS, logger).await,
        3 => {
            let command = profile.test_compile.as_deref().or(profile.compile.as_deref());
            verify_single(profile, command, phase_text, DEFAULT_TIMEOUT_SECS, logger).await
        }
        4 => verify_phase_four(profile, logger).await,
        _ => HookOutput::allow(),
    }
}

async fn verify_single(
    profile: &TechnologyProfile,
    command: Option<&str>,
    phase_text: &str,
    timeout_secs: u64,
    logger: &SupervisorLogger,
) -> HookOutput {
    let Some(command) = command else {
        return HookOutput::allow();
    };
    if contains_placeholder(phase_text) {
        return HookOutput::allow();
    }

    let outcome = run_command(command, timeout_secs).await;
    if outcome.success {
        HookOutput::allow()
    } else {
        let message = format_compile_error(&profile.id, command, &outcome.output);
        logger.log_wp(&format!("Build verification failed: {command}"));
        HookOutput::block(message)
    }
}

async fn verify_phase_four(profile: &TechnologyProfile, logger: &SupervisorLogger) -> HookOutput {
    let Some(compile) = profile.compile.as_deref() else {
        return HookOutput::allow();
    };

    let compile_outcome = run_command(compile, DEFAULT_TIMEOUT_SECS).await;
    if !compile_outcome.success {
        logger.log_wp(&format!("Build verification failed: {compile}"));
        return HookOutput::block(format_compile_error(&profile.id, compile, &compile_outcome.output));
    }

    let Some(test) = profile.test.as_deref() else {
        logger.log_wp("Phase 4 COMPLETE");
        return HookOutput::allow();
    };

    let test_outcome = run_command(test, PHASE_FOUR_TEST_TIMEOUT_SECS).await;
    if !test_outcome.success {
        logger.log_wp(&format!("Build verification failed: {test}"));
        return HookOutput::block(format_test_failure(&profile.id, &test_outcome.output));
    }

    logger.log_wp("Phase 4 COMPLETE");
    HookOutput::allow()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with(compile: Option<&str>, test_compile: Option<&str>, test: Option<&str>) -> TechnologyProfile {
        TechnologyProfile {
            id: "generic".to_string(),
            main_source_patterns: vec![],
            test_source_patterns: vec![],
            config_file_patterns: vec![],
            compile: compile.map(str::to_string),
            test_compile: test_compile.map(str::to_string),
            test: test.map(str::to_string),
            todo_placeholder: None,
        }
    }

    #[tokio::test]
    async fn phase_one_always_allows() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SupervisorLogger::new(dir.path(), "wf");
        let profile = profile_with(Some("false"), None, None);
        let result = verify(&profile, 1, "", false, &logger).await;
        assert!(result.is_allow());
    }

    #[tokio::test]
    async fn stop_hook_active_always_allows() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SupervisorLogger::new(dir.path(), "wf");
        let profile = profile_with(Some("false"), None, None);
        let result = verify(&profile, 2, "", true, &logger).await;
        assert!(result.is_allow());
    }

    #[tokio::test]
    async fn phase_two_skips_verification_when_placeholder_present() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SupervisorLogger::new(dir.path(), "wf");
        let profile = profile_with(Some("false"), None, None);
        let result = verify(&profile, 2, "compile {file} now", false, &logger).await;
        assert!(result.is_allow());
    }

    #[tokio::test]
    async fn phase_two_blocks_on_compile_failure() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SupervisorLogger::new(dir.path(), "wf");
        let profile = profile_with(Some("false"), None, None);
        let result = verify(&profile, 2, "", false, &logger).await;
        assert!(result.is_block());
    }

    #[tokio::test]
    async fn phase_three_prefers_test_compile_over_compile() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SupervisorLogger::new(dir.path(), "wf");
        let profile = profile_with(Some("false"), Some("true"), None);
        let result = verify(&profile, 3, "", false, &logger).await;
        assert!(result.is_allow());
    }

    #[tokio::test]
    async fn phase_four_runs_compile_then_test_and_allows_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SupervisorLogger::new(dir.path(), "wf");
        let profile = profile_with(Some("true"), None, Some("true"));
        let result = verify(&profile, 4, "", false, &logger).await;
        assert!(result.is_allow());
    }

    #[tokio::test]
    async fn phase_four_skips_test_when_compile_fails() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SupervisorLogger::new(dir.path(), "wf");
        let profile = profile_with(Some("false"), None, Some("true"));
        let result = verify(&profile, 4, "", false, &logger).await;
        assert!(result.is_block());
    }

    #[tokio::test]
    async fn phase_two_compile_failure_reason_says_compilation_failed() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SupervisorLogger::new(dir.path(), "wf");
        let profile = profile_with(Some("false"), None, None);
        let result = verify(&profile, 2, "", false, &logger).await;
        let reason = result.stop_reason.unwrap();
        assert!(reason.contains("Compilation FAILED"));
        assert!(!reason.contains("Tests FAILED"));
    }

    #[tokio::test]
    async fn phase_four_test_failure_reason_says_tests_failed() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SupervisorLogger::new(dir.path(), "wf");
        let profile = profile_with(Some("true"), None, Some("false"));
        let result = verify(&profile, 4, "", false, &logger).await;
        assert!(result.is_block());
        let reason = result.stop_reason.unwrap();
        assert!(reason.contains("Tests FAILED"));
        assert!(!reason.contains("Compilation FAILED"));
    }

    #[test]
    fn truncate_output_caps_at_byte_limit() {
        let long = "x".repeat(3000);
        assert_eq!(truncate_output(&long).len(), OUTPUT_TRUNCATE_BYTES);
    }
}
