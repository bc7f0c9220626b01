//! Integration tests that drive the compiled `waypoints-supervisor` binary
//! end to end. Tests that would need a real `claude` CLI on PATH instead
//! exercise the hidden `--wp-hook <event>` dispatch mode directly (the same
//! code path an assistant subprocess calls back into) against a workflow
//! state directory pinned via `WP_SUPERVISOR_MARKERS_DIR`.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn supervisor() -> Command {
    Command::cargo_bin("waypoints-supervisor").unwrap()
}

/// A state/install directory pair pinned via env vars, isolating a test from
/// the operator's real `~/.claude` tree and from other tests running in
/// parallel.
struct Sandbox {
    markers: TempDir,
    install: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            markers: TempDir::new().unwrap(),
            install: TempDir::new().unwrap(),
        }
    }

    fn apply(&self, cmd: &mut Command) {
        cmd.env("WP_SUPERVISOR_MARKERS_DIR", self.markers.path());
        cmd.env("WP_SUPERVISOR_WORKFLOW_ID", "cli-test");
        cmd.env("WP_SUPERVISOR_ACTIVE", "1");
        cmd.env("WP_INSTALL_DIR", self.install.path());
    }
}

// =============================================================================
// Basic CLI surface
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn help_lists_dir_and_task_flags() {
        supervisor()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--dir"))
            .stdout(predicate::str::contains("--task"));
    }

    #[test]
    fn help_does_not_advertise_the_hook_dispatch_flag() {
        supervisor()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("--wp-hook").not());
    }

    #[test]
    fn unknown_flag_is_rejected_with_usage_error() {
        supervisor()
            .arg("--not-a-real-flag")
            .assert()
            .failure()
            .stderr(predicate::str::contains("--dir").or(predicate::str::contains("unexpected")));
    }

    #[test]
    fn missing_assistant_binary_exits_with_general_failure() {
        let dir = TempDir::new().unwrap();
        let sandbox = Sandbox::new();

        let mut cmd = supervisor();
        sandbox.apply(&mut cmd);
        cmd.env("CLAUDE_CMD", "waypoints-definitely-not-a-real-binary");
        cmd.arg("--dir").arg(dir.path());
        cmd.arg("--task").arg("a task");
        cmd.assert().failure().code(1);
    }
}

// =============================================================================
// Hidden hook dispatch mode (`--wp-hook <event>`)
// =============================================================================
//
// These drive the exact subprocess entry point the assistant CLI's
// PreToolUse/Stop hooks invoke, with the request JSON fed over stdin the way
// the settings file (see `src/hooks/settings.rs`) wires it up.

mod hook_dispatch {
    use super::*;

    fn run_hook(sandbox: &Sandbox, event: &str, stdin: &str) -> assert_cmd::assert::Assert {
        let mut cmd = supervisor();
        sandbox.apply(&mut cmd);
        cmd.arg("--wp-hook").arg(event);
        cmd.write_stdin(stdin);
        cmd.assert()
    }

    #[test]
    fn log_tool_use_always_allows() {
        let sandbox = Sandbox::new();
        let input = r#"{"tool_name":"Bash","tool_input":{"command":"ls"},"session_id":"s1"}"#;
        run_hook(&sandbox, "log-tool-use", input)
            .success()
            .stdout(predicate::str::diff("{}\n"));
    }

    #[test]
    fn phase_guard_denies_source_write_during_phase_one() {
        let sandbox = Sandbox::new();

        // Prime the workflow's state.json to phase 1 by running the
        // dispatcher once; StateStore::open defaults a fresh workflow to
        // phase 1, so no extra setup is required here.
        let input = format!(
            r#"{{"tool_name":"Write","tool_input":{{"file_path":"src/lib.rs"}},"session_id":"s1","cwd":"{}"}}"#,
            sandbox.markers.path().display()
        );
        run_hook(&sandbox, "phase-guard", &input)
            .success()
            .stdout(predicate::str::contains("\"permissionDecision\":\"deny\""))
            .stdout(predicate::str::contains("Phase 1"));
    }

    #[test]
    fn phase_guard_allows_non_source_write_during_phase_one() {
        let sandbox = Sandbox::new();
        let input = format!(
            r#"{{"tool_name":"Write","tool_input":{{"file_path":"NOTES.txt"}},"session_id":"s1","cwd":"{}"}}"#,
            sandbox.markers.path().display()
        );
        run_hook(&sandbox, "phase-guard", &input)
            .success()
            .stdout(predicate::str::diff("{}\n"));
    }

    #[test]
    fn phase_guard_falls_back_to_allow_on_malformed_request() {
        let sandbox = Sandbox::new();
        run_hook(&sandbox, "phase-guard", "not json")
            .success()
            .stdout(predicate::str::diff("{}\n"));
    }

    #[test]
    fn unrecognized_hook_event_allows() {
        let sandbox = Sandbox::new();
        run_hook(&sandbox, "some-future-event", "{}")
            .success()
            .stdout(predicate::str::diff("{}\n"));
    }
}
