//! `SupervisorLogger` — the workflow's own audit trail. Writes the same
//! event to three append-only sinks and maintains a `current.log` symlink.
//! This is a literal external contract (other tooling tails these files),
//! implemented by hand rather than through `tracing` — see `SPEC_FULL.md`
//! §3.1 for why the two logging facilities are kept separate.

use chrono::Local;
use std::io::Write;
use std::path::{Path, PathBuf};

const WORKFLOW_LOG: &str = "workflow.log";

pub struct SupervisorLogger {
    workflow_dir: PathBuf,
    workflow_id: String,
    install_dir: PathBuf,
}

impl SupervisorLogger {
    pub fn new(workflow_dir: impl Into<PathBuf>, workflow_id: impl Into<String>) -> Self {
        let install_dir = std::env::var("WP_INSTALL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|home| home.join(".claude").join("waypoints"))
                    .unwrap_or_else(|| PathBuf::from(".claude/waypoints"))
            });

        let workflow_dir = workflow_dir.into();
        let _ = std::fs::create_dir_all(&workflow_dir);
        let _ = std::fs::create_dir_all(install_dir.join("logs").join("sessions"));

        Self {
            workflow_dir,
            workflow_id: workflow_id.into(),
            install_dir,
        }
    }

    fn sanitize(message: &str) -> String {
        message.replace('\n', "\\n")
    }

    /// Append `line` to `path`, swallowing any I/O error — the logger must
    /// never be the reason a workflow aborts.
    fn append(path: &Path, line: &str) {
        if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
            let _ = file.write_all(line.as_bytes());
        }
    }

    pub fn log_event(&self, category: &str, message: &str) {
        let now = Local::now();
        let timestamp = now.format("%Y-%m-%d %H:%M:%S");
        let date = now.format("%Y-%m-%d");
        let safe_message = Self::sanitize(message);
        let line = format!("[{timestamp}] [{category}] {safe_message}\n");

        Self::append(&self.workflow_dir.join(WORKFLOW_LOG), &line);

        let logs_dir = self.install_dir.join("logs");
        let session_log = logs_dir
            .join("sessions")
            .join(format!("{date}-supervisor-{}.log", self.workflow_id));
        Self::append(&session_log, &line);

        let daily_log = logs_dir.join(format!("{date}.log"));
        let prefixed = format!("[supervisor-{}] {line}", self.workflow_id);
        Self::append(&daily_log, &prefixed);

        let current_log = logs_dir.join("current.log");
        let _ = std::fs::remove_file(&current_log);
        #[cfg(unix)]
        {
            let _ = std::os::unix::fs::symlink(&session_log, &current_log);
        }
    }

    pub fn log_workflow_start(&self, task: &str) {
        let msg = if task.is_empty() {
            "Workflow started".to_string()
        } else {
            format!("Workflow started: {}", truncate(task, 100))
        };
        self.log_event("WORKFLOW", &msg);
    }

    pub fn log_workflow_complete(&self, usage_summary: &str) {
        let msg = if usage_summary.is_empty() {
            "Workflow completed successfully".to_string()
        } else {
            format!("Workflow completed successfully | {usage_summary}")
        };
        self.log_event("WORKFLOW", &msg);
    }

    pub fn log_workflow_aborted(&self, reason: &str) {
        let msg = if reason.is_empty() {
            "Workflow aborted".to_string()
        } else {
            format!("Workflow aborted: {reason}")
        };
        self.log_event("WORKFLOW", &msg);
    }

    pub fn log_phase_start(&self, phase: u8, name: &str) {
        self.log_event("PHASE", &format!("Phase {phase} ({name}) started"));
    }

    pub fn log_phase_complete(&self, phase: u8, name: &str) {
        self.log_event("PHASE", &format!("Phase {phase} ({name}) completed"));
    }

    pub fn log_phase_summary_saved(&self, phase: u8, path: &Path) {
        self.log_event(
            "PHASE",
            &format!("Phase {phase} summary saved to {}", path.display()),
        );
    }

    pub fn log_phase_context_saved(&self, phase: u8, path: &Path) {
        self.log_event(
            "PHASE",
            &format!("Phase {phase} context saved to {}", path.display()),
        );
    }

    pub fn log_user_input(&self, input: &str) {
        if input.is_empty() {
            self.log_event("USER", "Input received");
        } else {
            self.log_event("USER", &format!("Input received: {}", truncate(input, 50)));
        }
    }

    pub fn log_user_confirmation(&self, phase: u8) {
        self.log_event("USER", &format!("Confirmed phase {phase} completion"));
    }

    pub fn log_user_command(&self, command: &str) {
        self.log_event("USER", &format!("Command: {command}"));
    }

    pub fn log_error(&self, message: &str, error: Option<&dyn std::fmt::Display>) {
        match error {
            Some(err) => self.log_event("ERROR", &format!("{message}: {err}")),
            None => self.log_event("ERROR", message),
        }
    }

    pub fn log_query_start(&self, prompt_preview: &str) {
        if prompt_preview.is_empty() {
            self.log_event("CLAUDE", "Query started");
        } else {
            self.log_event(
                "CLAUDE",
                &format!("Query started: {}", truncate(prompt_preview, 50)),
            );
        }
    }

    pub fn log_query_complete(&self, tokens: u64, cost: f64) {
        if tokens > 0 || cost > 0.0 {
            self.log_event(
                "CLAUDE",
                &format!("Query complete | tokens: {tokens} | cost: ${cost:.4}"),
            );
        } else {
            self.log_event("CLAUDE", "Query complete");
        }
    }

    pub fn log_usage_summary(&self, total_tokens: u64, total_cost: f64, duration_sec: f64) {
        self.log_event(
            "USAGE",
            &format!("Total: {total_tokens} tokens | ${total_cost:.4} | {duration_sec:.1}s"),
        );
    }

    pub fn log_wp(&self, message: &str) {
        self.log_event("WP", message);
    }

    pub fn log_path(&self) -> PathBuf {
        self.workflow_dir.join(WORKFLOW_LOG)
    }
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
    use tempfile::tempdir;

    #[test]
    fn log_event_writes_to_workflow_log() {
        let dir = tempdir().unwrap();
        let install = tempdir().unwrap();
        unsafe {
            std::env::set_var("WP_INSTALL_DIR", install.path());
        }
        let logger = SupervisorLogger::new(dir.path(), "wf-1");
        logger.log_event("TEST", "hello");
        let content = std::fs::read_to_string(logger.log_path()).unwrap();
        assert!(content.contains("[TEST] hello"));
        unsafe {
            std::env::remove_var("WP_INSTALL_DIR");
        }
    }

    #[test]
    fn newlines_in_messages_are_escaped() {
        let dir = tempdir().unwrap();
        let install = tempdir().unwrap();
        unsafe {
            std::env::set_var("WP_INSTALL_DIR", install.path());
        }
        let logger = SupervisorLogger::new(dir.path(), "wf-2");
        logger.log_event("TEST", "line one\nline two");
        let content = std::fs::read_to_string(logger.log_path()).unwrap();
        assert!(content.contains("line one\\nline two"));
        assert_eq!(content.lines().count(), 1);
        unsafe {
            std::env::remove_var("WP_INSTALL_DIR");
        }
    }

    #[test]
    fn truncate_adds_ellipsis_only_when_over_limit() {
        assert_eq!(truncate("short", 50), "short");
        let long = "a".repeat(60);
        assert!(truncate(&long, 50).ends_with("..."));
    }
}
