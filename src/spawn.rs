//! Builds and spawns the assistant CLI (`claude`) as a subprocess whose
//! `stream-json` stdout the [`crate::session`] runner decodes. One spawn per
//! turn: continuity across turns within a phase is carried by re-sending
//! the accumulated transcript as the prompt rather than by `--resume` (see
//! DESIGN.md) — the orchestrator still records the first `session_id` seen
//! for audit/display purposes.

use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Everything about *how* to invoke the assistant that stays fixed across
/// every turn of a run: which binary, which working directory, which model,
/// and which hook settings file (if hooks are enabled for this process).
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub claude_cmd: String,
    pub working_dir: PathBuf,
    pub model: Option<String>,
    pub settings_file: Option<PathBuf>,
    pub disable_hooks: bool,
    pub extra_env: Vec<(String, String)>,
}

impl AssistantConfig {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            claude_cmd: std::env::var("CLAUDE_CMD").unwrap_or_else(|_| "claude".to_string()),
            working_dir,
            model: None,
            settings_file: None,
            disable_hooks: std::env::var("WP_DISABLE_HOOKS").as_deref() == Ok("1"),
            extra_env: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_settings_file(mut self, path: Option<PathBuf>) -> Self {
        self.settings_file = path;
        self
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.extra_env = env;
        self
    }
}

/// Spawn one non-interactive turn: `claude --print <prompt> --output-format
/// stream-json --verbose --dangerously-skip-permissions [--model ...]
/// [--settings ...]`. `--dangerously-skip-permissions` is safe here because
/// the phase guard and build verifier hooks (when enabled) are the actual
/// permission boundary, not the CLI's own interactive prompt.
pub fn spawn_turn(config: &AssistantConfig, prompt: &str) -> std::io::Result<Child> {
    let mut cmd = Command::new(&config.claude_cmd);
    cmd.current_dir(&config.working_dir);
    cmd.arg("--print").arg(prompt);
    cmd.arg("--output-format").arg("stream-json");
    cmd.arg("--verbose");
    cmd.arg("--dangerously-skip-permissions");

    if let Some(model) = &config.model {
        cmd.arg("--model").arg(model);
    }
    if !config.disable_hooks {
        if let Some(settings) = &config.settings_file {
            cmd.arg("--settings").arg(settings);
        }
    }
    for (key, value) in &config.extra_env {
        cmd.env(key, value);
    }

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::null());
    cmd.spawn()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_hooks_env_var_is_honored() {
        unsafe {
            std::env::set_var("WP_DISABLE_HOOKS", "1");
        }
        let config = AssistantConfig::new(PathBuf::from("."));
        assert!(config.disable_hooks);
        unsafe {
            std::env::remove_var("WP_DISABLE_HOOKS");
        }
    }

    #[test]
    fn builder_methods_set_fields() {
        let config = AssistantConfig::new(PathBuf::from("."))
            .with_model(Some("haiku".to_string()))
            .with_settings_file(Some(PathBuf::from("/tmp/settings.json")));
        assert_eq!(config.model.as_deref(), Some("haiku"));
        assert!(config.settings_file.is_some());
    }
}
