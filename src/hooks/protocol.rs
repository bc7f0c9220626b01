//! Wire shapes for the two hook callbacks the assistant CLI invokes:
//! `PreToolUse` (phase guard) and `Stop` (build verifier). Both speak JSON
//! on stdin/stdout exactly like the assistant's own hook protocol — each
//! hook event is a one-shot subprocess, not a long-lived connection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

fn default_cwd() -> PathBuf {
    std::env::current_dir().unwrap_or_default()
}

#[derive(Debug, Deserialize)]
pub struct PreToolUseInput {
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: Value,
    #[serde(default)]
    pub session_id: String,
    #[serde(default = "default_cwd")]
    pub cwd: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct StopInput {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub stop_hook_active: bool,
    #[serde(default = "default_cwd")]
    pub cwd: PathBuf,
}

/// The `PreToolUse` deny shape nests under `hookSpecificOutput` with a fixed
/// `hookEventName`; `Stop`'s block shape has no such nesting, just the flat
/// `continue`/`stopReason` pair on [`HookOutput`] itself.
#[derive(Debug, Serialize)]
pub struct HookSpecificOutput {
    #[serde(rename = "hookEventName")]
    pub hook_event_name: &'static str,
    #[serde(rename = "permissionDecision")]
    pub permission_decision: &'static str,
    #[serde(rename = "permissionDecisionReason")]
    pub permission_decision_reason: String,
}

#[derive(Debug, Default, Serialize)]
pub struct HookOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "continue")]
    pub continue_: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "stopReason")]
    pub stop_reason: Option<String>,
}

impl HookOutput {
    pub fn allow() -> Self {
        Self::default()
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            hook_specific_output: Some(HookSpecificOutput {
                hook_event_name: "PreToolUse",
                permission_decision: "deny",
                permission_decision_reason: reason.into(),
            }),
            continue_: None,
            stop_reason: None,
        }
    }

    /// `Stop` hook equivalent of deny: tells the runner the turn is not
    /// actually finished, carrying the failure reason for display.
    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            hook_specific_output: None,
            continue_: Some(false),
            stop_reason: Some(reason.into()),
        }
    }

    pub fn is_deny(&self) -> bool {
        self.hook_specific_output.is_some()
    }

    pub fn is_block(&self) -> bool {
        self.continue_ == Some(false)
    }

    pub fn is_allow(&self) -> bool {
        !self.is_deny() && !self.is_block()
    }

    pub fn print(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{json}");
        }
    }
}

/// Read a single JSON object from stdin, as the assistant CLI delivers it
/// to a hook subprocess.
pub fn read_stdin<T: serde::de::DeserializeOwned>() -> Result<T, serde_json::Error> {
    let mut buf = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf).unwrap_or_default();
    serde_json::from_str(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_serializes_to_empty_object() {
        let json = serde_json::to_string(&HookOutput::allow()).unwrap();
        assert_eq!(json, "{}");
        assert!(HookOutput::allow().is_allow());
    }

    #[test]
    fn deny_nests_under_hook_specific_output() {
        let output = HookOutput::deny("nope");
        assert!(output.is_deny());
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"hookSpecificOutput\""));
        assert!(json.contains("\"hookEventName\":\"PreToolUse\""));
        assert!(json.contains("\"permissionDecision\":\"deny\""));
        assert!(json.contains("\"permissionDecisionReason\":\"nope\""));
    }

    #[test]
    fn block_sets_continue_false_and_stop_reason() {
        let output = HookOutput::block("finish tests first");
        assert!(output.is_block());
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"continue\":false"));
        assert!(json.contains("\"stopReason\":\"finish tests first\""));
    }
}
