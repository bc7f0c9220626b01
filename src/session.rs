//! Session Runner: the shared streaming loop over the assistant CLI's
//! `stream-json` subprocess output, reused by every phase session, the
//! regeneration flow, and one-shot extraction queries.

use crate::errors::SessionError;
use crate::stream::{ContentBlock, StreamEvent};
use serde_json::Value;
use std::io::Write as _;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use waypoints_common::PhaseUsage;

pub const PHASE_COMPLETE_PATTERNS: &[&str] =
    &["---PHASE_COMPLETE---", "**PHASE_COMPLETE**", "PHASE_COMPLETE"];
pub const REGENERATION_COMPLETE_PATTERNS: &[&str] = &[
    "---REGENERATION_COMPLETE---",
    "**REGENERATION_COMPLETE**",
    "REGENERATION_COMPLETE",
];
pub const REGENERATION_CANCELED_PATTERNS: &[&str] = &[
    "---REGENERATION_CANCELED---",
    "**REGENERATION_CANCELED**",
    "REGENERATION_CANCELED",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    PhaseComplete,
    RegenerationComplete,
    RegenerationCanceled,
}

pub fn matches_any(patterns: &[&str], text: &str) -> bool {
    patterns.iter().any(|pattern| text.contains(pattern))
}

pub fn phase_complete_checker(text: &str) -> Option<Signal> {
    matches_any(PHASE_COMPLETE_PATTERNS, text).then_some(Signal::PhaseComplete)
}

/// Regeneration-complete takes precedence if both markers somehow appear.
pub fn regeneration_checker(text: &str) -> Option<Signal> {
    if matches_any(REGENERATION_COMPLETE_PATTERNS, text) {
        Some(Signal::RegenerationComplete)
    } else if matches_any(REGENERATION_CANCELED_PATTERNS, text) {
        Some(Signal::RegenerationCanceled)
    } else {
        None
    }
}

pub struct StreamOutcome {
    pub session_id: Option<String>,
    pub signal: Option<Signal>,
    pub text: String,
    pub usage: PhaseUsage,
}

/// Drains one child process's stdout, printing assistant text as it
/// arrives (unless `silent`) and calling `signal_checker` against the
/// accumulated text after every new block. `on_tool_use` is handed every
/// `ToolUse` block's name and raw `input` as it streams by — phase 4 uses
/// this to feed the review coordinator's file tracker without a second
/// pass over the transcript.
pub async fn process_stream(
    mut child: Child,
    signal_checker: impl Fn(&str) -> Option<Signal>,
    silent: bool,
) -> Result<StreamOutcome, SessionError> {
    process_stream_with_hook(child, signal_checker, silent, |_, _| {}).await
}

pub async fn process_stream_with_hook(
    mut child: Child,
    signal_checker: impl Fn(&str) -> Option<Signal>,
    silent: bool,
    mut on_tool_use: impl FnMut(&str, &Value),
) -> Result<StreamOutcome, SessionError> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SessionError::Decode("child has no stdout".to_string()))?;
    let mut reader = BufReader::new(stdout).lines();

    let mut accumulated = String::new();
    let mut session_id = None;
    let mut signal = None;
    let mut usage = PhaseUsage::default();
    let mut printing_dots = false;

    loop {
        let line = reader
            .next_line()
            .await
            .map_err(|err| SessionError::Decode(err.to_string()))?;
        let Some(line) = line else { break };

        let Some(parsed) = crate::stream::parse_line(&line) else {
            continue;
        };
        let Ok(event) = parsed else { continue };

        match event {
            StreamEvent::Assistant { message, session_id: sid } => {
                if !sid.is_empty() {
                    session_id.get_or_insert(sid);
                }
                for block in message.content {
                    match block {
                        ContentBlock::Text { text } => {
                            if printing_dots {
                                print!("\n");
                                printing_dots = false;
                            }
                            if !silent {
                                print!("{text}");
                                let _ = std::io::stdout().flush();
                            }
                            accumulated.push_str(&text);
                            if signal.is_none() {
                                signal = signal_checker(&accumulated);
                            }
                        }
                        ContentBlock::ToolUse { name, input, .. } => {
                            if !silent {
                                print!(".");
                                let _ = std::io::stdout().flush();
                            }
                            printing_dots = true;
                            on_tool_use(&name, &input);
                        }
                    }
                }
            }
            StreamEvent::User { .. } => {}
            StreamEvent::Result {
                session_id: sid,
                total_cost_usd,
                duration_ms,
                num_turns,
                usage: result_usage,
                ..
            } => {
                if !sid.is_empty() {
                    session_id.get_or_insert(sid);
                }
                usage.cost_usd += total_cost_usd.unwrap_or(0.0);
                usage.duration_ms += duration_ms.unwrap_or(0);
                usage.turns += num_turns.unwrap_or(0);
                if let Some(tokens) = result_usage {
                    usage.input_tokens += tokens.input_tokens;
                    usage.output_tokens += tokens.output_tokens;
                }
            }
            StreamEvent::System { session_id: sid, .. } => {
                if !sid.is_empty() {
                    session_id.get_or_insert(sid);
                }
            }
        }
    }

    let _ = child.wait().await;

    Ok(StreamOutcome {
        session_id,
        signal,
        text: accumulated,
        usage,
    })
}

/// Operator input for the interactive phase loop: `@path` / a bare existing
/// path loads file content as the next turn's text; `/done`, `/complete`,
/// `/next` force-complete the phase; `/quit`, `/exit`, `/abort` raise
/// `UserAbort`; anything else is forwarded verbatim.
pub enum UserInput {
    Text(String),
    ForceComplete,
    Abort,
}

pub fn read_user_input(raw: &str) -> UserInput {
    let trimmed = raw.trim();
    match trimmed {
        "/done" | "/complete" | "/next" => return UserInput::ForceComplete,
        "/quit" | "/exit" | "/abort" => return UserInput::Abort,
        _ => {}
    }

    if let Some(path) = trimmed.strip_prefix('@') {
        if let Ok(content) = std::fs::read_to_string(path) {
            return UserInput::Text(content);
        }
    } else if std::path::Path::new(trimmed).is_file() {
        if let Ok(content) = std::fs::read_to_string(trimmed) {
            return UserInput::Text(content);
        }
    }

    UserInput::Text(trimmed.to_string())
}

/// Runs `process_stream` until `PHASE_COMPLETE` is found, falling into an
/// interactive loop on operator input otherwise.
pub async fn run_phase_session(
    spawn_turn: impl FnMut(Option<&str>) -> std::io::Result<Child>,
    read_line: impl FnMut() -> Option<String>,
) -> Result<StreamOutcome, SessionError> {
    run_phase_session_with_hook(spawn_turn, read_line, |_, _| {}).await
}

/// Same as [`run_phase_session`], but every `ToolUse` block across every
/// turn is also handed to `on_tool_use` — phase 4 uses this to drive the
/// review coordinator's file tracker straight off the live stream.
pub async fn run_phase_session_with_hook(
    mut spawn_turn: impl FnMut(Option<&str>) -> std::io::Result<Child>,
    mut read_line: impl FnMut() -> Option<String>,
    mut on_tool_use: impl FnMut(&str, &Value),
) -> Result<StreamOutcome, SessionError> {
    let child = spawn_turn(None).map_err(SessionError::Spawn)?;
    let mut outcome =
        process_stream_with_hook(child, phase_complete_checker, false, &mut on_tool_use).await?;

    while outcome.signal.is_none() {
        let Some(line) = read_line() else {
            break;
        };
        match read_user_input(&line) {
            UserInput::ForceComplete => {
                outcome.signal = Some(Signal::PhaseComplete);
                break;
            }
            UserInput::Abort => return Err(SessionError::UserAbort),
            UserInput::Text(text) => {
                let child = spawn_turn(Some(&text)).map_err(SessionError::Spawn)?;
                let next =
                    process_stream_with_hook(child, phase_complete_checker, false, &mut on_tool_use)
                        .await?;
                outcome.text.push_str(&next.text);
                outcome.usage.input_tokens += next.usage.input_tokens;
                outcome.usage.output_tokens += next.usage.output_tokens;
                outcome.usage.cost_usd += next.usage.cost_usd;
                outcome.usage.duration_ms += next.usage.duration_ms;
                outcome.usage.turns += next.usage.turns;
                outcome.session_id = outcome.session_id.or(next.session_id);
                outcome.signal = next.signal;
            }
        }
    }

    Ok(outcome)
}

/// Same interactive shape as [`run_phase_session`], but looking for the
/// regeneration markers, with `/done` also forcing completion.
pub async fn run_regeneration_session(
    mut spawn_turn: impl FnMut(Option<&str>) -> std::io::Result<Child>,
    mut read_line: impl FnMut() -> Option<String>,
) -> Result<StreamOutcome, SessionError> {
    let child = spawn_turn(None).map_err(SessionError::Spawn)?;
    let mut outcome = process_stream(child, regeneration_checker, false).await?;

    while outcome.signal.is_none() {
        let Some(line) = read_line() else {
            break;
        };
        let trimmed = line.trim();
        if trimmed == "/done" {
            outcome.signal = Some(Signal::RegenerationComplete);
            break;
        }
        match read_user_input(&line) {
            UserInput::ForceComplete => {
                outcome.signal = Some(Signal::RegenerationComplete);
                break;
            }
            UserInput::Abort => return Err(SessionError::UserAbort),
            UserInput::Text(text) => {
                let child = spawn_turn(Some(&text)).map_err(SessionError::Spawn)?;
                let next = process_stream(child, regeneration_checker, false).await?;
                outcome.text.push_str(&next.text);
                outcome.signal = next.signal;
            }
        }
    }

    Ok(outcome)
}

/// Sends one prompt silently and returns whatever text was collected,
/// including a partial result if `timeout` elapses — never an error.
pub async fn extract_text(
    mut spawn: impl FnMut() -> std::io::Result<Child>,
    timeout: Duration,
) -> String {
    let Ok(child) = spawn() else {
        return String::new();
    };

    match tokio::time::timeout(timeout, process_stream(child, |_| None, true)).await {
        Ok(Ok(outcome)) => outcome.text,
        _ => String::new(),
    }
}

/// A response beginning with `SUMMARY_VERIFIED` or `GAPS_FOUND` has that
/// marker line stripped before the remainder is treated as the summary
/// text — matched as a prefix, never a substring.
pub fn strip_verification_marker(response: &str) -> (Option<&'static str>, String) {
    if let Some(rest) = response.strip_prefix("SUMMARY_VERIFIED") {
        let remainder = rest.split_once('\n').map(|(_, r)| r).unwrap_or("");
        (Some("SUMMARY_VERIFIED"), remainder.trim_start().to_string())
    } else if let Some(rest) = response.strip_prefix("GAPS_FOUND") {
        let remainder = rest.split_once('\n').map(|(_, r)| r).unwrap_or("");
        (Some("GAPS_FOUND"), remainder.trim_start().to_string())
    } else {
        (None, response.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_complete_checker_matches_substring() {
        assert_eq!(
            phase_complete_checker("some text\n---PHASE_COMPLETE---\n"),
            Some(Signal::PhaseComplete)
        );
        assert_eq!(phase_complete_checker("still working"), None);
    }

    #[test]
    fn regeneration_checker_prefers_complete_over_canceled() {
        let text = "REGENERATION_CANCELED and also REGENERATION_COMPLETE";
        assert_eq!(regeneration_checker(text), Some(Signal::RegenerationComplete));
    }

    #[test]
    fn read_user_input_recognizes_control_commands() {
        assert!(matches!(read_user_input("/done"), UserInput::ForceComplete));
        assert!(matches!(read_user_input("/abort"), UserInput::Abort));
        assert!(matches!(read_user_input("plain text"), UserInput::Text(_)));
    }

    #[test]
    fn read_user_input_loads_at_prefixed_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("note.txt");
        std::fs::write(&file, "file contents").unwrap();
        let arg = format!("@{}", file.display());
        match read_user_input(&arg) {
            UserInput::Text(text) => assert_eq!(text, "file contents"),
            _ => panic!("expected text"),
        }
    }

    #[test]
    fn strip_verification_marker_splits_prefix_only() {
        let (marker, rest) = strip_verification_marker("SUMMARY_VERIFIED\nlooks complete");
        assert_eq!(marker, Some("SUMMARY_VERIFIED"));
        assert_eq!(rest, "looks complete");

        let (marker, _) = strip_verification_marker("the summary mentions GAPS_FOUND later");
        assert_eq!(marker, None);
    }
}
