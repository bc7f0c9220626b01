//! Decoder for the assistant's `stream-json` subprocess output.
//!
//! Every line of stdout is one JSON object. `StreamEvent` is a sealed set of
//! variants (`#[serde(tag = "type")]`) rather than a duck-typed value — an
//! unrecognized `type` fails to deserialize instead of silently matching
//! whatever shape happened to show up, so new/unexpected event kinds are
//! visibly skipped rather than mis-handled.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    #[serde(rename = "assistant")]
    Assistant {
        message: AssistantMessage,
        #[serde(default)]
        session_id: String,
    },

    #[serde(rename = "user")]
    User {
        #[serde(default)]
        tool_use_result: Option<ToolUseResult>,
    },

    #[serde(rename = "result")]
    Result {
        subtype: String,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        session_id: String,
        #[serde(default)]
        total_cost_usd: Option<f64>,
        #[serde(default)]
        duration_ms: Option<u64>,
        #[serde(default)]
        num_turns: Option<u32>,
        #[serde(default)]
        usage: Option<TokenUsage>,
    },

    #[serde(rename = "system")]
    System {
        subtype: String,
        #[serde(default)]
        session_id: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "tool_use")]
    ToolUse {
        name: String,
        #[serde(default)]
        input: Value,
        #[serde(default)]
        id: String,
    },

    #[serde(rename = "text")]
    Text { text: String },
}

#[derive(Debug, Deserialize)]
pub struct ToolUseResult {
    #[serde(default)]
    pub file: Option<FileInfo>,
}

#[derive(Debug, Deserialize)]
pub struct FileInfo {
    #[serde(rename = "filePath")]
    pub file_path: String,
}

/// Parse one subprocess stdout line. Returns `None` for blank lines or
/// lines whose `type` tag is not one of the sealed variants — those are
/// logged by the caller and otherwise ignored, never treated as fatal.
pub fn parse_line(line: &str) -> Option<Result<StreamEvent, serde_json::Error>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assistant_text_event() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hi"}]},"session_id":"abc"}"#;
        let event = parse_line(line).unwrap().unwrap();
        match event {
            StreamEvent::Assistant { message, session_id } => {
                assert_eq!(session_id, "abc");
                match &message.content[0] {
                    ContentBlock::Text { text } => assert_eq!(text, "hi"),
                    _ => panic!("expected text block"),
                }
            }
            _ => panic!("expected assistant event"),
        }
    }

    #[test]
    fn parses_result_event_with_usage() {
        let line = r#"{"type":"result","subtype":"success","result":"done","total_cost_usd":0.5,"duration_ms":100,"num_turns":3,"usage":{"input_tokens":10,"output_tokens":20}}"#;
        let event = parse_line(line).unwrap().unwrap();
        match event {
            StreamEvent::Result {
                result,
                total_cost_usd,
                usage,
                ..
            } => {
                assert_eq!(result.as_deref(), Some("done"));
                assert_eq!(total_cost_usd, Some(0.5));
                assert_eq!(usage.unwrap().input_tokens, 10);
            }
            _ => panic!("expected result event"),
        }
    }

    #[test]
    fn blank_line_yields_none() {
        assert!(parse_line("   ").is_none());
    }

    #[test]
    fn unknown_type_tag_fails_to_parse_rather_than_being_misread() {
        let line = r#"{"type":"future_event","foo":"bar"}"#;
        assert!(parse_line(line).unwrap().is_err());
    }
}
