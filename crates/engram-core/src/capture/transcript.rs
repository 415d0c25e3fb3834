//! Transcript Parsing
//!
//! Agent sessions land on disk as line-delimited JSON events. The
//! parser extracts messages and tool calls, from which significance is
//! scored: token volume, tool-call count, and distinct file edits.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::AutocaptureConfig;

// ============================================================================
// TYPES
// ============================================================================

/// Tools whose invocation counts as a file edit
const FILE_EDIT_TOOLS: &[&str] = &["Write", "Edit", "NotebookEdit"];

/// A tool invocation observed in the transcript
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub name: String,
    pub input: Value,
}

impl ToolCall {
    pub fn is_file_edit(&self) -> bool {
        FILE_EDIT_TOOLS.contains(&self.name.as_str())
    }

    /// Edited file path, when this call was a file edit
    pub fn edited_file(&self) -> Option<String> {
        if !self.is_file_edit() {
            return None;
        }
        self.input
            .get("file_path")
            .or_else(|| self.input.get("notebook_path"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// One conversational turn
#[derive(Debug, Clone)]
pub struct TranscriptMessage {
    pub role: String,
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl TranscriptMessage {
    /// Rough token estimate (chars / 4)
    pub fn approximate_tokens(&self) -> usize {
        self.content.len() / 4
    }
}

/// A parsed session transcript
#[derive(Debug, Clone)]
pub struct ParsedTranscript {
    pub session_id: String,
    pub project_path: Option<String>,
    pub messages: Vec<TranscriptMessage>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ParsedTranscript {
    /// Parse line-delimited JSON events. Unparseable lines are skipped.
    pub fn parse(session_id: &str, raw: &str) -> Self {
        let mut messages = Vec::new();
        let mut project_path = None;
        let mut start_time: Option<DateTime<Utc>> = None;
        let mut end_time: Option<DateTime<Utc>> = None;

        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok(event) = serde_json::from_str::<Value>(line) else {
                continue;
            };

            if project_path.is_none() {
                project_path = event.get("cwd").and_then(Value::as_str).map(str::to_string);
            }
            if let Some(timestamp) = event
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
            {
                if start_time.is_none() {
                    start_time = Some(timestamp);
                }
                end_time = Some(timestamp);
            }

            let role = event
                .get("type")
                .or_else(|| event.get("role"))
                .and_then(Value::as_str)
                .unwrap_or("");
            if role != "user" && role != "assistant" && role != "system" {
                continue;
            }

            let message = event.get("message").unwrap_or(&event);
            let (content, tool_calls) = parse_content(message.get("content"));
            messages.push(TranscriptMessage {
                role: role.to_string(),
                content,
                tool_calls,
            });
        }

        Self {
            session_id: session_id.to_string(),
            project_path,
            messages,
            start_time,
            end_time,
        }
    }

    pub fn token_count(&self) -> usize {
        self.messages.iter().map(TranscriptMessage::approximate_tokens).sum()
    }

    pub fn tool_call_count(&self) -> usize {
        self.messages.iter().map(|m| m.tool_calls.len()).sum()
    }

    /// Unique edited file paths, sorted
    pub fn files_edited(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .messages
            .iter()
            .flat_map(|m| m.tool_calls.iter())
            .filter_map(ToolCall::edited_file)
            .collect();
        files.sort();
        files.dedup();
        files
    }

    pub fn duration_seconds(&self) -> i64 {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => (end - start).num_seconds().max(0),
            _ => 0,
        }
    }

    /// Flatten to plain text for summarization, truncated to `max_chars`
    pub fn to_text(&self, max_chars: usize) -> String {
        let mut lines = Vec::new();
        for message in &self.messages {
            lines.push(format!("[{}]", message.role.to_uppercase()));
            lines.push(message.content.clone());
            for call in &message.tool_calls {
                lines.push(format!("[TOOL: {}]", call.name));
            }
            lines.push(String::new());
        }
        let mut text = lines.join("\n");
        if text.len() > max_chars {
            let cut = text
                .char_indices()
                .map(|(i, _)| i)
                .take_while(|i| *i <= max_chars)
                .last()
                .unwrap_or(0);
            text.truncate(cut);
            text.push_str("\n\n[... transcript truncated ...]");
        }
        text
    }
}

/// Message content is either a string or a block list mixing text and
/// tool_use entries
fn parse_content(content: Option<&Value>) -> (String, Vec<ToolCall>) {
    match content {
        Some(Value::String(text)) => (text.clone(), vec![]),
        Some(Value::Array(blocks)) => {
            let mut text_parts = Vec::new();
            let mut tool_calls = Vec::new();
            for block in blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = block.get("text").and_then(Value::as_str) {
                            text_parts.push(text.to_string());
                        }
                    }
                    Some("tool_use") => {
                        tool_calls.push(ToolCall {
                            name: block
                                .get("name")
                                .and_then(Value::as_str)
                                .unwrap_or("")
                                .to_string(),
                            input: block.get("input").cloned().unwrap_or(Value::Null),
                        });
                    }
                    _ => {}
                }
            }
            (text_parts.join("\n"), tool_calls)
        }
        _ => (String::new(), vec![]),
    }
}

// ============================================================================
// SIGNIFICANCE
// ============================================================================

/// Measured session volume and the significance verdict
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Significance {
    pub tokens: usize,
    pub tool_calls: usize,
    pub file_edits: usize,
    pub duration_seconds: i64,
    pub significant: bool,
}

/// A session is significant only when every configured threshold is met
pub fn score_significance(transcript: &ParsedTranscript, config: &AutocaptureConfig) -> Significance {
    let tokens = transcript.token_count();
    let tool_calls = transcript.tool_call_count();
    let file_edits = transcript.files_edited().len();

    Significance {
        tokens,
        tool_calls,
        file_edits,
        duration_seconds: transcript.duration_seconds(),
        significant: tokens >= config.min_tokens
            && tool_calls >= config.min_tool_calls
            && file_edits >= config.min_file_edits,
    }
}

// ============================================================================
// TESTS
// ============================================================================
