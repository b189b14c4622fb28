//! `Transcript` — the append-only ordered log of one Subagent's run.

use crate::model::{ChatMessage, ToolCallRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in a Subagent's transcript. `content` is always retained for
/// the audit log; `summarized` marks entries whose LLM-visible form has
/// been replaced by a shorter summary (never deleted, per spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub timestamp: DateTime<Utc>,
    pub role: EntryRole,
    pub content: String,
    pub tool_call: Option<RecordedToolCall>,
    pub tool_result: Option<RecordedToolResult>,
    pub summarized: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EntryRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl From<&ToolCallRequest> for RecordedToolCall {
    fn from(c: &ToolCallRequest) -> Self {
        Self { id: c.id.clone(), name: c.name.clone(), arguments: c.arguments.clone() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedToolResult {
    pub call_id: String,
    pub success: bool,
    pub output: serde_json::Value,
    pub error: Option<String>,
}

impl RecordedToolResult {
    /// Renders this result the way it should appear as tool-result content
    /// in the caller's chat transcript, mirroring `ToolResult::as_model_text`.
    pub fn as_model_text(&self) -> String {
        if self.success {
            self.output.to_string()
        } else {
            serde_json::json!({"error": self.error.clone().unwrap_or_default()}).to_string()
        }
    }
}

/// Append-only, totally ordered per-Subagent log. Context-token-capped:
/// `visible_window` returns the entries the LLM should see, which may elide
/// or summarize older `tool_result` entries while `entries` keeps the full
/// audit trail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub subagent_id: String,
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new(subagent_id: impl Into<String>) -> Self {
        Self { subagent_id: subagent_id.into(), entries: Vec::new() }
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn push_message(&mut self, role: EntryRole, content: impl Into<String>) {
        self.push(TranscriptEntry {
            timestamp: Utc::now(),
            role,
            content: content.into(),
            tool_call: None,
            tool_result: None,
            summarized: false,
        });
    }

    pub fn push_tool_call(&mut self, call: &ToolCallRequest) {
        self.push(TranscriptEntry {
            timestamp: Utc::now(),
            role: EntryRole::Assistant,
            content: String::new(),
            tool_call: Some(call.into()),
            tool_result: None,
            summarized: false,
        });
    }

    pub fn push_tool_result(&mut self, result: RecordedToolResult) {
        let content = result.as_model_text();
        self.push(TranscriptEntry {
            timestamp: Utc::now(),
            role: EntryRole::Tool,
            content,
            tool_call: None,
            tool_result: Some(result),
            summarized: false,
        });
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Marks the oldest `n` tool-bearing entries (by index) as summarized
    /// in-place, replacing their LLM-visible content with `summary_text`
    /// while keeping the full record for audit purposes. Used by the
    /// context-compaction path when a Subagent approaches its token budget.
    pub fn summarize_oldest(&mut self, n: usize, summary_text: &str) {
        let mut remaining = n;
        for entry in self.entries.iter_mut() {
            if remaining == 0 {
                break;
            }
            if entry.tool_result.is_some() && !entry.summarized {
                entry.content = summary_text.to_string();
                entry.summarized = true;
                remaining -= 1;
            }
        }
    }

    /// Renders the transcript as a flat list of `ChatMessage`s suitable for
    /// a `ChatModel` call, respecting summarization flags. Tool-call turns
    /// carry the call forward as a native `tool_calls` entry (so the model
    /// sees what it asked for) and tool-result turns carry the actual
    /// `ToolResult` payload (via `RecordedToolResult::as_model_text`) rather
    /// than being dropped — the Subagent/Lead OODA loop's "observe" step
    /// (spec.md §4.3) depends on both being visible in the next turn.
    pub fn to_chat_messages(&self) -> Vec<ChatMessage> {
        self.entries
            .iter()
            .filter(|e| !e.content.is_empty() || e.tool_call.is_some())
            .map(|e| match e.role {
                EntryRole::System => ChatMessage::system(e.content.clone()),
                EntryRole::User => ChatMessage::user(e.content.clone()),
                EntryRole::Assistant => match &e.tool_call {
                    Some(call) => ChatMessage {
                        role: crate::model::Role::Assistant,
                        content: e.content.clone().into(),
                        tool_calls: vec![ToolCallRequest {
                            id: call.id.clone(),
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        }],
                    },
                    None => ChatMessage::assistant(e.content.clone()),
                },
                EntryRole::Tool => ChatMessage::tool_result(
                    e.tool_result.as_ref().map(|r| r.call_id.clone()).unwrap_or_default(),
                    e.content.clone(),
                ),
            })
            .collect()
    }
}
