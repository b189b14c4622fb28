//! The `ChatModel` interface the core consumes.
//!
//! This mirrors the shape of the teacher's [`ClientWrapper`](cloudllm::client_wrapper::ClientWrapper)
//! trait: a thin, provider-agnostic abstraction over a streaming chat
//! completion endpoint, deliberately excluding conversation bookkeeping
//! (that lives on [`crate::domain::transcript::Transcript`] instead of a
//! session object, since each Subagent's transcript already is the session).
//!
//! `ChatModel` is an out-of-scope collaborator per the specification: the
//! core only depends on this trait. A concrete OpenAI-backed implementation
//! is bundled for completeness, grounded on the teacher's
//! `clients::openai`/`clients::common` request-shaping idiom.

use async_trait::async_trait;
use futures_util::stream::Stream;
use serde_json::Value;
use std::error::Error;
use std::pin::Pin;
use std::sync::Arc;

/// Role of a message in a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    /// A tool-result message correlating with a prior tool call by `call_id`.
    Tool { call_id: String },
}

/// A tool call requested by the model in a native function-calling response.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    /// Provider-assigned call id, echoed back on the follow-up `Role::Tool` message.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One message in a chat request/response.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Arc<str>,
    /// Populated on assistant messages when the model requested tool calls.
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ChatMessage {
    pub fn system(content: impl Into<Arc<str>>) -> Self {
        Self { role: Role::System, content: content.into(), tool_calls: vec![] }
    }

    pub fn user(content: impl Into<Arc<str>>) -> Self {
        Self { role: Role::User, content: content.into(), tool_calls: vec![] }
    }

    pub fn assistant(content: impl Into<Arc<str>>) -> Self {
        Self { role: Role::Assistant, content: content.into(), tool_calls: vec![] }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<Arc<str>>) -> Self {
        Self {
            role: Role::Tool { call_id: call_id.into() },
            content: content.into(),
            tool_calls: vec![],
        }
    }
}

/// A provider-agnostic tool schema advertised alongside a chat request.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
}

/// Token accounting for a single completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

/// One incremental unit of a streaming completion.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// An incremental piece of assistant text.
    TokenDelta(String),
    /// The model has decided to call a tool (terminal for this turn).
    ToolCall(ToolCallRequest),
    /// The completion finished; carries final usage if known.
    Finish(Option<TokenUsage>),
}

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, Box<dyn Error + Send + Sync>>> + Send>>;

/// The external LLM client interface. Implementations must be `Send + Sync`
/// so a single client can be shared across concurrently running Subagents.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Stream a completion for `messages`, advertising `tools` (possibly
    /// empty) as callable functions.
    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        temperature: f32,
        max_tokens: usize,
    ) -> Result<ChatStream, Box<dyn Error + Send + Sync>>;

    /// Identifier used to select the upstream model, surfaced in logs/events.
    fn model_name(&self) -> &str;
}

/// Drains a [`ChatStream`] into a single assistant message plus usage,
/// concatenating token deltas and collecting any tool calls. Subagent and
/// Lead loops that don't need to observe individual deltas (e.g. in tests)
/// can use this instead of consuming the stream by hand.
pub async fn collect_completion(
    mut stream: ChatStream,
) -> Result<(ChatMessage, Option<TokenUsage>), Box<dyn Error + Send + Sync>> {
    use futures_util::StreamExt;

    let mut content = String::new();
    let mut tool_calls = Vec::new();
    let mut usage = None;

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::TokenDelta(delta) => content.push_str(&delta),
            StreamEvent::ToolCall(call) => tool_calls.push(call),
            StreamEvent::Finish(u) => usage = u,
        }
    }

    Ok((
        ChatMessage {
            role: Role::Assistant,
            content: Arc::from(content),
            tool_calls,
        },
        usage,
    ))
}
