//! In-memory test doubles for [`ChatModel`], [`SearchProvider`], and
//! [`FetchProvider`], gated behind the `testing` feature the way tokio
//! gates its `test-util` feature: consumers add
//! `deepdive = { version = "...", features = ["testing"] }` to their own
//! `[dev-dependencies]` rather than reimplementing these traits by hand.
//!
//! Grounded on the teacher's `MockProtocol`/`TestProtocol` pattern
//! (`cloudllm::tool_protocol` test module): a scripted queue of canned
//! responses consumed one call at a time, so a test can assert exact
//! call-by-call behavior instead of a real model's nondeterminism.

use crate::model::{ChatMessage, ChatModel, ChatStream, StreamEvent, ToolCallRequest, ToolSchema, TokenUsage};
use crate::providers::{FetchFailure, FetchProvider, FetchedPage, SearchFailure, SearchHit, SearchProvider};
use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream;
use std::collections::{HashMap, HashSet, VecDeque};
use std::error::Error;
use tokio::sync::Mutex;

/// One scripted model turn for [`MockChatModel`].
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Respond with plain assistant text.
    Text(String),
    /// Respond by requesting a single tool call.
    ToolCall { name: String, arguments: serde_json::Value },
    /// Fail the call outright, as if the upstream API were unreachable.
    Fail(String),
}

/// A `ChatModel` that replays a fixed script of turns, one per call, in
/// order. Panics (via the returned error) once the script is exhausted —
/// tests should script exactly as many turns as the exercised code path
/// will request.
pub struct MockChatModel {
    name: String,
    turns: Mutex<VecDeque<ScriptedTurn>>,
}

impl MockChatModel {
    pub fn new(name: impl Into<String>, turns: Vec<ScriptedTurn>) -> Self {
        Self { name: name.into(), turns: Mutex::new(turns.into_iter().collect()) }
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn stream_completion(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolSchema],
        _temperature: f32,
        _max_tokens: usize,
    ) -> Result<ChatStream, Box<dyn Error + Send + Sync>> {
        let turn = self
            .turns
            .lock()
            .await
            .pop_front()
            .ok_or("MockChatModel script exhausted: no more scripted turns")?;

        let events = match turn {
            ScriptedTurn::Text(text) => vec![
                StreamEvent::TokenDelta(text),
                StreamEvent::Finish(Some(TokenUsage { input_tokens: 10, output_tokens: 10 })),
            ],
            ScriptedTurn::ToolCall { name, arguments } => vec![
                StreamEvent::ToolCall(ToolCallRequest { id: format!("call-{}", uuid::Uuid::new_v4()), name, arguments }),
                StreamEvent::Finish(Some(TokenUsage { input_tokens: 10, output_tokens: 5 })),
            ],
            ScriptedTurn::Fail(message) => return Err(message.into()),
        };

        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}

/// A `SearchProvider` returning a fixed set of hits for any query, or a
/// scripted failure.
pub struct MockSearchProvider {
    hits: Vec<SearchHit>,
    fail_with: Option<SearchFailure>,
}

impl MockSearchProvider {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self { hits, fail_with: None }
    }

    pub fn failing(failure: SearchFailure) -> Self {
        Self { hits: Vec::new(), fail_with: Some(failure) }
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchFailure> {
        if let Some(failure) = &self.fail_with {
            return Err(failure.clone());
        }
        Ok(self.hits.iter().take(max_results).cloned().collect())
    }
}

/// A `FetchProvider` returning canned pages by URL, with a configurable set
/// of URLs that always fail — useful for partial-failure test scenarios.
pub struct MockFetchProvider {
    pages: HashMap<String, FetchedPage>,
    fail_urls: HashSet<String>,
}

impl MockFetchProvider {
    pub fn new() -> Self {
        Self { pages: HashMap::new(), fail_urls: HashSet::new() }
    }

    pub fn with_page(mut self, url: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        self.pages.insert(url.into(), FetchedPage { title: title.into(), text: text.into(), fetched_at: Utc::now() });
        self
    }

    pub fn failing_on(mut self, url: impl Into<String>) -> Self {
        self.fail_urls.insert(url.into());
        self
    }
}

impl Default for MockFetchProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetchProvider for MockFetchProvider {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchFailure> {
        if self.fail_urls.contains(url) {
            return Err(FetchFailure::Unavailable);
        }
        self.pages.get(url).cloned().ok_or(FetchFailure::NotFound)
    }
}
