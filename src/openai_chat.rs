//! Concrete OpenAI-backed [`ChatModel`] (SPEC_FULL.md §10).
//!
//! Grounded on the teacher's `clients::common::send_with_native_tools`: a
//! direct `reqwest` POST to `{base_url}/chat/completions` with a
//! `tools: [{"type": "function", ...}]` array and manual parsing of
//! `choices[0].message.tool_calls`, plus `clients::common::get_shared_http_client`
//! for the tuned, pooled `reqwest::Client`. Unlike the teacher's
//! `OpenAIClient` (built on the `openai_rust2` SDK types, whose minimal
//! `chat::Message` has no `tool_calls`/`tool_call_id` fields), this module
//! talks to the REST endpoint directly so native tool-calling and
//! tool-result messages can be expressed on the wire.
//!
//! `stream_completion` doesn't stream token-by-token from the upstream API;
//! it issues one blocking request and replays the result as a single-shot
//! `ChatStream`, mirroring `chunks_to_stream`'s "eagerly collected, then
//! replayed as a stream" shape.

use crate::model::{ChatMessage, ChatModel, ChatStream, Role, StreamEvent, ToolCallRequest, ToolSchema, TokenUsage};
use async_trait::async_trait;
use futures_util::stream;
use lazy_static::lazy_static;
use std::error::Error;
use std::time::Duration;

lazy_static! {
    /// Shared, connection-pooled HTTP client reused across every `OpenAIChatModel`
    /// instance, mirroring the teacher's `SHARED_HTTP_CLIENT`.
    static ref SHARED_HTTP_CLIENT: reqwest::Client = reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .timeout(Duration::from_secs(300))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .expect("failed to build shared HTTP client");
}

/// A `ChatModel` backed by any OpenAI-compatible `/chat/completions` endpoint
/// (OpenAI itself, or a self-hosted/compatible gateway via `base_url`).
pub struct OpenAIChatModel {
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIChatModel {
    /// `base_url` should not have a trailing slash, e.g. `https://api.openai.com/v1`.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, "https://api.openai.com/v1")
    }

    pub fn with_base_url(api_key: impl Into<String>, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        temperature: f32,
        max_tokens: usize,
    ) -> Result<ChatStream, Box<dyn Error + Send + Sync>> {
        let wire_messages: Vec<serde_json::Value> = messages.iter().map(to_wire_message).collect();
        let wire_tools: Vec<serde_json::Value> = tools.iter().map(to_wire_tool).collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": wire_messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
        });
        if !wire_tools.is_empty() {
            body["tools"] = serde_json::Value::Array(wire_tools);
        }

        let url = format!("{}/chat/completions", self.base_url);
        let resp = SHARED_HTTP_CLIENT
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            if log::log_enabled!(log::Level::Error) {
                log::error!("OpenAIChatModel::stream_completion: HTTP {} from {}: {}", status, url, text);
            }
            return Err(format!("openai chat completion failed: HTTP {} — {}", status, text).into());
        }

        let parsed: serde_json::Value = serde_json::from_str(&text)?;
        let events = parse_response(&parsed)?;
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn to_wire_message(msg: &ChatMessage) -> serde_json::Value {
    match &msg.role {
        Role::System => serde_json::json!({"role": "system", "content": msg.content.as_ref()}),
        Role::User => serde_json::json!({"role": "user", "content": msg.content.as_ref()}),
        Role::Assistant => {
            if msg.tool_calls.is_empty() {
                serde_json::json!({"role": "assistant", "content": msg.content.as_ref()})
            } else {
                let tool_calls: Vec<serde_json::Value> = msg
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        serde_json::json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": serde_json::to_string(&tc.arguments).unwrap_or_else(|_| "{}".to_string()),
                            }
                        })
                    })
                    .collect();
                serde_json::json!({"role": "assistant", "content": serde_json::Value::Null, "tool_calls": tool_calls})
            }
        }
        Role::Tool { call_id } => {
            serde_json::json!({"role": "tool", "tool_call_id": call_id, "content": msg.content.as_ref()})
        }
    }
}

fn to_wire_tool(schema: &ToolSchema) -> serde_json::Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": schema.name,
            "description": schema.description,
            "parameters": schema.parameters_schema,
        }
    })
}

fn parse_response(parsed: &serde_json::Value) -> Result<Vec<StreamEvent>, Box<dyn Error + Send + Sync>> {
    let usage = parsed.get("usage").map(|u| TokenUsage {
        input_tokens: u.get("prompt_tokens").and_then(serde_json::Value::as_u64).unwrap_or(0) as usize,
        output_tokens: u.get("completion_tokens").and_then(serde_json::Value::as_u64).unwrap_or(0) as usize,
    });

    let choice_msg = parsed
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or("openai response had no choices[0].message")?;

    let content = choice_msg.get("content").and_then(serde_json::Value::as_str).unwrap_or_default();

    let mut events = Vec::new();
    if !content.is_empty() {
        events.push(StreamEvent::TokenDelta(content.to_string()));
    }

    if let Some(arr) = choice_msg.get("tool_calls").and_then(serde_json::Value::as_array) {
        for tc in arr {
            let Some(id) = tc.get("id").and_then(serde_json::Value::as_str) else { continue };
            let Some(func) = tc.get("function") else { continue };
            let Some(name) = func.get("name").and_then(serde_json::Value::as_str) else { continue };
            let args_str = func.get("arguments").and_then(serde_json::Value::as_str).unwrap_or("{}");
            let arguments = serde_json::from_str(args_str).unwrap_or(serde_json::Value::Object(serde_json::Map::new()));
            events.push(StreamEvent::ToolCall(ToolCallRequest { id: id.to_string(), name: name.to_string(), arguments }));
        }
    }

    events.push(StreamEvent::Finish(usage));
    Ok(events)
}
