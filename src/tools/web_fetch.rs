use crate::budget::BudgetTracker;
use crate::domain::source::Source;
use crate::domain::SourceTable;
use crate::providers::{FetchFailure, FetchProvider};
use crate::tool_registry::{ParamType, Tool, ToolMetadata, ToolParameter, ToolResult};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::Mutex;

pub fn metadata() -> ToolMetadata {
    ToolMetadata::new("web_fetch", "Fetch a URL and return its extracted title and text.")
        .with_parameter(ToolParameter::new("url", ParamType::String, "The URL to fetch."))
}

/// Dispatches to an external [`FetchProvider`]; on success, registers (or
/// finds) the URL in the shared [`SourceTable`]. `budget`, when present, caps
/// how many *new* sources this tool may contribute (spec.md §4.2
/// `source_cap`); `None` means unbounded.
pub struct WebFetchTool {
    provider: Arc<dyn FetchProvider>,
    sources: Arc<Mutex<SourceTable>>,
    subagent_id: String,
    budget: Option<Arc<BudgetTracker>>,
}

impl WebFetchTool {
    pub fn new(
        provider: Arc<dyn FetchProvider>,
        sources: Arc<Mutex<SourceTable>>,
        subagent_id: impl Into<String>,
        budget: Option<Arc<BudgetTracker>>,
    ) -> Self {
        Self { provider, sources, subagent_id: subagent_id.into(), budget }
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn metadata(&self) -> &ToolMetadata {
        use std::sync::OnceLock;
        static META: OnceLock<ToolMetadata> = OnceLock::new();
        META.get_or_init(metadata)
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        let url = arguments.get("url").and_then(Value::as_str).unwrap_or_default().to_string();
        if url.is_empty() {
            return Ok(ToolResult::failure("invalid_parameters", "url must not be empty"));
        }

        match self.provider.fetch(&url).await {
            Ok(page) => {
                let mut table = self.sources.lock().await;
                let idx = if table.contains(&url) {
                    table.citation_index(&url).unwrap_or(0)
                } else {
                    let admitted = match &self.budget {
                        Some(b) => b.record_source(),
                        None => true,
                    };
                    if admitted {
                        table.insert(Source {
                            url: url.clone(),
                            title: page.title.clone(),
                            snippet: page.text.chars().take(280).collect(),
                            first_seen_by_subagent: self.subagent_id.clone(),
                            first_seen_at: Utc::now(),
                        })
                    } else {
                        0
                    }
                };
                Ok(ToolResult::success(serde_json::json!({
                    "url": url,
                    "title": page.title,
                    "text": page.text,
                    "fetched_at": page.fetched_at,
                    "citation_index": idx,
                })))
            }
            Err(FetchFailure::RateLimited) => Ok(ToolResult::failure("transient_external", "rate_limited")),
            Err(FetchFailure::Unavailable) => Ok(ToolResult::failure("transient_external", "unavailable")),
            Err(FetchFailure::NotFound) => Ok(ToolResult::failure("permanent_external", "not_found")),
            Err(FetchFailure::PermanentError(msg)) => Ok(ToolResult::failure("permanent_external", msg)),
        }
    }
}
