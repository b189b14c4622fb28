use crate::budget::BudgetTracker;
use crate::domain::source::Source;
use crate::domain::SourceTable;
use crate::providers::{SearchFailure, SearchProvider};
use crate::tool_registry::{ParamType, Tool, ToolMetadata, ToolParameter, ToolResult};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::Mutex;

pub fn metadata() -> ToolMetadata {
    ToolMetadata::new("web_search", "Search the web and return ranked {url, title, snippet} hits.")
        .with_parameter(ToolParameter::new("query", ParamType::String, "The search query."))
        .with_parameter(
            ToolParameter::new("max_results", ParamType::Integer, "Maximum hits to return (<= 10).")
                .optional(),
        )
}

/// Dispatches to an external [`SearchProvider`] and merges discovered
/// sources into the run's shared [`SourceTable`] under its mutex, assigning
/// citation indices at merge time (spec.md §9, "Provenance across agent
/// boundaries"). `budget`, when present, caps how many *new* sources this
/// tool may contribute (spec.md §4.2 `source_cap`); `None` means unbounded,
/// used for the Lead's own incidental searches, which have no per-task cap.
pub struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
    sources: Arc<Mutex<SourceTable>>,
    subagent_id: String,
    budget: Option<Arc<BudgetTracker>>,
}

impl WebSearchTool {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        sources: Arc<Mutex<SourceTable>>,
        subagent_id: impl Into<String>,
        budget: Option<Arc<BudgetTracker>>,
    ) -> Self {
        Self { provider, sources, subagent_id: subagent_id.into(), budget }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn metadata(&self) -> &ToolMetadata {
        // Static metadata avoids rebuilding the schema on every reference.
        use std::sync::OnceLock;
        static META: OnceLock<ToolMetadata> = OnceLock::new();
        META.get_or_init(metadata)
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        let query = arguments.get("query").and_then(Value::as_str).unwrap_or_default();
        let max_results = arguments
            .get("max_results")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(10)
            .min(10);

        match self.provider.search(query, max_results).await {
            Ok(hits) => {
                let mut table = self.sources.lock().await;
                let mut rendered = Vec::with_capacity(hits.len());
                for hit in &hits {
                    let idx = if table.contains(&hit.url) {
                        table.citation_index(&hit.url).unwrap_or(0)
                    } else {
                        let admitted = match &self.budget {
                            Some(b) => b.record_source(),
                            None => true,
                        };
                        if admitted {
                            table.insert(Source {
                                url: hit.url.clone(),
                                title: hit.title.clone(),
                                snippet: hit.snippet.clone(),
                                first_seen_by_subagent: self.subagent_id.clone(),
                                first_seen_at: Utc::now(),
                            })
                        } else {
                            0
                        }
                    };
                    rendered.push(serde_json::json!({
                        "url": hit.url,
                        "title": hit.title,
                        "snippet": hit.snippet,
                        "citation_index": idx,
                    }));
                }
                Ok(ToolResult::success(Value::Array(rendered)))
            }
            Err(SearchFailure::Empty) => Ok(ToolResult::success(Value::Array(vec![]))),
            Err(other) => Ok(ToolResult::failure("transient_external", other.to_string())),
        }
    }
}
