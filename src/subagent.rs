//! Subagent Runner — the OODA loop (spec.md §4.3).
//!
//! Grounded on `cloudllm::agent::Agent::send`'s tool-call loop shape
//! (iteration cap, per-iteration events) and `cloudllm::planner::BasicPlanner`
//! (the `PlannerContext`/`PolicyEngine`/`StreamSink` split, which maps
//! directly onto "check budget before dispatch" and "publish to the event
//! bus" respectively). `Agent::fork()`'s "fresh session, shared registry"
//! shape is the precedent for constructing one Runner per `TaskSpec`.

use crate::budget::{Budget, BudgetDecision, BudgetTracker};
use crate::config::OrchestratorConfig;
use crate::domain::source::SourceTable;
use crate::domain::transcript::{EntryRole, RecordedToolResult, Transcript};
use crate::domain::{SubagentResult, SubagentStatus, TaskSpec};
use crate::event::{EventBus, EventKind};
use crate::model::{ChatMessage, ChatModel, StreamEvent, ToolCallRequest};
use crate::providers::{FetchProvider, SearchProvider};
use crate::tool_registry::{Tool, ToolRegistry};
use crate::tools::{complete_task_metadata, web_fetch, web_search};
use futures_util::StreamExt;
use log::{info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::sync::watch;

const MAX_OODA_ITERATIONS: usize = 12;

/// Everything a Subagent needs that is shared with the rest of the run
/// (clone of each Arc is cheap; the tracker and transcript are per-run).
pub struct SubagentDeps {
    pub chat_model: Arc<dyn ChatModel>,
    pub search_provider: Arc<dyn SearchProvider>,
    pub fetch_provider: Arc<dyn FetchProvider>,
    pub sources: Arc<Mutex<SourceTable>>,
    pub events: EventBus,
    pub cancel: watch::Receiver<bool>,
}

pub struct SubagentRunner {
    id: String,
    task: TaskSpec,
    deps: SubagentDeps,
    tools: ToolRegistry,
    budget: Arc<BudgetTracker>,
    transcript: Transcript,
    issued_queries: HashSet<String>,
    web_search_calls: u32,
}

impl SubagentRunner {
    pub fn new(id: impl Into<String>, task: TaskSpec, deps: SubagentDeps, cfg: &OrchestratorConfig) -> Self {
        let id = id.into();
        let budget = Arc::new(BudgetTracker::new(Budget::from_hint(task.budget_hint, cfg)));

        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(web_search::WebSearchTool::new(
            deps.search_provider.clone(),
            deps.sources.clone(),
            id.clone(),
            Some(budget.clone()),
        )));
        tools.register(Arc::new(web_fetch::WebFetchTool::new(
            deps.fetch_provider.clone(),
            deps.sources.clone(),
            id.clone(),
            Some(budget.clone()),
        )));

        let mut transcript = Transcript::new(id.clone());
        transcript.push_message(EntryRole::System, system_prompt());
        transcript.push_message(EntryRole::User, task.prompt.clone());

        Self {
            id,
            task,
            deps,
            tools,
            budget,
            transcript,
            issued_queries: HashSet::new(),
            web_search_calls: 0,
        }
    }

    /// Runs the OODA loop to completion, always returning a terminal
    /// `SubagentResult` (never propagating an error upward — spec.md §7:
    /// "Subagent failures never fail the Session").
    pub async fn run(mut self) -> SubagentResult {
        let started_at = Instant::now();
        self.deps.events.publish(
            Some(self.id.clone()),
            EventKind::SubagentSpawned { task_id: self.task.id.clone() },
        );

        let mut findings_text = String::new();
        let mut status = SubagentStatus::Error;
        let mut retried_finalize = false;

        for _ in 0..MAX_OODA_ITERATIONS {
            if *self.deps.cancel.borrow() {
                status = SubagentStatus::Cancelled;
                break;
            }

            match self.budget.check() {
                BudgetDecision::Allow => {}
                BudgetDecision::DeadlineExceeded => {
                    if self.force_finalize(&mut retried_finalize, &mut findings_text).await {
                        status = SubagentStatus::Timeout;
                        break;
                    }
                }
                BudgetDecision::ToolCallBudgetExhausted | BudgetDecision::TokenBudgetExhausted => {
                    if self.force_finalize(&mut retried_finalize, &mut findings_text).await {
                        status = SubagentStatus::BudgetExhausted;
                        break;
                    }
                }
            }

            if self.budget.should_summarize() {
                self.summarize_oldest_tool_results();
            }

            let tool_schemas = self.schemas();
            let messages = self.transcript.to_chat_messages();
            let completion = match self.call_model(&messages, &tool_schemas).await {
                Ok(c) => c,
                Err(e) => {
                    warn!("subagent {} model call failed: {e}", self.id);
                    self.deps.events.publish(
                        Some(self.id.clone()),
                        EventKind::Error { error_kind: "transient_external".to_string(), message: e.to_string() },
                    );
                    status = SubagentStatus::Error;
                    break;
                }
            };

            if completion.tool_calls.is_empty() {
                // No tool call and no explicit completion: record the
                // reasoning turn and continue the loop (the model is
                // "thinking out loud" before acting).
                self.transcript.push_message(EntryRole::Assistant, completion.content.to_string());
                continue;
            }

            let mut completed = None;
            for call in &completion.tool_calls {
                self.transcript.push_tool_call(call);

                if call.name == "complete_task" {
                    let report = call.arguments.get("report").and_then(serde_json::Value::as_str).unwrap_or_default();
                    let no_search_needed = call
                        .arguments
                        .get("no_search_needed")
                        .and_then(serde_json::Value::as_bool)
                        .unwrap_or(false);

                    if self.web_search_calls == 0 && !no_search_needed {
                        // Minimum-effort floor: reject and force a search.
                        self.transcript.push_tool_result(RecordedToolResult {
                            call_id: call.id.clone(),
                            success: false,
                            output: serde_json::Value::Null,
                            error: Some(
                                "at least one web_search call is required before completing; \
                                 set no_search_needed=true only if this is trivially answerable"
                                    .to_string(),
                            ),
                        });
                        continue;
                    }

                    findings_text = report.to_string();
                    completed = Some(SubagentStatus::Ok);
                    break;
                }

                self.dispatch_tool_call(call).await;
            }

            if let Some(final_status) = completed {
                status = final_status;
                break;
            }
        }

        let sources = self.drain_contributed_sources().await;
        info!("subagent {} finished as {:?} in {:?}", self.id, status, started_at.elapsed());
        self.deps.events.publish(
            Some(self.id.clone()),
            EventKind::SubagentFinished { status: format!("{:?}", status) },
        );

        SubagentResult {
            id: self.id,
            task_id: self.task.id,
            status,
            findings_text,
            sources,
            tool_calls_made: self.budget.tool_calls_made(),
            tokens_used: self.budget.tokens_used(),
            duration_ms: started_at.elapsed().as_millis() as u64,
            error_detail: None,
        }
    }

    fn schemas(&self) -> Vec<crate::model::ToolSchema> {
        let mut schemas = self.tools.schemas();
        schemas.push(complete_task_metadata().to_schema());
        schemas
    }

    async fn call_model(
        &mut self,
        messages: &[ChatMessage],
        tools: &[crate::model::ToolSchema],
    ) -> Result<ChatMessage, Box<dyn Error + Send + Sync>> {
        let mut stream = self.deps.chat_model.stream_completion(messages, tools, 0.2, 4096).await?;
        let mut content = String::new();
        let mut tool_calls = Vec::new();
        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::TokenDelta(delta) => {
                    self.deps
                        .events
                        .publish(Some(self.id.clone()), EventKind::TokenDelta { delta: delta.clone() });
                    content.push_str(&delta);
                }
                StreamEvent::ToolCall(call) => tool_calls.push(call),
                StreamEvent::Finish(usage) => {
                    if let Some(u) = usage {
                        self.budget.record_tokens(u.total());
                    }
                }
            }
        }
        Ok(ChatMessage { role: crate::model::Role::Assistant, content: content.into(), tool_calls })
    }

    async fn dispatch_tool_call(&mut self, call: &ToolCallRequest) {
        if *self.deps.cancel.borrow() {
            return;
        }

        if call.name == "web_search" {
            let query = call.arguments.get("query").and_then(serde_json::Value::as_str).unwrap_or_default();
            let normalized = query.trim().to_lowercase();
            if self.issued_queries.contains(&normalized) {
                self.transcript.push_tool_result(RecordedToolResult {
                    call_id: call.id.clone(),
                    success: false,
                    output: serde_json::Value::Null,
                    error: Some("duplicate query — rephrase".to_string()),
                });
                return;
            }
            self.issued_queries.insert(normalized);
        }

        match self.budget.check() {
            BudgetDecision::Allow => {}
            _ => {
                self.transcript.push_tool_result(RecordedToolResult {
                    call_id: call.id.clone(),
                    success: false,
                    output: serde_json::Value::Null,
                    error: Some("budget exhausted — call rejected without dispatch".to_string()),
                });
                return;
            }
        }

        self.deps
            .events
            .publish(Some(self.id.clone()), EventKind::ToolCallStarted { tool_name: call.name.clone() });
        self.budget.record_tool_call();
        if call.name == "web_search" {
            self.web_search_calls += 1;
        }

        let result = self.tools.execute_tool(&call.name, call.arguments.clone()).await;
        self.deps.events.publish(
            Some(self.id.clone()),
            EventKind::ToolCallFinished { tool_name: call.name.clone(), success: result.success },
        );

        self.transcript.push_tool_result(RecordedToolResult {
            call_id: call.id.clone(),
            success: result.success,
            output: result.output.clone(),
            error: result.error.as_ref().map(|e| e.message.clone()),
        });
    }

    /// Implements the "budget exhausted — finalize now" protocol (spec.md
    /// §4.2): inject a synthetic directive, force the next turn to emit
    /// `complete_task`, allow one retry, then fabricate a terminal result
    /// from whatever findings have accumulated. Returns `true` once the
    /// loop should stop (either a clean `complete_task` or the fabricated
    /// fallback).
    async fn force_finalize(&mut self, retried: &mut bool, findings_text: &mut String) -> bool {
        self.transcript.push_message(
            EntryRole::User,
            "budget exhausted — finalize now. Call complete_task with your best findings so far.",
        );

        let tool_schemas = vec![complete_task_metadata().to_schema()];
        let messages = self.transcript.to_chat_messages();
        let completion = match self.call_model(&messages, &tool_schemas).await {
            Ok(c) => c,
            Err(_) => {
                *findings_text = self.fallback_findings();
                return true;
            }
        };

        if let Some(call) = completion.tool_calls.iter().find(|c| c.name == "complete_task") {
            *findings_text = call
                .arguments
                .get("report")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(&completion.content)
                .to_string();
            return true;
        }

        if *retried {
            *findings_text = self.fallback_findings();
            return true;
        }
        *retried = true;
        false
    }

    /// Soft token-budget enforcement (spec.md §4.2): once 80% of the
    /// per-Subagent token budget is consumed, replace the oldest
    /// not-yet-summarized `tool_result` entries' LLM-visible content with a
    /// short placeholder, shrinking the context sent on the next turn while
    /// keeping the full record in the audit log.
    fn summarize_oldest_tool_results(&mut self) {
        let unsummarized = self
            .transcript
            .entries()
            .iter()
            .filter(|e| e.tool_result.is_some() && !e.summarized)
            .count();
        if unsummarized == 0 {
            return;
        }
        let to_summarize = (unsummarized + 1) / 2;
        self.transcript
            .summarize_oldest(to_summarize, "[earlier tool result summarized to conserve context]");
    }

    fn fallback_findings(&self) -> String {
        self.transcript
            .entries()
            .iter()
            .filter(|e| e.role == EntryRole::Assistant && !e.content.is_empty())
            .map(|e| e.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn drain_contributed_sources(&self) -> Vec<String> {
        let table = self.deps.sources.lock().await;
        table
            .iter()
            .filter(|s| s.first_seen_by_subagent == self.id)
            .map(|s| s.url.clone())
            .collect()
    }
}

fn system_prompt() -> String {
    "You are a focused research Subagent. Investigate your assigned task using the \
     web_search and web_fetch tools, then call complete_task with your findings. \
     Prefer breadth of sources over speculation; cite nothing yourself, just gather \
     and summarize facts."
        .to_string()
}
