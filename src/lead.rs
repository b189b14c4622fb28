//! Lead Controller — the outer research loop (spec.md §4.4).
//!
//! Grounded on `cloudllm::orchestration::Orchestration::execute_ralph` for the
//! iteration-with-checklist loop shape (here: iterate until `complete_task`,
//! `max_rounds`, or the deadline) and on `execute_parallel` for the
//! fan-out/await-all dispatch shape behind `run_subagents`.

use crate::budget::ConcurrencyGate;
use crate::config::OrchestratorConfig;
use crate::domain::plan::{Plan, TaskSpec};
use crate::domain::query::{Query, QueryType};
use crate::domain::round::{Reflection, Round};
use crate::domain::source::SourceTable;
use crate::domain::transcript::{EntryRole, RecordedToolResult, Transcript};
use crate::domain::{Draft, SubagentResult};
use crate::event::{EventBus, EventKind};
use crate::model::{ChatMessage, ChatModel, ToolSchema, collect_completion};
use crate::providers::{FetchProvider, SearchProvider};
use crate::subagent::{SubagentDeps, SubagentRunner};
use crate::tool_registry::ToolRegistry;
use crate::tools::{complete_task_metadata, run_subagents_metadata, web_search};
use futures_util::future::join_all;
use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

/// Outcome of running the Lead's outer loop.
pub struct LeadOutcome {
    pub draft: Draft,
    pub rounds: Vec<Round>,
    pub failed_task_ids: Vec<String>,
}

pub struct LeadController {
    chat_model: Arc<dyn ChatModel>,
    subagent_model: Arc<dyn ChatModel>,
    search_provider: Arc<dyn SearchProvider>,
    fetch_provider: Arc<dyn FetchProvider>,
    sources: Arc<Mutex<SourceTable>>,
    events: EventBus,
    concurrency: ConcurrencyGate,
    cancel: watch::Receiver<bool>,
    config: Arc<OrchestratorConfig>,
    lead_tools: ToolRegistry,
    transcript: Transcript,
}

impl LeadController {
    pub fn new(
        chat_model: Arc<dyn ChatModel>,
        subagent_model: Arc<dyn ChatModel>,
        search_provider: Arc<dyn SearchProvider>,
        fetch_provider: Arc<dyn FetchProvider>,
        sources: Arc<Mutex<SourceTable>>,
        events: EventBus,
        concurrency: ConcurrencyGate,
        cancel: watch::Receiver<bool>,
        config: Arc<OrchestratorConfig>,
    ) -> Self {
        let mut lead_tools = ToolRegistry::new();
        lead_tools.register(Arc::new(web_search::WebSearchTool::new(
            search_provider.clone(),
            sources.clone(),
            "lead",
            None,
        )));

        let mut transcript = Transcript::new("lead");
        transcript.push_message(EntryRole::System, lead_system_prompt());

        Self {
            chat_model,
            subagent_model,
            search_provider,
            fetch_provider,
            sources,
            events,
            concurrency,
            cancel,
            config,
            lead_tools,
            transcript,
        }
    }

    pub async fn run(mut self, query: &Query) -> LeadOutcome {
        let session_started = Instant::now();
        self.transcript.push_message(EntryRole::User, query.text.clone());

        let query_type = self.classify(query).await;
        self.events.publish(None, EventKind::QueryClassified { query_type: format!("{:?}", query_type) });
        info!("classified query as {:?}", query_type);

        let mut rounds = Vec::new();
        let mut failed_task_ids = Vec::new();

        for round_index in 0..self.config.max_rounds {
            if *self.cancel.borrow() || session_started.elapsed() >= self.config.session_deadline {
                break;
            }

            let plan = match self.next_plan(query_type, round_index).await {
                NextStep::Plan(plan) => plan,
                NextStep::Complete(draft) => {
                    self.events.publish(None, EventKind::SynthesisComplete);
                    return LeadOutcome { draft, rounds, failed_task_ids };
                }
            };

            self.events.publish(
                None,
                EventKind::PlanCreated { round_index, task_count: plan.tasks.len() },
            );

            let mut round = Round::new(round_index, plan.clone());
            let results = self.dispatch(&plan).await;
            for result in &results {
                if result.status != crate::domain::SubagentStatus::Ok {
                    failed_task_ids.push(result.task_id.clone());
                }
            }
            round.results = results;
            self.events.publish(None, EventKind::RoundComplete { round_index });

            self.record_results_in_transcript(&round.results);

            if round_index + 1 >= self.config.max_rounds {
                round.reflection = Some(Reflection::Synthesize);
                rounds.push(round);
                break;
            }
            rounds.push(round);
        }

        let draft = self.force_synthesis().await;
        self.events.publish(None, EventKind::SynthesisComplete);
        LeadOutcome { draft, rounds, failed_task_ids }
    }

    async fn classify(&mut self, query: &Query) -> QueryType {
        let prompt = format!(
            "Classify this research query as exactly one of: depth_first, breadth_first, \
             straightforward. Respond with only the classification word.\n\nQuery: {}",
            query.text
        );
        self.transcript.push_message(EntryRole::System, prompt);
        let messages = self.transcript.to_chat_messages();
        let Ok(stream) = self.chat_model.stream_completion(&messages, &[], 0.0, 16).await else {
            return QueryType::Straightforward;
        };
        let Ok((reply, _)) = collect_completion(stream).await else {
            return QueryType::Straightforward;
        };
        let lowered = reply.content.to_lowercase();
        if lowered.contains("breadth_first") || lowered.contains("breadth first") {
            QueryType::BreadthFirst
        } else if lowered.contains("depth_first") || lowered.contains("depth first") {
            QueryType::DepthFirst
        } else {
            QueryType::Straightforward
        }
    }

    /// Runs the Lead's plan-or-reflect model turn, executing any incidental
    /// `web_search` calls inline (bounded by `max_lead_tool_calls_per_round`)
    /// until the model emits `run_subagents` (next round) or `complete_task`
    /// (synthesis).
    async fn next_plan(&mut self, query_type: QueryType, round_index: usize) -> NextStep {
        let tool_schemas = self.round_tool_schemas();

        for _ in 0..self.config.max_lead_tool_calls_per_round {
            let messages = self.transcript.to_chat_messages();
            let completion = match self.chat_model.stream_completion(&messages, &tool_schemas, 0.3, 4096).await {
                Ok(stream) => collect_completion(stream).await,
                Err(e) => Err(e),
            };
            let reply = match completion {
                Ok((msg, _)) => msg,
                Err(e) => {
                    warn!("lead model call failed: {e}");
                    return NextStep::Complete(Draft::new(String::new()));
                }
            };

            if reply.tool_calls.is_empty() {
                self.transcript.push_message(EntryRole::Assistant, reply.content.to_string());
                continue;
            }

            for call in &reply.tool_calls {
                self.transcript.push_tool_call(call);

                match call.name.as_str() {
                    "run_subagents" => {
                        let tasks = parse_tasks(&call.arguments, round_index);
                        if let Some(plan) = Plan::new(query_type, "lead-directed plan", tasks, self.config.max_subagents) {
                            return NextStep::Plan(plan);
                        }
                    }
                    "complete_task" => {
                        let report = call
                            .arguments
                            .get("report")
                            .and_then(serde_json::Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        return NextStep::Complete(Draft::new(report));
                    }
                    "web_search" => {
                        let result = self.lead_tools.execute_tool("web_search", call.arguments.clone()).await;
                        self.transcript.push_tool_result(RecordedToolResult {
                            call_id: call.id.clone(),
                            success: result.success,
                            output: result.output.clone(),
                            error: result.error.as_ref().map(|e| e.message.clone()),
                        });
                    }
                    other => {
                        self.transcript.push_tool_result(RecordedToolResult {
                            call_id: call.id.clone(),
                            success: false,
                            output: serde_json::Value::Null,
                            error: Some(format!("unknown tool: {other}")),
                        });
                    }
                }
            }
        }

        // Exhausted the per-round tool-call allowance without a decisive
        // run_subagents/complete_task: force a minimal single-task plan so
        // the round still makes progress.
        let fallback = vec![TaskSpec::new(
            format!("round-{round_index}-fallback-{}", Uuid::new_v4()),
            "Continue the research based on prior findings.",
        )];
        match Plan::new(query_type, "fallback plan after exhausted lead turns", fallback, self.config.max_subagents) {
            Some(plan) => NextStep::Plan(plan),
            None => NextStep::Complete(Draft::new(String::new())),
        }
    }

    fn round_tool_schemas(&self) -> Vec<ToolSchema> {
        vec![
            run_subagents_metadata().to_schema(),
            complete_task_metadata().to_schema(),
            web_search::metadata().to_schema(),
        ]
    }

    /// Spawns one `SubagentRunner` per task, bounded by the global
    /// concurrency gate, and awaits all of them. Results preserve dispatch
    /// order regardless of completion order (spec.md §4.4 tie-break rule).
    async fn dispatch(&self, plan: &Plan) -> Vec<SubagentResult> {
        let futures = plan.tasks.iter().map(|task| {
            let gate = self.concurrency.clone();
            let deps = SubagentDeps {
                chat_model: self.subagent_model.clone(),
                search_provider: self.search_provider.clone(),
                fetch_provider: self.fetch_provider.clone(),
                sources: self.sources.clone(),
                events: self.events.clone(),
                cancel: self.cancel.clone(),
            };
            let task = task.clone();
            let config = self.config.clone();
            let subagent_id = format!("sub-{}", Uuid::new_v4());
            async move {
                let _permit = gate.acquire().await;
                let runner = SubagentRunner::new(subagent_id, task, deps, &config);
                runner.run().await
            }
        });
        join_all(futures).await
    }

    fn record_results_in_transcript(&mut self, results: &[SubagentResult]) {
        let summary = results
            .iter()
            .map(|r| format!("- [{:?}] {}: {}", r.status, r.task_id, r.findings_text))
            .collect::<Vec<_>>()
            .join("\n");
        self.transcript.push_message(
            EntryRole::User,
            format!("Subagent results for this round:\n{summary}\n\nEmit run_subagents for another round or complete_task to synthesize."),
        );
    }

    /// Max-rounds-without-complete fallback: force a plain-text synthesis
    /// turn with tools disabled (spec.md §4.4, stop condition 5).
    async fn force_synthesis(&mut self) -> Draft {
        self.events.publish(None, EventKind::SynthesisStarted);
        self.transcript.push_message(
            EntryRole::User,
            "Synthesize your final report now from everything gathered so far. Respond with prose only.",
        );
        let messages = self.transcript.to_chat_messages();
        match self.chat_model.stream_completion(&messages, &[], 0.3, 8192).await {
            Ok(stream) => match collect_completion(stream).await {
                Ok((reply, _)) => Draft::new(reply.content.to_string()),
                Err(_) => Draft::new(String::new()),
            },
            Err(_) => Draft::new(String::new()),
        }
    }
}

enum NextStep {
    Plan(Plan),
    Complete(Draft),
}

fn parse_tasks(arguments: &serde_json::Value, round_index: usize) -> Vec<TaskSpec> {
    arguments
        .get("tasks")
        .and_then(serde_json::Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str())
                .map(|prompt| TaskSpec::new(format!("r{round_index}-t{}", Uuid::new_v4()), prompt))
                .collect()
        })
        .unwrap_or_default()
}

fn lead_system_prompt() -> String {
    "You are the Lead research controller. Classify the query, decompose it into \
     focused subtasks for autonomous research Subagents via run_subagents, review \
     their findings, and either continue with another run_subagents round or call \
     complete_task with a synthesized report when you have enough to answer the \
     query thoroughly."
        .to_string()
}
