//! Subagent Runner behavior (spec.md §4.3, §8).

use deepdive::config::OrchestratorConfig;
use deepdive::domain::{BudgetHint, SourceTable, SubagentStatus, TaskSpec};
use deepdive::event::EventBus;
use deepdive::subagent::{SubagentDeps, SubagentRunner};
use deepdive::testing::{MockChatModel, MockFetchProvider, MockSearchProvider, ScriptedTurn};
use deepdive::providers::SearchHit;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

fn init_logging() {
    let _ = env_logger::try_init();
}

fn deps(chat_model: Arc<MockChatModel>, search: Arc<MockSearchProvider>, fetch: Arc<MockFetchProvider>) -> SubagentDeps {
    let (_tx, rx) = watch::channel(false);
    SubagentDeps {
        chat_model,
        search_provider: search,
        fetch_provider: fetch,
        sources: Arc::new(Mutex::new(SourceTable::new())),
        events: EventBus::new("test-session", 64),
        cancel: rx,
    }
}

#[tokio::test]
async fn budget_exhaustion_forces_finalize_with_best_effort_report() {
    init_logging();
    let chat_model = Arc::new(MockChatModel::new(
        "mock-subagent",
        vec![
            ScriptedTurn::ToolCall { name: "web_search".to_string(), arguments: serde_json::json!({"query": "intermittent fasting"}) },
            ScriptedTurn::ToolCall { name: "complete_task".to_string(), arguments: serde_json::json!({"report": "partial findings so far"}) },
        ],
    ));
    let search = Arc::new(MockSearchProvider::with_hits(vec![SearchHit {
        url: "https://example.com/a".to_string(),
        title: "A".to_string(),
        snippet: "...".to_string(),
    }]));
    let fetch = Arc::new(MockFetchProvider::new());

    let mut cfg = OrchestratorConfig::default();
    cfg.default_budget_light = 1;
    cfg.max_tool_call_budget = 1;

    let task = TaskSpec::new("t1", "Evaluate fasting evidence").with_budget_hint(BudgetHint::Light);
    let runner = SubagentRunner::new("sub-1", task, deps(chat_model, search, fetch), &cfg);

    let result = runner.run().await;

    assert_eq!(result.status, SubagentStatus::BudgetExhausted);
    assert_eq!(result.findings_text, "partial findings so far");
    assert!(result.tool_calls_made <= 1, "tool_calls_made must not exceed the 1-call budget");
}

#[tokio::test]
async fn tool_failure_is_an_observable_result_not_a_terminal_error() {
    init_logging();
    let chat_model = Arc::new(MockChatModel::new(
        "mock-subagent",
        vec![
            ScriptedTurn::ToolCall { name: "web_fetch".to_string(), arguments: serde_json::json!({"url": "https://dead.example.com"}) },
            ScriptedTurn::ToolCall { name: "web_search".to_string(), arguments: serde_json::json!({"query": "capital of France"}) },
            ScriptedTurn::ToolCall { name: "complete_task".to_string(), arguments: serde_json::json!({"report": "Paris is the capital of France."}) },
        ],
    ));
    let search = Arc::new(MockSearchProvider::with_hits(vec![SearchHit {
        url: "https://example.com/paris".to_string(),
        title: "Paris".to_string(),
        snippet: "Paris is the capital of France.".to_string(),
    }]));
    let fetch = Arc::new(MockFetchProvider::new().failing_on("https://dead.example.com"));

    let cfg = OrchestratorConfig::default();
    let task = TaskSpec::new("t1", "What is the capital of France?");
    let runner = SubagentRunner::new("sub-1", task, deps(chat_model, search, fetch), &cfg);

    let result = runner.run().await;

    assert_eq!(result.status, SubagentStatus::Ok);
    assert_eq!(result.findings_text, "Paris is the capital of France.");
    assert_eq!(result.sources.len(), 1);
}

#[tokio::test]
async fn duplicate_query_is_rejected_without_consuming_budget() {
    init_logging();
    let chat_model = Arc::new(MockChatModel::new(
        "mock-subagent",
        vec![
            ScriptedTurn::ToolCall { name: "web_search".to_string(), arguments: serde_json::json!({"query": "capital of France"}) },
            ScriptedTurn::ToolCall { name: "web_search".to_string(), arguments: serde_json::json!({"query": "Capital Of France "}) },
            ScriptedTurn::ToolCall { name: "complete_task".to_string(), arguments: serde_json::json!({"report": "Paris."}) },
        ],
    ));
    let search = Arc::new(MockSearchProvider::with_hits(vec![SearchHit {
        url: "https://example.com/paris".to_string(),
        title: "Paris".to_string(),
        snippet: "Paris is the capital of France.".to_string(),
    }]));
    let fetch = Arc::new(MockFetchProvider::new());

    let mut cfg = OrchestratorConfig::default();
    cfg.default_budget_medium = 5;
    let task = TaskSpec::new("t1", "What is the capital of France?");
    let runner = SubagentRunner::new("sub-1", task, deps(chat_model, search, fetch), &cfg);

    let result = runner.run().await;

    assert_eq!(result.status, SubagentStatus::Ok);
    // Only the first (distinctly-cased/whitespaced) query dispatches; the
    // second is a case/whitespace-normalized repeat and is rejected.
    assert_eq!(result.tool_calls_made, 1);
}

#[tokio::test]
async fn completing_without_any_search_is_rejected_unless_flagged() {
    init_logging();
    let chat_model = Arc::new(MockChatModel::new(
        "mock-subagent",
        vec![
            ScriptedTurn::ToolCall { name: "complete_task".to_string(), arguments: serde_json::json!({"report": "2+2=4"}) },
            ScriptedTurn::ToolCall { name: "complete_task".to_string(), arguments: serde_json::json!({"report": "2+2=4", "no_search_needed": true}) },
        ],
    ));
    let search = Arc::new(MockSearchProvider::with_hits(vec![]));
    let fetch = Arc::new(MockFetchProvider::new());
    let cfg = OrchestratorConfig::default();
    let task = TaskSpec::new("t1", "What is 2+2?");
    let runner = SubagentRunner::new("sub-1", task, deps(chat_model, search, fetch), &cfg);

    let result = runner.run().await;

    assert_eq!(result.status, SubagentStatus::Ok);
    assert_eq!(result.findings_text, "2+2=4");
    assert_eq!(result.tool_calls_made, 0);
}
