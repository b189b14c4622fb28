//! End-to-end `run_session` scenarios (spec.md §8, seed scenarios 1 and 6).

use deepdive::config::OrchestratorConfig;
use deepdive::domain::Query;
use deepdive::event::EventBus;
use deepdive::providers::SearchHit;
use deepdive::session::{new_cancellation, run_session};
use deepdive::testing::{MockChatModel, MockFetchProvider, MockSearchProvider, ScriptedTurn};
use deepdive::SessionStatus;
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::try_init();
}

fn trivial_factual_config() -> OrchestratorConfig {
    let mut cfg = OrchestratorConfig::default();
    cfg.max_rounds = 1;
    cfg.max_subagents = 1;
    cfg
}

#[tokio::test]
async fn trivial_factual_query_produces_a_cited_draft() {
    init_logging();
    let lead_model = Arc::new(MockChatModel::new(
        "mock-lead",
        vec![
            ScriptedTurn::Text("straightforward".to_string()),
            ScriptedTurn::ToolCall {
                name: "run_subagents".to_string(),
                arguments: serde_json::json!({"tasks": ["What is the capital of France?"]}),
            },
            ScriptedTurn::Text("Paris is the capital of France.".to_string()),
            ScriptedTurn::Text("Paris is the capital of France.{{cite:1}}".to_string()),
        ],
    ));
    let subagent_model = Arc::new(MockChatModel::new(
        "mock-subagent",
        vec![
            ScriptedTurn::ToolCall { name: "web_search".to_string(), arguments: serde_json::json!({"query": "capital of France"}) },
            ScriptedTurn::ToolCall {
                name: "complete_task".to_string(),
                arguments: serde_json::json!({"report": "Paris is the capital of France."}),
            },
        ],
    ));
    let search = Arc::new(MockSearchProvider::with_hits(vec![SearchHit {
        url: "https://example.com/paris".to_string(),
        title: "Paris — Wikipedia".to_string(),
        snippet: "Paris is the capital of France.".to_string(),
    }]));
    let fetch = Arc::new(MockFetchProvider::new());

    let (_cancel_tx, cancel_rx) = new_cancellation();
    let events = EventBus::new("test-session", 256);

    let (session, log) = run_session(
        Query::new("What is the capital of France?"),
        trivial_factual_config(),
        lead_model,
        subagent_model,
        search,
        fetch,
        cancel_rx,
        events,
    )
    .await;

    assert_eq!(session.status, SessionStatus::Ok);
    assert!(session.draft.text.contains("Paris"));
    assert!(session.cited_output.text.contains("Paris"));
    assert!(!session.cited_output.degraded);
    assert_eq!(session.sources.len(), 1);
    assert!(session.rounds.len() >= 1);
    assert!(log.iter().any(|e| matches!(e.kind, deepdive::EventKind::SessionStarted)));
    assert!(log.iter().any(|e| matches!(e.kind, deepdive::EventKind::SynthesisComplete)));
}

#[tokio::test]
async fn cancellation_is_respected_and_idempotent() {
    init_logging();
    let (cancel_tx, cancel_rx) = new_cancellation();
    // Cancel before the run even starts, and twice, to exercise idempotence
    // (spec.md §8, "cancellation idempotence" law) without relying on timing.
    cancel_tx.send(true).unwrap();
    cancel_tx.send(true).unwrap();
    assert!(*cancel_rx.borrow());

    let lead_model = Arc::new(MockChatModel::new("mock-lead", vec![ScriptedTurn::Text(String::new())]));
    let subagent_model = Arc::new(MockChatModel::new("mock-subagent", vec![]));
    let search = Arc::new(MockSearchProvider::with_hits(vec![]));
    let fetch = Arc::new(MockFetchProvider::new());
    let events = EventBus::new("test-session", 64);

    let (session, _log) = run_session(
        Query::new("irrelevant"),
        trivial_factual_config(),
        lead_model,
        subagent_model,
        search,
        fetch,
        cancel_rx,
        events,
    )
    .await;

    assert_eq!(session.status, SessionStatus::Cancelled);
}
