//! `SessionRecord` persistence (SPEC_FULL.md §10, spec.md §6 "Persistence
//! format (optional)").

use deepdive::config::OrchestratorConfig;
use deepdive::domain::Query;
use deepdive::event::EventBus;
use deepdive::providers::SearchHit;
use deepdive::session::{new_cancellation, run_session, SessionRecord, SESSION_RECORD_FORMAT_VERSION};
use deepdive::testing::{MockChatModel, MockFetchProvider, MockSearchProvider, ScriptedTurn};
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::try_init();
}

#[tokio::test]
async fn session_record_round_trips_through_json_on_disk() {
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

    let mut cfg = OrchestratorConfig::default();
    cfg.max_rounds = 1;
    cfg.max_subagents = 1;

    let (_cancel_tx, cancel_rx) = new_cancellation();
    let events = EventBus::new("test-session", 256);

    let (session, event_log) = run_session(
        Query::new("What is the capital of France?"),
        cfg.clone(),
        lead_model,
        subagent_model,
        search,
        fetch,
        cancel_rx,
        events,
    )
    .await;

    let record = SessionRecord { format_version: SESSION_RECORD_FORMAT_VERSION, config: cfg, session, event_log };

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.json");
    record.save(&path).expect("save session record");

    let loaded = SessionRecord::load(&path).expect("load session record");

    assert_eq!(loaded.format_version, SESSION_RECORD_FORMAT_VERSION);
    assert_eq!(loaded.session.id, record.session.id);
    assert_eq!(loaded.session.status, record.session.status);
    assert_eq!(loaded.session.draft.text, record.session.draft.text);
    assert_eq!(loaded.session.cited_output.text, record.session.cited_output.text);
    assert_eq!(loaded.event_log.len(), record.event_log.len());
}
