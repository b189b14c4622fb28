//! Session State & Provenance (spec.md §4.7) plus the `run_session` entry
//! point that wires the Lead Controller, Citation Processor, budget,
//! concurrency, and event-bus components together for one run.
//!
//! Persistence is grounded on `cloudllm::thought_chain::ThoughtChain`'s
//! append-only, versioned, serializable run-record idiom, adapted here to a
//! single-document JSON snapshot (`SessionRecord`) since a `Session` is a
//! point-in-time run rather than an append log (SPEC_FULL.md §10).

use crate::citation::CitationProcessor;
use crate::config::OrchestratorConfig;
use crate::domain::query::Query;
use crate::domain::round::Round;
use crate::domain::source::SourceTable;
use crate::domain::{CitedOutput, Draft};
use crate::event::{Event, EventBus, EventKind};
use crate::lead::LeadController;
use crate::model::ChatModel;
use crate::providers::{FetchProvider, SearchProvider};
use crate::budget::ConcurrencyGate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use chrono::{DateTime, Utc};
use log::info;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

/// The run's terminal outcome, independent of whether prose was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Ok,
    /// At least one Subagent/round failed but a Draft was still produced.
    PartialFailure,
    Cancelled,
    /// No Draft could be produced at all (spec.md §7: `UnavailableLLM` or
    /// total-deadline expiry before any Draft).
    Error,
}

/// The mutable per-run record (spec.md §4.7). Held entirely by the caller
/// once `run_session` returns; nothing here is shared across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub query: Query,
    pub status: SessionStatus,
    pub rounds: Vec<Round>,
    pub sources: SourceTable,
    pub draft: Draft,
    pub cited_output: CitedOutput,
    pub failed_task_ids: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Current on-disk schema version for [`SessionRecord`].
pub const SESSION_RECORD_FORMAT_VERSION: u32 = 1;

/// Versioned, self-describing persistence envelope around a [`Session`]
/// (spec.md §6, "Persistence format (optional)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub format_version: u32,
    pub config: OrchestratorConfig,
    pub session: Session,
    pub event_log: Vec<Event>,
}

impl SessionRecord {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn save(&self, path: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        let json = self.to_json().map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    pub fn load(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Constructs a fresh cancellation pair for a run: keep the sender to cancel
/// the session (spec.md §5, hierarchical cancellation), pass the receiver
/// into [`run_session`].
pub fn new_cancellation() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// A live session in flight: holds the pieces a caller needs to observe and
/// cancel a run that is running on another task, since `run_session` itself
/// only resolves once the run is complete (spec.md §6: "the core exposes
/// `run_session(query, config) -> Session` and a subscribable event
/// stream").
pub struct SessionHandle {
    pub events: EventBus,
    pub cancel: watch::Sender<bool>,
    task: tokio::task::JoinHandle<(Session, Vec<Event>)>,
}

impl SessionHandle {
    /// Requests cancellation; idempotent (spec.md §8, cancellation law).
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Awaits run completion, returning the terminal `Session` and its full
    /// event log.
    pub async fn join(self) -> (Session, Vec<Event>) {
        self.task.await.expect("session task panicked")
    }
}

/// Spawns a research run on a new task and returns a [`SessionHandle`]
/// subscribable immediately, before any event is published.
pub fn spawn_session(
    query: Query,
    config: OrchestratorConfig,
    lead_model: Arc<dyn ChatModel>,
    subagent_model: Arc<dyn ChatModel>,
    search_provider: Arc<dyn SearchProvider>,
    fetch_provider: Arc<dyn FetchProvider>,
) -> SessionHandle {
    let (cancel_tx, cancel_rx) = new_cancellation();
    let events = EventBus::new(Uuid::new_v4().to_string(), 1024);
    let events_for_task = events.clone();
    let task = tokio::spawn(run_session(
        query,
        config,
        lead_model,
        subagent_model,
        search_provider,
        fetch_provider,
        cancel_rx,
        events_for_task,
    ));
    SessionHandle { events, cancel: cancel_tx, task }
}

/// Drives one complete research run: classify/plan/dispatch/reflect via the
/// Lead Controller, then citation insertion, producing a terminal `Session`.
/// Mirrors the external surface named in spec.md §6
/// (`run_session(query, config) -> Session`), extended with the out-of-scope
/// collaborators (`ChatModel`/`SearchProvider`/`FetchProvider`) the core
/// consumes but does not construct, an externally-held `EventBus` (so
/// callers can subscribe before the first event fires), and a cancellation
/// receiver obtained from [`new_cancellation`]. Prefer [`spawn_session`] when
/// mid-flight cancellation or live event streaming is needed; call this
/// directly only when the caller just wants to await a full run in place.
pub async fn run_session(
    query: Query,
    config: OrchestratorConfig,
    lead_model: Arc<dyn ChatModel>,
    subagent_model: Arc<dyn ChatModel>,
    search_provider: Arc<dyn SearchProvider>,
    fetch_provider: Arc<dyn FetchProvider>,
    cancel: watch::Receiver<bool>,
    events: EventBus,
) -> (Session, Vec<Event>) {
    config.validate().expect("invalid OrchestratorConfig");

    let started_at = Utc::now();
    let start_instant = Instant::now();
    let session_id = Uuid::new_v4().to_string();

    let event_log: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(Vec::new()));
    let collector_handle = {
        let mut sub = events.subscribe();
        let log = event_log.clone();
        tokio::spawn(async move {
            while let Some(event) = sub.recv().await {
                log.lock().await.push(event);
            }
        })
    };

    events.publish(None, EventKind::SessionStarted);

    let sources = Arc::new(Mutex::new(SourceTable::new()));
    let concurrency = ConcurrencyGate::new(config.max_concurrent);
    let config = Arc::new(config);

    let lead = LeadController::new(
        lead_model.clone(),
        subagent_model,
        search_provider,
        fetch_provider,
        sources.clone(),
        events.clone(),
        concurrency,
        cancel.clone(),
        config.clone(),
    );
    let outcome = lead.run(&query).await;

    let source_snapshot = sources.lock().await.clone();
    let citation_processor = CitationProcessor::new(lead_model, &config, events.clone());
    let cited_output = if outcome.draft.text.is_empty() {
        CitedOutput { text: String::new(), degraded: false }
    } else {
        citation_processor.process(&outcome.draft, &source_snapshot).await
    };

    let status = if *cancel.borrow() {
        SessionStatus::Cancelled
    } else if outcome.draft.text.is_empty() {
        SessionStatus::Error
    } else if !outcome.failed_task_ids.is_empty() {
        SessionStatus::PartialFailure
    } else {
        SessionStatus::Ok
    };

    let session = Session {
        id: session_id,
        query,
        status,
        rounds: outcome.rounds,
        sources: source_snapshot,
        draft: outcome.draft,
        cited_output,
        failed_task_ids: outcome.failed_task_ids,
        started_at,
        finished_at: Utc::now(),
    };

    info!("session {} finished as {:?} in {:?}", session.id, session.status, start_instant.elapsed());

    // Dropping our clone of `events` (and every clone handed to the Lead/
    // Citation components, which have already gone out of scope) lets the
    // broadcast channel close once no subscriber holds a sender, which ends
    // the collector loop below.
    drop(events);
    let _ = collector_handle.await;
    let log = event_log.lock().await.clone();

    (session, log)
}
