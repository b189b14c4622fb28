//! Event/Stream Bus (spec.md §4.6).
//!
//! Grounded on the teacher's `AgentEvent`/`OrchestrationEvent`/`EventHandler`
//! shape (a typed event enum plus a trait observers implement), redesigned
//! per spec's explicit requirements the teacher's version lacks: a global
//! monotonic sequence number, multi-subscriber broadcast semantics, and a
//! coalesced `dropped(n)` event for subscribers whose queue overflows.
//! `tokio::sync::broadcast` supplies exactly that last-resort-lag behavior.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// One typed event kind, as enumerated in spec.md §4.6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    SessionStarted,
    QueryClassified { query_type: String },
    PlanCreated { round_index: usize, task_count: usize },
    SubagentSpawned { task_id: String },
    ToolCallStarted { tool_name: String },
    ToolCallFinished { tool_name: String, success: bool },
    TokenDelta { delta: String },
    SubagentFinished { status: String },
    RoundComplete { round_index: usize },
    SynthesisStarted,
    SynthesisComplete,
    CitationComplete { degraded: bool },
    Error { error_kind: String, message: String },
    /// Synthetic event a subscriber receives instead of the events it
    /// missed when its queue overflowed.
    Dropped { count: u64 },
}

/// An `EventKind` wrapped with bus-level metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub subagent_id: Option<String>,
    pub kind: EventKind,
}

/// Broadcast-style event bus: many subscribers may observe without
/// affecting one another or blocking producers. A subscriber falling behind
/// does not slow the bus down; it instead receives a single coalesced
/// `Dropped(n)` event the next time it polls.
#[derive(Clone)]
pub struct EventBus {
    session_id: String,
    sender: broadcast::Sender<Event>,
    seq: Arc<AtomicU64>,
}

/// A subscription handle. Wraps `broadcast::Receiver` to translate a lagged
/// receiver into the spec's `dropped(n)` event instead of propagating the
/// raw `RecvError::Lagged`.
pub struct EventSubscriber {
    inner: broadcast::Receiver<Event>,
    session_id: String,
}

impl EventBus {
    pub fn new(session_id: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(16));
        Self { session_id: session_id.into(), sender, seq: Arc::new(AtomicU64::new(0)) }
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber { inner: self.sender.subscribe(), session_id: self.session_id.clone() }
    }

    /// Publish `kind`, stamping it with the next sequence number and the
    /// current timestamp. A publish with no subscribers is not an error
    /// (`broadcast::Sender::send` failing just means nobody is listening).
    pub fn publish(&self, subagent_id: Option<String>, kind: EventKind) {
        let event = Event {
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            timestamp: Utc::now(),
            session_id: self.session_id.clone(),
            subagent_id,
            kind,
        };
        let _ = self.sender.send(event);
    }
}

impl EventSubscriber {
    /// Await the next event, translating a lag into a synthetic
    /// `Dropped(n)` event rather than an error.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.inner.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    return Some(Event {
                        seq: 0,
                        timestamp: Utc::now(),
                        session_id: self.session_id.clone(),
                        subagent_id: None,
                        kind: EventKind::Dropped { count: n },
                    });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequence_numbers_increase_monotonically() {
        let bus = EventBus::new("s1", 16);
        let mut sub = bus.subscribe();
        bus.publish(None, EventKind::SessionStarted);
        bus.publish(None, EventKind::SynthesisStarted);
        let e1 = sub.recv().await.unwrap();
        let e2 = sub.recv().await.unwrap();
        assert!(e2.seq > e1.seq);
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_dropped_event() {
        let bus = EventBus::new("s1", 2);
        let mut sub = bus.subscribe();
        for _ in 0..10 {
            bus.publish(None, EventKind::SynthesisStarted);
        }
        let event = sub.recv().await.unwrap();
        assert!(matches!(event.kind, EventKind::Dropped { .. }));
    }
}
