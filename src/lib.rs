//! `deepdive` — a dynamic multi-agent research orchestrator.
//!
//! A Lead Controller classifies a query, plans and dispatches bounded-
//! parallel autonomous Subagents that search and fetch the web, reflects on
//! their findings across rounds, and produces a cited report via the
//! Citation Processor. See `SPEC_FULL.md` for the full specification this
//! crate implements.
//!
//! The external surface is [`session::spawn_session`] (subscribe to events
//! and cancel mid-flight) or [`session::run_session`] (await a complete run
//! in place). Both are driven by collaborators the crate does not construct
//! for you: a [`model::ChatModel`] (a bundled [`openai_chat::OpenAIChatModel`]
//! is provided), and a [`providers::SearchProvider`]/[`providers::FetchProvider`]
//! pair, which are expected to be supplied by the embedding application.

pub mod budget;
pub mod citation;
pub mod config;
pub mod domain;
pub mod error;
pub mod event;
pub mod lead;
pub mod model;
pub mod openai_chat;
pub mod providers;
pub mod session;
pub mod subagent;
pub mod tool_registry;
pub mod tools;

#[cfg(feature = "testing")]
pub mod testing;

pub use config::{CitationStyle, OrchestratorConfig};
pub use domain::{CitedOutput, Draft, Query, QueryType};
pub use error::{ErrorKind, OrchestratorError, OrchestratorResult};
pub use event::{Event, EventBus, EventKind, EventSubscriber};
pub use model::ChatModel;
pub use openai_chat::OpenAIChatModel;
pub use providers::{FetchProvider, SearchProvider};
pub use session::{new_cancellation, run_session, spawn_session, Session, SessionHandle, SessionRecord, SessionStatus};
