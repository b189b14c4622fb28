//! Configuration for the research orchestrator.
//!
//! Like the teacher's [`CloudLLMConfig`], this struct is intentionally plain:
//! users construct it directly or via [`OrchestratorConfig::default`]. No
//! TOML/YAML/file-format parsing dependency is introduced for it — callers
//! that want file-backed config layer their own `serde` deserialization on
//! top of this struct (it already derives `Deserialize`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Citation rendering style for the final [`crate::domain::draft::CitedOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationStyle {
    /// `claim[1]` style numeric anchors.
    Numeric,
    /// `claim^1` style footnote markers.
    Footnote,
}

/// All recognized configuration options from spec.md §6, plus the
/// identifiers of the two models the orchestrator drives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Model identifier used for the Lead Controller's ChatModel calls.
    pub lead_model: String,
    /// Model identifier used for Subagent Runners' ChatModel calls.
    pub subagent_model: String,

    /// Upper bound on tasks accepted by one `run_subagents` call.
    pub max_subagents: usize,
    /// Global active-Subagent cap enforced by the concurrency semaphore.
    pub max_concurrent: usize,
    /// Lead outer-loop iteration cap.
    pub max_rounds: usize,
    /// Cap on Lead tool calls (other than `run_subagents`) within one plan round.
    pub max_lead_tool_calls_per_round: usize,

    /// Total wall-clock budget for one Session.
    pub session_deadline: Duration,
    /// Wall-clock budget for one Subagent Runner.
    pub subagent_deadline: Duration,
    /// Wall-clock budget for one tool call.
    pub tool_deadline: Duration,
    /// Wall-clock budget for one Lead ChatModel call.
    pub lead_llm_call_deadline: Duration,
    /// Grace window allotted to in-flight work after a cancellation signal.
    pub cancellation_grace: Duration,

    /// Tool-call budgets derived from `TaskSpec::budget_hint`.
    pub default_budget_light: u32,
    pub default_budget_medium: u32,
    pub default_budget_heavy: u32,
    /// Absolute ceiling on any Subagent's tool-call budget, regardless of hint.
    pub max_tool_call_budget: u32,

    /// Maximum sources a single Subagent may contribute to the SourceTable.
    pub source_cap_per_subagent: usize,
    /// Soft token budget per Subagent; crossing 80% triggers summarize-then-continue.
    pub token_budget_per_subagent: usize,

    /// Rendering style for the Citation Processor.
    pub citation_style: CitationStyle,

    /// Maximum retry attempts for `TransientExternal` tool failures.
    pub max_retry_attempts: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            lead_model: "gpt-4.1".to_string(),
            subagent_model: "gpt-4.1-mini".to_string(),

            max_subagents: 20,
            max_concurrent: 5,
            max_rounds: 5,
            max_lead_tool_calls_per_round: 4,

            session_deadline: Duration::from_secs(30 * 60),
            subagent_deadline: Duration::from_secs(5 * 60),
            tool_deadline: Duration::from_secs(30),
            lead_llm_call_deadline: Duration::from_secs(5 * 60),
            cancellation_grace: Duration::from_secs(2),

            default_budget_light: 5,
            default_budget_medium: 10,
            default_budget_heavy: 15,
            max_tool_call_budget: 20,

            source_cap_per_subagent: 100,
            token_budget_per_subagent: 100_000,

            citation_style: CitationStyle::Numeric,

            max_retry_attempts: 3,
        }
    }
}

impl OrchestratorConfig {
    /// Validate configuration invariants that would otherwise surface as
    /// confusing runtime behavior (e.g. a zero concurrency cap deadlocking
    /// `run_subagents`).
    pub fn validate(&self) -> Result<(), String> {
        if self.max_subagents == 0 {
            return Err("max_subagents must be >= 1".to_string());
        }
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be >= 1".to_string());
        }
        if self.max_rounds == 0 {
            return Err("max_rounds must be >= 1".to_string());
        }
        Ok(())
    }
}
