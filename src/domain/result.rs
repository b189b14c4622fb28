//! `SubagentResult` — the terminal record emitted once per Subagent.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubagentStatus {
    Ok,
    BudgetExhausted,
    Timeout,
    Error,
    Cancelled,
}

impl SubagentStatus {
    pub fn is_terminal(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentResult {
    pub id: String,
    pub task_id: String,
    pub status: SubagentStatus,
    pub findings_text: String,
    /// References into the run's SourceTable (normalized URLs).
    pub sources: Vec<String>,
    pub tool_calls_made: u32,
    pub tokens_used: usize,
    pub duration_ms: u64,
    /// Set when `status != Ok`, a short machine-readable explanation.
    pub error_detail: Option<String>,
}
