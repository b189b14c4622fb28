//! `Plan`/`TaskSpec` — the Lead's decomposition of a `Query` into Subagent work.

use super::query::QueryType;
use serde::{Deserialize, Serialize};

/// Maps to a tool-call budget via `OrchestratorConfig::default_budget_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetHint {
    Light,
    Medium,
    Heavy,
}

/// A self-contained prompt describing what one Subagent must investigate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: String,
    pub prompt: String,
    pub budget_hint: Option<BudgetHint>,
}

impl TaskSpec {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self { id: id.into(), prompt: prompt.into(), budget_hint: None }
    }

    pub fn with_budget_hint(mut self, hint: BudgetHint) -> Self {
        self.budget_hint = Some(hint);
        self
    }
}

/// The Lead's decomposition of a `Query` for one round. Replaced (not
/// mutated) between rounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub query_type: QueryType,
    pub rationale: String,
    pub tasks: Vec<TaskSpec>,
}

impl Plan {
    /// Construct a plan, clamping `tasks` to `[1, max_subagents]` per
    /// spec.md §3. Returns `None` if `tasks` is empty — an empty plan is a
    /// contract violation the Lead must not produce.
    pub fn new(
        query_type: QueryType,
        rationale: impl Into<String>,
        mut tasks: Vec<TaskSpec>,
        max_subagents: usize,
    ) -> Option<Self> {
        if tasks.is_empty() {
            return None;
        }
        tasks.truncate(max_subagents.max(1));
        Some(Self { query_type, rationale: rationale.into(), tasks })
    }
}
