//! `Query` — the user's immutable natural-language request.

use serde::{Deserialize, Serialize};

/// Advisory classification of a `Query`. Affects only default subagent
/// count and prompt template selection — never correctness (spec.md §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    DepthFirst,
    BreadthFirst,
    Straightforward,
}

impl QueryType {
    /// Default subagent count suggested by classification, per spec.md §4.4:
    /// 1 for straightforward, 3-5 for depth_first, up to `max_subagents` for
    /// breadth_first.
    pub fn default_subagent_count(&self, max_subagents: usize) -> usize {
        let max_subagents = max_subagents.max(1);
        match self {
            QueryType::Straightforward => 1,
            QueryType::DepthFirst => 4.min(max_subagents),
            QueryType::BreadthFirst => max_subagents,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
