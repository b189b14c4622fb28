//! `Round` — one Lead iteration: a plan, its dispatch results, and a
//! reflection.

use super::plan::Plan;
use super::result::SubagentResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Reflection {
    /// The Lead decided to run another round with a new plan.
    Continue { new_plan_rationale: String },
    /// The Lead decided enough has been gathered; synthesis should proceed.
    Synthesize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub round_index: usize,
    pub plan: Plan,
    pub results: Vec<SubagentResult>,
    pub reflection: Option<Reflection>,
}

impl Round {
    pub fn new(round_index: usize, plan: Plan) -> Self {
        Self { round_index, plan, results: Vec::new(), reflection: None }
    }
}
