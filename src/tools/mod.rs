//! Concrete `Tool` implementations registered for Subagents/the Lead.
//!
//! `run_subagents` and `complete_task` are control-flow pivots (spec.md
//! §4.1) rather than ordinary tool functions; their schemas live here for
//! advertisement but their dispatch is handled directly in
//! [`crate::subagent`] / [`crate::lead`].

pub mod web_fetch;
pub mod web_search;

use crate::tool_registry::{ParamType, ToolMetadata, ToolParameter};

/// Schema for `run_subagents`, advertised to the Lead's ChatModel.
pub fn run_subagents_metadata() -> ToolMetadata {
    ToolMetadata::new(
        "run_subagents",
        "Spawn one autonomous research Subagent per task and block until all finish.",
    )
    .with_parameter(ToolParameter::new(
        "tasks",
        ParamType::Array,
        "List of self-contained task prompt strings, one per Subagent.",
    ))
}

/// Schema for `complete_task`, advertised to both Lead and Subagent
/// ChatModels. The `no_search_needed` flag lets a Subagent declare a task
/// is trivially answerable from tool-free reasoning, exempting it from the
/// minimum-one-`web_search` floor (spec.md §4.3).
pub fn complete_task_metadata() -> ToolMetadata {
    ToolMetadata::new(
        "complete_task",
        "Terminate this agent's loop; the report becomes its final output.",
    )
    .with_parameter(ToolParameter::new(
        "report",
        ParamType::String,
        "The final findings or synthesized report text.",
    ))
    .with_parameter(
        ToolParameter::new(
            "no_search_needed",
            ParamType::Boolean,
            "Set true when this task was trivially answerable without any web_search call.",
        )
        .optional(),
    )
}
