//! The Session State & Provenance data model (spec.md §3).

pub mod draft;
pub mod plan;
pub mod query;
pub mod result;
pub mod round;
pub mod source;
pub mod transcript;

pub use draft::{CitedOutput, Draft};
pub use plan::{BudgetHint, Plan, TaskSpec};
pub use query::{Query, QueryType};
pub use result::{SubagentResult, SubagentStatus};
pub use round::{Reflection, Round};
pub use source::{Source, SourceTable};
pub use transcript::{EntryRole, Transcript, TranscriptEntry};
