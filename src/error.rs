//! Crate-wide error taxonomy.
//!
//! Mirrors the shape of the teacher's `ToolError`/`OrchestrationError` enums: a
//! plain `enum` carrying the failure kind plus a human-readable message, with
//! manual `Display`/`Error` impls rather than a derive-macro crate.

use std::error::Error;
use std::fmt;

/// The kinds of failure the orchestrator distinguishes, independent of which
/// component raised them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network error, rate limit, provider 5xx — retried with backoff.
    TransientExternal,
    /// Malformed provider response, 4xx non-rate-limit — counts against budget.
    PermanentExternal,
    /// Tool-call, token, or deadline budget exceeded.
    BudgetExceeded,
    /// An external cancellation signal was observed.
    CancellationRequested,
    /// The orchestrator detected its own contract breach.
    InvariantViolation,
    /// The ChatModel could not be reached at all.
    UnavailableLlm,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::TransientExternal => "transient_external",
            ErrorKind::PermanentExternal => "permanent_external",
            ErrorKind::BudgetExceeded => "budget_exceeded",
            ErrorKind::CancellationRequested => "cancellation_requested",
            ErrorKind::InvariantViolation => "invariant_violation",
            ErrorKind::UnavailableLlm => "unavailable_llm",
        };
        write!(f, "{}", s)
    }
}

/// The crate's single error type, returned from every fallible public entry
/// point.
#[derive(Debug)]
pub struct OrchestratorError {
    pub kind: ErrorKind,
    pub message: String,
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl OrchestratorError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientExternal, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermanentExternal, message)
    }

    pub fn budget_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BudgetExceeded, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CancellationRequested, message)
    }

    pub fn invariant_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvariantViolation, message)
    }

    pub fn unavailable_llm(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnavailableLlm, message)
    }

    /// `true` for kinds the backoff loop in `tools::invoke_with_retry` retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::TransientExternal)
    }
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
