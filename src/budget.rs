//! Budget & Rate Control (spec.md §4.2).
//!
//! Grounded on the teacher's `PolicyEngine` choke-point
//! (`cloudllm::planner::{PolicyEngine, PolicyDecision}`): a single place every
//! tool dispatch passes through before it is allowed to run. The global
//! concurrency cap generalizes `Orchestration::execute_parallel`'s per-round
//! `tokio::spawn` fan-out with an explicit `tokio::sync::Semaphore`, which
//! the teacher's version does not bound.

use crate::domain::BudgetHint;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Per-Subagent resource caps, derived from a `TaskSpec::budget_hint`.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    pub tool_call_budget: u32,
    pub source_cap: usize,
    pub token_budget: usize,
    pub deadline: Duration,
}

impl Budget {
    pub fn from_hint(
        hint: Option<BudgetHint>,
        cfg: &crate::config::OrchestratorConfig,
    ) -> Self {
        let raw = match hint {
            None | Some(BudgetHint::Medium) => cfg.default_budget_medium,
            Some(BudgetHint::Light) => cfg.default_budget_light,
            Some(BudgetHint::Heavy) => cfg.default_budget_heavy,
        };
        Self {
            tool_call_budget: raw.min(cfg.max_tool_call_budget),
            source_cap: cfg.source_cap_per_subagent,
            token_budget: cfg.token_budget_per_subagent,
            deadline: cfg.subagent_deadline,
        }
    }
}

/// Why a tool-call admission was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetDecision {
    Allow,
    ToolCallBudgetExhausted,
    DeadlineExceeded,
    TokenBudgetExhausted,
}

/// Tracks one Subagent's consumption against its `Budget`. This is the
/// "single choke point" the Subagent Runner consults before every tool
/// dispatch (design note in spec.md §9).
pub struct BudgetTracker {
    budget: Budget,
    started_at: Instant,
    tool_calls_made: AtomicU32,
    tokens_used: AtomicUsize,
    sources_contributed: AtomicUsize,
}

impl BudgetTracker {
    pub fn new(budget: Budget) -> Self {
        Self {
            budget,
            started_at: Instant::now(),
            tool_calls_made: AtomicU32::new(0),
            tokens_used: AtomicUsize::new(0),
            sources_contributed: AtomicUsize::new(0),
        }
    }

    pub fn budget(&self) -> Budget {
        self.budget
    }

    /// Consulted before every tool dispatch. Never dispatches on `Allow` by
    /// itself — callers must call `record_tool_call` only after a successful
    /// admission, so the count reflects calls actually made, matching
    /// Invariant 2 in spec.md §8 (`tool_calls_made <= tool_call_budget`).
    pub fn check(&self) -> BudgetDecision {
        if self.started_at.elapsed() >= self.budget.deadline {
            return BudgetDecision::DeadlineExceeded;
        }
        // Soft-enforced below 100% via `should_summarize` (spec.md §4.2); at
        // 100% this is the hard backstop against a runaway loop that keeps
        // burning tokens even after summarization kicks in.
        if self.tokens_used.load(Ordering::SeqCst) >= self.budget.token_budget {
            return BudgetDecision::TokenBudgetExhausted;
        }
        if self.tool_calls_made.load(Ordering::SeqCst) >= self.budget.tool_call_budget {
            return BudgetDecision::ToolCallBudgetExhausted;
        }
        BudgetDecision::Allow
    }

    pub fn record_tool_call(&self) {
        self.tool_calls_made.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_tokens(&self, n: usize) {
        self.tokens_used.fetch_add(n, Ordering::SeqCst);
    }

    pub fn record_source(&self) -> bool {
        let prev = self.sources_contributed.fetch_add(1, Ordering::SeqCst);
        prev < self.budget.source_cap
    }

    /// `true` once 80% of the token budget has been consumed — triggers the
    /// soft summarize-then-continue mode (spec.md §4.2).
    pub fn should_summarize(&self) -> bool {
        let used = self.tokens_used.load(Ordering::SeqCst);
        used * 10 >= self.budget.token_budget * 8
    }

    pub fn tool_calls_made(&self) -> u32 {
        self.tool_calls_made.load(Ordering::SeqCst)
    }

    pub fn tokens_used(&self) -> usize {
        self.tokens_used.load(Ordering::SeqCst)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Bounds the number of Subagents active across the entire run
/// (`concurrency_semaphore` in spec.md §4.2). `max_concurrent = 1` makes
/// Subagents run strictly serially (boundary behavior in spec.md §8).
#[derive(Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyGate {
    pub fn new(max_concurrent: usize) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))) }
    }

    /// Acquires one slot, held until the returned guard is dropped.
    pub async fn acquire(&self) -> tokio::sync::OwnedSemaphorePermit {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("ConcurrencyGate semaphore is never closed")
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
