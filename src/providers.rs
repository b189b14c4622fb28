//! The `SearchProvider` and `FetchProvider` interfaces the core consumes.
//!
//! Both are out-of-scope collaborators per the specification: the core only
//! depends on these traits, never on a concrete search/HTML-parsing stack
//! (fetch extraction in particular is explicitly a Non-goal — the core
//! receives already-extracted text).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt;

/// One ranked search hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

/// Failure modes a `SearchProvider` may surface, per spec.md §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFailure {
    RateLimited,
    Unavailable,
    Empty,
}

impl fmt::Display for SearchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchFailure::RateLimited => write!(f, "rate_limited"),
            SearchFailure::Unavailable => write!(f, "unavailable"),
            SearchFailure::Empty => write!(f, "empty"),
        }
    }
}
impl Error for SearchFailure {}

/// External web search collaborator.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchFailure>;
}

/// An extracted page returned by a `FetchProvider`.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub title: String,
    pub text: String,
    pub fetched_at: DateTime<Utc>,
}

/// Failure kinds a `FetchProvider` may surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    RateLimited,
    Unavailable,
    NotFound,
    PermanentError(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::RateLimited => write!(f, "rate_limited"),
            FetchFailure::Unavailable => write!(f, "unavailable"),
            FetchFailure::NotFound => write!(f, "not_found"),
            FetchFailure::PermanentError(msg) => write!(f, "permanent_error: {}", msg),
        }
    }
}
impl Error for FetchFailure {}

/// External page-fetch collaborator. The core never parses HTML itself;
/// implementations are responsible for returning already-extracted text.
#[async_trait]
pub trait FetchProvider: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchFailure>;
}
