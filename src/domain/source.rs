//! `Source`/`SourceTable` — the run's dedup-keyed, first-seen-ordered map of
//! web resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A unique web resource referenced during the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub first_seen_by_subagent: String,
    pub first_seen_at: DateTime<Utc>,
}

/// The run's append-only, dedup-keyed map of sources, ordered by first-seen
/// order; that order defines citation index `[1..N]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceTable {
    /// Insertion-ordered list of sources; index `i` has citation number `i+1`.
    sources: Vec<Source>,
    /// normalized_url -> index into `sources`.
    index: HashMap<String, usize>,
}

impl SourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `source`, deduplicating by `normalize_url(&source.url)`.
    ///
    /// Returns the 1-based citation index. If the URL was already present,
    /// the existing entry (and its original first-seen index, per the dedup
    /// law in spec.md §8) is left untouched and its index is returned.
    pub fn insert(&mut self, source: Source) -> usize {
        let key = normalize_url(&source.url);
        if let Some(&idx) = self.index.get(&key) {
            return idx + 1;
        }
        let idx = self.sources.len();
        self.index.insert(key, idx);
        self.sources.push(source);
        idx + 1
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(&normalize_url(url))
    }

    /// 1-based citation index for `url`, if present.
    pub fn citation_index(&self, url: &str) -> Option<usize> {
        self.index.get(&normalize_url(url)).map(|i| i + 1)
    }

    pub fn get(&self, url: &str) -> Option<&Source> {
        self.index.get(&normalize_url(url)).map(|&i| &self.sources[i])
    }

    pub fn get_by_index(&self, citation_index: usize) -> Option<&Source> {
        citation_index.checked_sub(1).and_then(|i| self.sources.get(i))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }
}

/// Normalizes a URL for dedup purposes: lowercases the host, strips the
/// fragment, and strips common tracking query keys.
///
/// This is a best-effort string-level normalization rather than a full URL
/// parser, consistent with the core's Non-goal of not embedding an HTML/URL
/// parsing stack beyond what dedup strictly requires.
pub fn normalize_url(url: &str) -> String {
    const TRACKING_KEYS: &[&str] = &[
        "utm_source", "utm_medium", "utm_campaign", "utm_term", "utm_content",
        "gclid", "fbclid", "ref", "mc_cid", "mc_eid",
    ];

    let without_fragment = url.split('#').next().unwrap_or(url);

    let (before_query, query) = match without_fragment.split_once('?') {
        Some((b, q)) => (b, Some(q)),
        None => (without_fragment, None),
    };

    let scheme_and_host_and_path = match before_query.split_once("//") {
        Some((scheme, rest)) => {
            let (host, path) = match rest.split_once('/') {
                Some((h, p)) => (h, p),
                None => (rest, ""),
            };
            let path = path.trim_end_matches('/');
            if path.is_empty() {
                format!("{}//{}", scheme, host.to_lowercase())
            } else {
                format!("{}//{}/{}", scheme, host.to_lowercase(), path)
            }
        }
        None => before_query.to_string(),
    };

    let filtered_query: Vec<&str> = query
        .map(|q| {
            q.split('&')
                .filter(|kv| {
                    let key = kv.split('=').next().unwrap_or(kv);
                    !TRACKING_KEYS.contains(&key)
                })
                .collect()
        })
        .unwrap_or_default();

    if filtered_query.is_empty() {
        scheme_and_host_and_path
    } else {
        format!("{}?{}", scheme_and_host_and_path, filtered_query.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(url: &str) -> Source {
        Source {
            url: url.to_string(),
            title: "t".to_string(),
            snippet: "s".to_string(),
            first_seen_by_subagent: "sub-1".to_string(),
            first_seen_at: Utc::now(),
        }
    }

    #[test]
    fn dedup_keeps_first_seen_index() {
        let mut table = SourceTable::new();
        let i1 = table.insert(src("https://Example.com/a?utm_source=x"));
        let i2 = table.insert(src("https://example.com/a"));
        assert_eq!(i1, i2);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn distinct_urls_get_distinct_increasing_indices() {
        let mut table = SourceTable::new();
        let i1 = table.insert(src("https://a.com/1"));
        let i2 = table.insert(src("https://a.com/2"));
        assert_eq!((i1, i2), (1, 2));
    }

    #[test]
    fn fragment_is_ignored() {
        let mut table = SourceTable::new();
        let i1 = table.insert(src("https://a.com/page#section-2"));
        let i2 = table.insert(src("https://a.com/page"));
        assert_eq!(i1, i2);
    }
}
