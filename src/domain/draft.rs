//! `Draft`/`CitedOutput` — the Lead's synthesized prose and the
//! Citation Processor's annotated version of it.
//!
//! Anchors are fenced with Unicode Private Use Area sentinels (`U+E000` /
//! `U+E001`) per the "citation identity invariant" design note in
//! spec.md §9: a delimiter that cannot collide with ordinary prose, so the
//! identity check can mechanically strip anchors and diff byte-for-byte
//! against the `Draft`.

use crate::config::CitationStyle;
use serde::{Deserialize, Serialize};

pub const ANCHOR_OPEN: char = '\u{E000}';
pub const ANCHOR_CLOSE: char = '\u{E001}';

/// Synthesized prose produced after the final round, prior to citation
/// insertion. Inline claim markers referencing source URLs (if the Lead's
/// prompt asked for them) are left as-is; this type does not interpret them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub text: String,
}

impl Draft {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// The `Draft` with citation anchors inserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitedOutput {
    pub text: String,
    /// `true` when the identity invariant could not be satisfied twice and
    /// the Processor fell back to the uncited Draft plus a mechanical
    /// References section (spec.md §4.5).
    pub degraded: bool,
}

/// Renders one citation anchor for insertion into candidate prose, fenced
/// with the sentinel pair so it can be losslessly stripped later.
pub fn render_anchor(citation_index: usize, style: CitationStyle) -> String {
    let rendered = match style {
        CitationStyle::Numeric => format!("[{}]", citation_index),
        CitationStyle::Footnote => format!("^{}", citation_index),
    };
    format!("{}{}{}", ANCHOR_OPEN, rendered, ANCHOR_CLOSE)
}

/// Strips every sentinel-fenced anchor span from `text`, returning the
/// underlying prose. This is the mechanical half of the citation identity
/// invariant: `strip_anchors(&cited.text) == draft.text` must hold.
pub fn strip_anchors(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_anchor = false;
    for ch in text.chars() {
        match ch {
            ANCHOR_OPEN => in_anchor = true,
            ANCHOR_CLOSE => in_anchor = false,
            c if !in_anchor => out.push(c),
            _ => {}
        }
    }
    out
}

/// `true` if `candidate` contains only well-formed, non-overlapping anchor
/// spans whose stripped form matches `draft` exactly (the identity
/// invariant in spec.md §4.5 / Invariant 4 in spec.md §8).
pub fn satisfies_identity_invariant(draft: &Draft, candidate: &str) -> bool {
    is_well_formed(candidate) && strip_anchors(candidate) == draft.text
}

fn is_well_formed(text: &str) -> bool {
    let mut depth = 0;
    for ch in text.chars() {
        match ch {
            ANCHOR_OPEN => {
                if depth != 0 {
                    return false;
                }
                depth += 1;
            }
            ANCHOR_CLOSE => {
                if depth != 1 {
                    return false;
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_anchors_restores_original_prose() {
        let draft = Draft::new("Paris is the capital of France.");
        let anchor = render_anchor(1, CitationStyle::Numeric);
        let cited = format!("Paris is the capital of France{}.", anchor);
        assert!(satisfies_identity_invariant(&draft, &cited));
    }

    #[test]
    fn malformed_anchor_fails_invariant() {
        let draft = Draft::new("Hello world.");
        let broken = format!("Hello{} world.", ANCHOR_OPEN);
        assert!(!satisfies_identity_invariant(&draft, &broken));
    }

    #[test]
    fn altered_prose_fails_invariant() {
        let draft = Draft::new("Hello world.");
        let altered = format!("Hello, world{}{}{}.", ANCHOR_OPEN, "[1]", ANCHOR_CLOSE);
        assert!(!satisfies_identity_invariant(&draft, &altered));
    }
}
