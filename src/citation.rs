//! Citation Processor (spec.md §4.5).
//!
//! No single teacher file owns this; grounded on the teacher's general
//! text-scanning idiom (`Agent::parse_tool_call`'s brace-counting scan)
//! applied here to a `{{cite:N}}` marker format: the LLM decides *where* a
//! claim deserves a citation by inserting markers, and this module decides
//! *whether* to trust the result by mechanically stripping the anchors it
//! inserts for valid markers and diffing against the `Draft` byte-for-byte
//! (the identity invariant in spec.md §9).

use crate::config::{CitationStyle, OrchestratorConfig};
use crate::domain::draft::{render_anchor, satisfies_identity_invariant};
use crate::domain::{CitedOutput, Draft, SourceTable};
use crate::event::{EventBus, EventKind};
use crate::model::{ChatMessage, ChatModel, collect_completion};
use log::warn;
use std::sync::Arc;

const MARKER_OPEN: &str = "{{cite:";
const MARKER_CLOSE: &str = "}}";

pub struct CitationProcessor {
    chat_model: Arc<dyn ChatModel>,
    style: CitationStyle,
    events: EventBus,
}

impl CitationProcessor {
    pub fn new(chat_model: Arc<dyn ChatModel>, config: &OrchestratorConfig, events: EventBus) -> Self {
        Self { chat_model, style: config.citation_style, events }
    }

    pub async fn process(&self, draft: &Draft, sources: &SourceTable) -> CitedOutput {
        if sources.is_empty() {
            self.events.publish(None, EventKind::CitationComplete { degraded: false });
            return CitedOutput { text: draft.text.clone(), degraded: false };
        }

        for attempt in 0..2 {
            let prompt = citation_prompt(draft, sources, attempt);
            let messages = vec![ChatMessage::system(citation_system_prompt()), ChatMessage::user(prompt)];
            let completion = match self.chat_model.stream_completion(&messages, &[], 0.0, 8192).await {
                Ok(stream) => collect_completion(stream).await,
                Err(e) => Err(e),
            };
            let reply = match completion {
                Ok((msg, _)) => msg,
                Err(e) => {
                    warn!("citation model call failed (attempt {attempt}): {e}");
                    continue;
                }
            };

            let candidate = rewrite_markers(&reply.content, sources.len(), self.style);
            if satisfies_identity_invariant(draft, &candidate) {
                self.events.publish(None, EventKind::CitationComplete { degraded: false });
                return CitedOutput { text: append_references(&candidate, sources), degraded: false };
            }
            warn!("citation identity invariant failed on attempt {attempt}");
        }

        self.events.publish(None, EventKind::CitationComplete { degraded: true });
        CitedOutput { text: append_references(&draft.text, sources), degraded: true }
    }
}

/// Rewrites `{{cite:N}}` markers into sentinel-fenced anchors. Markers with
/// an out-of-range or unparseable index are dropped rather than preserved,
/// since a dropped marker leaves no trace and so cannot break the identity
/// invariant (the marker never existed in the `Draft` either).
fn rewrite_markers(text: &str, max_index: usize, style: CitationStyle) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(MARKER_OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + MARKER_OPEN.len()..];
        match after_open.find(MARKER_CLOSE) {
            Some(close_rel) => {
                let digits = after_open[..close_rel].trim();
                if let Ok(idx) = digits.parse::<usize>() {
                    if idx >= 1 && idx <= max_index {
                        out.push_str(&render_anchor(idx, style));
                    }
                }
                rest = &after_open[close_rel + MARKER_CLOSE.len()..];
            }
            None => {
                out.push_str(MARKER_OPEN);
                rest = after_open;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Generates the trailing References section mechanically from the
/// `SourceTable` — never LLM-authored (spec.md §4.5).
fn append_references(cited_text: &str, sources: &SourceTable) -> String {
    let mut out = String::from(cited_text);
    out.push_str("\n\nReferences\n");
    for (i, source) in sources.iter().enumerate() {
        out.push_str(&format!("{}. {} — {}\n", i + 1, source.title, source.url));
    }
    out
}

fn citation_system_prompt() -> String {
    "You insert citation markers into research prose. You must reproduce the draft \
     text exactly, character for character, inserting only `{{cite:N}}` markers \
     immediately after substantive factual claims (numbers, named entities, dated \
     events, quoted statements). Do not cite background or transitional prose. Use \
     at most one marker per source per sentence; distinct sources in the same \
     sentence may each get their own marker. Never alter, add, or remove any other \
     character of the draft."
        .to_string()
}

fn citation_prompt(draft: &Draft, sources: &SourceTable, attempt: usize) -> String {
    let catalog = sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("[{}] {} — {}", i + 1, s.title, s.url))
        .collect::<Vec<_>>()
        .join("\n");

    let emphasis = if attempt == 0 {
        ""
    } else {
        "\n\nYour previous attempt altered the draft's prose. This time, copy every \
         character of the draft verbatim and insert only `{{cite:N}}` markers."
    };

    format!(
        "Sources:\n{catalog}\n\nDraft:\n{}{emphasis}",
        draft.text
    )
}
