use tracing::debug;

use crate::graph::{State, END};
use crate::pipeline::{fields, nodes};

/// Outcome of one review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub approved: bool,
    pub messages: Vec<String>,
}

impl Verdict {
    /// Messages joined the way they are stored in the `critique` field.
    pub fn summary(&self) -> String {
        self.messages.join(" | ")
    }
}

/// Deterministic review of the generated content.
#[derive(Debug, Clone)]
pub struct CritiqueAgent {
    min_qa_items: usize,
    required_blocks: Vec<String>,
}

impl CritiqueAgent {
    pub fn new(min_qa_items: usize, required_blocks: Vec<String>) -> Self {
        Self {
            min_qa_items,
            required_blocks,
        }
    }

    pub fn review(&self, state: &State) -> Verdict {
        let qa_count = state
            .get(fields::QA_PAIRS)
            .and_then(|v| v.as_array())
            .map(Vec::len)
            .unwrap_or(0);
        let blocks = state.get(fields::BLOCKS).and_then(|v| v.as_object());

        let mut messages = Vec::new();
        let mut approved = true;

        if qa_count < self.min_qa_items {
            messages.push(format!(
                "Too few QA pairs ({}). Need >= {}.",
                qa_count, self.min_qa_items
            ));
            approved = false;
        }

        for block in &self.required_blocks {
            if !blocks.is_some_and(|b| b.contains_key(block)) {
                messages.push(format!("Missing block: {}", block));
                approved = false;
            }
        }

        messages.push(if approved {
            "Critique: OK".to_string()
        } else {
            "Critique: Needs revision".to_string()
        });

        debug!(approved, qa_count, "Critique reviewed content");
        Verdict { approved, messages }
    }
}

impl Default for CritiqueAgent {
    fn default() -> Self {
        Self::new(
            10,
            vec!["benefits_block".to_string(), "usage_block".to_string()],
        )
    }
}

/// Router for the edge leaving the critique node.
///
/// Approved content proceeds to comparison; rejected content goes back to
/// QA generation, or stops at [`END`] once `revisions` exceeds the cap.
pub fn route_after_critique(max_revisions: Option<usize>) -> impl Fn(&State) -> String + Send + Sync {
    move |state: &State| {
        if state.flag(fields::APPROVED) {
            return nodes::COMPARISON.to_string();
        }
        match max_revisions {
            Some(cap) if state.counter(fields::REVISIONS) > cap as u64 => END.to_string(),
            _ => nodes::QA.to_string(),
        }
    }
}
