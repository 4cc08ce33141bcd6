use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use pageflow_core::error::{PageflowError, Result};
use pageflow_core::traits::Retriever;
use pageflow_core::types::QaItem;

use crate::content::{block_text, Blocks};

/// What the index node recorded about its probe query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalReport {
    pub documents: usize,
    pub query: String,
    pub matches: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Indexes the generated content and runs a probe query against it.
pub struct RetrievalAgent {
    retriever: Mutex<Box<dyn Retriever>>,
    probe_query: String,
    top_k: usize,
}

impl RetrievalAgent {
    pub fn new(retriever: Box<dyn Retriever>, probe_query: impl Into<String>, top_k: usize) -> Self {
        Self {
            retriever: Mutex::new(retriever),
            probe_query: probe_query.into(),
            top_k,
        }
    }

    /// Build the index and probe it. Failures are folded into the report.
    pub fn index_and_probe(&self, qa_items: &[QaItem], blocks: &Blocks) -> RetrievalReport {
        let corpus = corpus(qa_items, blocks);
        match self.try_index(&corpus) {
            Ok(matches) => {
                debug!(documents = corpus.len(), matches = matches.len(), "Retrieval probe complete");
                RetrievalReport {
                    documents: corpus.len(),
                    query: self.probe_query.clone(),
                    matches,
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Retrieval failed, continuing without index");
                RetrievalReport {
                    documents: 0,
                    query: self.probe_query.clone(),
                    matches: vec![],
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn try_index(&self, corpus: &[String]) -> Result<Vec<String>> {
        let mut retriever = self
            .retriever
            .lock()
            .map_err(|_| PageflowError::Retrieval("retriever lock poisoned".to_string()))?;
        retriever.build_index(corpus)?;
        retriever.query(&self.probe_query, self.top_k)
    }
}

/// Texts indexed for one run: each QA pair as "question answer", then each
/// non-empty block flattened to text.
pub fn corpus(qa_items: &[QaItem], blocks: &Blocks) -> Vec<String> {
    qa_items
        .iter()
        .map(QaItem::corpus_text)
        .chain(blocks.values().map(block_text).filter(|t| !t.is_empty()))
        .collect()
}
