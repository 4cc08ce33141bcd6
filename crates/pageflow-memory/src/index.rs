use tracing::debug;

use pageflow_core::error::{PageflowError, Result};
use pageflow_core::traits::{Embedder, Retriever};

use crate::embeddings::cosine_similarity;

/// Flat in-memory vector index over a small corpus.
///
/// Queries scan every entry; ties keep corpus order.
pub struct VectorIndex {
    embedder: Box<dyn Embedder>,
    entries: Vec<(String, Vec<f32>)>,
}

impl VectorIndex {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Retriever for VectorIndex {
    fn build_index(&mut self, texts: &[String]) -> Result<()> {
        self.entries.clear();
        if texts.is_empty() {
            return Ok(());
        }

        let vectors = self.embedder.embed(texts)?;
        if vectors.len() != texts.len() {
            return Err(PageflowError::Retrieval(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        self.entries = texts.iter().cloned().zip(vectors).collect();
        debug!(documents = self.entries.len(), dims = self.embedder.dimensions(), "Built vector index");
        Ok(())
    }

    fn query(&self, text: &str, top_k: usize) -> Result<Vec<String>> {
        if self.entries.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }

        let query = self
            .embedder
            .embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| PageflowError::Retrieval("empty query embedding".to_string()))?;

        let mut scored: Vec<(f32, &str)> = self
            .entries
            .iter()
            .map(|(doc, vector)| (cosine_similarity(&query, vector), doc.as_str()))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(_, doc)| doc.to_string())
            .collect())
    }
}
