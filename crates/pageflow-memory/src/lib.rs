pub mod embeddings;
pub mod index;

use std::time::Duration;

use tracing::info;

use pageflow_core::config::RetrievalConfig;
use pageflow_core::traits::{Capability, Embedder, Retriever};

pub use embeddings::{cosine_similarity, HashingEmbedder, HttpEmbedder};
pub use index::VectorIndex;

/// Decide once whether retrieval is usable and build the retriever.
pub fn create_retriever(config: Option<&RetrievalConfig>) -> Capability<Box<dyn Retriever>> {
    let Some(config) = config else {
        return Capability::unavailable("retrieval not configured");
    };
    if !config.enabled {
        return Capability::unavailable("retrieval disabled in config");
    }

    let embedder: Box<dyn Embedder> = match config.provider.as_str() {
        "local" => Box::new(HashingEmbedder::new(config.dimensions)),
        "http" | "openai" | "ollama" => {
            match HttpEmbedder::new(
                config.base_url.as_deref(),
                config.api_key.as_deref().filter(|k| !k.is_empty() && !k.starts_with("${")),
                &config.model,
                config.dimensions,
                Duration::from_secs(config.timeout_secs),
            ) {
                Ok(embedder) => Box::new(embedder),
                Err(e) => return Capability::unavailable(e.to_string()),
            }
        }
        other => {
            return Capability::unavailable(format!("unknown embedding provider '{}'", other));
        }
    };

    info!(provider = %config.provider, dims = embedder.dimensions(), "Retrieval enabled");
    Capability::Available(Box::new(VectorIndex::new(embedder)) as Box<dyn Retriever>)
}
