use crate::error::Result;
use crate::types::Product;

/// Answer refinement backed by an LLM.
///
/// `Ok(None)` means "keep the original answer". Callers treat `Err` the same
/// way after logging it; a refiner failure never aborts a run.
pub trait Refiner: Send + Sync + 'static {
    fn refine(&self, question: &str, answer: &str, product: &Product) -> Result<Option<String>>;

    /// Provider/model label used in logs.
    fn label(&self) -> String {
        "refiner".to_string()
    }
}

/// Text embedding provider.
pub trait Embedder: Send + Sync + 'static {
    /// Embed a batch of texts into vectors.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    /// Number of dimensions in the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// Semantic search over a small in-memory corpus.
pub trait Retriever: Send + 'static {
    /// Replace the indexed corpus with `texts`.
    fn build_index(&mut self, texts: &[String]) -> Result<()>;
    /// Return up to `top_k` indexed texts, most similar first.
    fn query(&self, text: &str, top_k: usize) -> Result<Vec<String>>;
}

/// An optional collaborator whose availability is decided once, at
/// construction time.
#[derive(Debug)]
pub enum Capability<T> {
    Available(T),
    Unavailable { reason: String },
}

impl<T> Capability<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Self::Available(inner) => Some(inner),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn into_inner(self) -> Option<T> {
        match self {
            Self::Available(inner) => Some(inner),
            Self::Unavailable { .. } => None,
        }
    }

    /// Why the collaborator is missing, if it is.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Available(_) => None,
            Self::Unavailable { reason } => Some(reason),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Capability<U> {
        match self {
            Self::Available(inner) => Capability::Available(f(inner)),
            Self::Unavailable { reason } => Capability::Unavailable { reason },
        }
    }
}
