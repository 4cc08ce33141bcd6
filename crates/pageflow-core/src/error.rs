use thiserror::Error;

#[derive(Debug, Error)]
pub enum PageflowError {
    // Graph errors
    #[error("Graph configuration error: {0}")]
    Configuration(String),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Graph exceeded {limit} steps (last node: {node}); possible unbounded loop")]
    ExecutionLimitExceeded { limit: usize, node: String },

    #[error("Node {node} wrote undeclared field: {field}")]
    UndeclaredWrite { node: String, field: String },

    #[error("State field {field}: {message}")]
    StateField { field: String, message: String },

    // Input errors
    #[error("Invalid input: {0}")]
    Input(String),

    // Config errors
    #[error("Config error: {0}")]
    ConfigFile(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Collaborator errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PageflowError {
    /// Whether this error comes from the graph engine itself rather than
    /// from a node or a collaborator.
    pub fn is_engine_fault(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::UnknownNode(_)
                | Self::ExecutionLimitExceeded { .. }
                | Self::UndeclaredWrite { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PageflowError>;
