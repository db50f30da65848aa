//! Error taxonomy for the ingestion and retrieval pipelines.

/// Errors raised by the repochat pipeline stages.
///
/// Each variant maps to one failure class. Stage boundaries turn these
/// into structured outcomes (see [`crate::workflow`]) instead of letting
/// them escape to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RagError {
    /// Malformed repository URL.
    #[error("{0}")]
    Validation(String),

    /// Listing or content retrieval failed at the code host.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Nothing to index after fetching.
    #[error("{0}")]
    EmptyContent(String),

    /// Embedding model call failed.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Vector store unavailable or called with malformed input.
    #[error("vector store error: {0}")]
    Store(String),

    /// Language model call failed.
    #[error("chat completion failed: {0}")]
    Chat(String),

    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RagError {
    /// Stable machine-readable code for this error class.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::Validation(_) => "validation",
            RagError::Fetch(_) => "fetch",
            RagError::EmptyContent(_) => "empty_content",
            RagError::Embedding(_) => "embedding",
            RagError::Store(_) => "store",
            RagError::Chat(_) => "chat",
            RagError::Config(_) => "config",
        }
    }
}

/// Result type alias using [`RagError`].
pub type Result<T> = std::result::Result<T, RagError>;
