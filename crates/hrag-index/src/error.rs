use hrag_llm::LlmError;
use hrag_memory::VectorStoreError;
use hrag_memory::document::DocumentError;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("embedding provider error: {0}")]
    Embedding(#[source] LlmError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("chunk catalog error: {0}")]
    Catalog(#[from] hrag_memory::MemoryError),

    #[error("rerank provider error: {0}")]
    Rerank(#[source] LlmError),

    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("an ingestion run is already in progress")]
    IngestInProgress,

    #[error("integer conversion: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),

    #[error("{0}")]
    Other(String),
}

impl IndexError {
    /// External dependency responsible for this error, if any.
    #[must_use]
    pub fn dependency(&self) -> Option<&'static str> {
        match self {
            Self::Embedding(_) => Some("embedding"),
            Self::VectorStore(_) => Some("vector_store"),
            Self::Catalog(_) => Some("catalog"),
            Self::Rerank(_) => Some("rerank"),
            Self::Document(_) | Self::IngestInProgress | Self::IntConversion(_) | Self::Other(_) => {
                None
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
