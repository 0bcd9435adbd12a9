use hrag_index::IndexError;
use hrag_llm::LlmError;
use hrag_memory::document::DocumentError;
use hrag_memory::{MemoryError, VectorStoreError};

use crate::pipeline::PipelineError;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("an ingestion run is already in progress")]
    IngestInProgress,

    #[error("embedding provider error: {0}")]
    Embedding(#[source] LlmError),

    #[error("vector store error: {0}")]
    VectorStore(#[source] VectorStoreError),

    #[error("rerank provider error: {0}")]
    Rerank(#[source] LlmError),

    #[error("generation error: {0}")]
    Generation(#[source] LlmError),

    #[error("chunk catalog error: {0}")]
    Catalog(#[source] MemoryError),

    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("{0}")]
    Internal(String),
}

impl RagError {
    /// External dependency responsible for this error, if any.
    #[must_use]
    pub fn dependency(&self) -> Option<&'static str> {
        match self {
            Self::Embedding(_) => Some("embedding"),
            Self::VectorStore(_) => Some("vector_store"),
            Self::Rerank(_) => Some("rerank"),
            Self::Generation(_) => Some("llm"),
            Self::Catalog(_) => Some("catalog"),
            Self::InvalidInput(_) | Self::IngestInProgress | Self::Document(_) | Self::Internal(_) => {
                None
            }
        }
    }
}

impl From<IndexError> for RagError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::Embedding(e) => Self::Embedding(e),
            IndexError::VectorStore(e) => Self::VectorStore(e),
            IndexError::Catalog(e) => Self::Catalog(e),
            IndexError::Rerank(e) => Self::Rerank(e),
            IndexError::Document(e) => Self::Document(e),
            IndexError::IngestInProgress => Self::IngestInProgress,
            IndexError::IntConversion(e) => Self::Internal(e.to_string()),
            IndexError::Other(msg) => Self::Internal(msg),
        }
    }
}

impl From<PipelineError> for RagError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Index(e) => e.into(),
            PipelineError::Chat(e) => Self::Generation(e),
            PipelineError::Embedding(e) => Self::Embedding(e),
            PipelineError::VectorStore(e) => Self::VectorStore(e),
            PipelineError::Memory(e) => Self::Catalog(e),
            PipelineError::Search(e) => Self::Internal(e.to_string()),
            PipelineError::Custom(msg) => Self::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_errors_name_their_dependency() {
        let err = RagError::from(IndexError::Embedding(LlmError::RateLimited {
            provider: "openai",
        }));
        assert_eq!(err.dependency(), Some("embedding"));

        let err = RagError::from(IndexError::VectorStore(VectorStoreError::Connection(
            "refused".into(),
        )));
        assert_eq!(err.dependency(), Some("vector_store"));
    }

    #[test]
    fn pipeline_chat_error_is_generation() {
        let err = RagError::from(PipelineError::Chat(LlmError::Api {
            provider: "openai",
            status: 500,
        }));
        assert!(matches!(err, RagError::Generation(_)));
        assert_eq!(err.dependency(), Some("llm"));
    }

    #[test]
    fn input_errors_have_no_dependency() {
        assert!(RagError::InvalidInput("empty".into()).dependency().is_none());
        assert!(RagError::from(IndexError::IngestInProgress).dependency().is_none());
    }
}
