pub mod builder;
pub mod step;

pub use builder::Pipeline;
pub use step::Step;

use hrag_index::IndexError;
use hrag_llm::LlmError;
use hrag_memory::{MemoryError, VectorStoreError};

use crate::research::search::SearchError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("chat model error: {0}")]
    Chat(#[source] LlmError),

    #[error("embedding provider error: {0}")]
    Embedding(#[source] LlmError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("web search error: {0}")]
    Search(#[from] SearchError),

    #[error("database error: {0}")]
    Memory(#[from] MemoryError),

    #[error("{0}")]
    Custom(String),
}

impl PipelineError {
    /// External dependency responsible for this error, if any.
    #[must_use]
    pub fn dependency(&self) -> Option<&'static str> {
        match self {
            Self::Index(e) => e.dependency(),
            Self::Chat(_) => Some("llm"),
            Self::Embedding(_) => Some("embedding"),
            Self::VectorStore(_) => Some("vector_store"),
            Self::Search(_) => Some("web_search"),
            Self::Memory(_) => Some("database"),
            Self::Custom(_) => None,
        }
    }
}
