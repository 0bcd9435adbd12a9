//! Provider clients for the external model services: chat completion,
//! embeddings, and cross-encoder reranking.

pub mod any;
pub mod cohere;
pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;
pub mod rerank;

pub use any::{AnyProvider, AnyReranker};
pub use error::LlmError;
pub use provider::LlmProvider;
pub use rerank::{RerankHit, Reranker};
