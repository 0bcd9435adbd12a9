//! Hybrid retrieval: dense vector search and BM25 keyword search over the same
//! chunk set, merged with reciprocal rank fusion and reranked by an external
//! cross-encoder.

pub mod dense;
pub mod error;
pub mod fusion;
pub mod index;
pub mod rerank;
pub mod retriever;
pub mod sparse;
pub mod types;

pub use dense::DenseIndex;
pub use error::IndexError;
pub use fusion::{DEFAULT_RRF_K, reciprocal_rank_fusion};
pub use index::{HybridIndex, IndexSnapshot, IndexStats, IngestStats, ReingestMode};
pub use rerank::RerankStage;
pub use retriever::{HybridRetriever, Retrieval, RetrievalConfig};
pub use sparse::Bm25Index;
pub use types::{FusedResult, IndexedChunk, RankedResult, RerankedResult, RetrievalMethod};
