//! Document ingestion, vector storage, and `SQLite` persistence for hrag.

pub mod document;
pub mod error;
pub mod in_memory_store;
pub mod qdrant_ops;
pub mod sqlite;
pub mod types;
pub mod vector_store;

pub use error::MemoryError;
pub use in_memory_store::InMemoryVectorStore;
pub use qdrant_ops::QdrantOps;
pub use sqlite::SqliteStore;
pub use types::{ChunkRecord, Generation, ReportId};
pub use vector_store::{
    FieldCondition, FieldValue, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore,
    VectorStoreError,
};
