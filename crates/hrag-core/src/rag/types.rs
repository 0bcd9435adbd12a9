use hrag_index::RerankedResult;
use serde::{Deserialize, Serialize};

/// Characters of chunk content echoed back per source.
pub const SOURCE_PREVIEW_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SourceDocument {
    pub content: String,
    pub source: String,
    pub score: f64,
}

impl From<&RerankedResult> for SourceDocument {
    fn from(result: &RerankedResult) -> Self {
        Self {
            content: result
                .chunk
                .content
                .chars()
                .take(SOURCE_PREVIEW_CHARS)
                .collect(),
            source: result.chunk.source.clone(),
            score: round4(f64::from(result.relevance_score)),
        }
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub answer: String,
    pub sources: Vec<SourceDocument>,
    /// Fused candidates before reranking.
    pub retrieval_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IngestResponse {
    pub status: String,
    pub documents_ingested: usize,
    pub chunks_created: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub indexed_documents: usize,
    pub indexed_chunks: usize,
    pub ingesting: bool,
}
