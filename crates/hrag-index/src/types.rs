use serde::Serialize;

/// A chunk as held by the indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedChunk {
    pub id: String,
    pub source: String,
    pub position: usize,
    pub content: String,
}

impl TryFrom<hrag_memory::ChunkRecord> for IndexedChunk {
    type Error = std::num::TryFromIntError;

    fn try_from(record: hrag_memory::ChunkRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            source: record.source,
            position: usize::try_from(record.position)?,
            content: record.content,
        })
    }
}

impl TryFrom<&IndexedChunk> for hrag_memory::ChunkRecord {
    type Error = std::num::TryFromIntError;

    fn try_from(chunk: &IndexedChunk) -> Result<Self, Self::Error> {
        Ok(Self {
            id: chunk.id.clone(),
            source: chunk.source.clone(),
            position: i64::try_from(chunk.position)?,
            content: chunk.content.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMethod {
    Dense,
    Sparse,
}

/// One entry of a single method's rank-ordered result list.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub chunk: IndexedChunk,
    pub method: RetrievalMethod,
    /// 1-indexed position in the method's list.
    pub rank: usize,
    /// Cosine similarity for dense hits, BM25 score for sparse hits.
    pub score: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FusedResult {
    pub chunk: IndexedChunk,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RerankedResult {
    pub chunk: IndexedChunk,
    /// External reranker relevance, in `[0, 1]`.
    pub relevance_score: f32,
}
