use std::sync::Arc;

use hrag_llm::LlmProvider;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::fusion::{DEFAULT_RRF_K, reciprocal_rank_fusion};
use crate::index::{HybridIndex, IndexSnapshot};
use crate::types::{FusedResult, RankedResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub dense_top_k: usize,
    pub sparse_top_k: usize,
    pub rrf_k: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            dense_top_k: 10,
            sparse_top_k: 10,
            rrf_k: DEFAULT_RRF_K,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub fused: Vec<FusedResult>,
    pub dense_hits: usize,
    pub sparse_hits: usize,
}

/// Runs dense and BM25 search side by side and fuses the two lists.
pub struct HybridRetriever<P: LlmProvider> {
    index: Arc<HybridIndex<P>>,
    config: RetrievalConfig,
}

impl<P: LlmProvider> HybridRetriever<P> {
    #[must_use]
    pub fn new(index: Arc<HybridIndex<P>>, config: RetrievalConfig) -> Self {
        Self { index, config }
    }

    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    #[must_use]
    pub fn index(&self) -> &Arc<HybridIndex<P>> {
        &self.index
    }

    /// Fused candidates for `query` from the current snapshot.
    ///
    /// An empty index answers immediately without embedding the query.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Embedding`] or [`IndexError::VectorStore`] if the
    /// dense half fails. Sparse search cannot fail.
    pub async fn retrieve(&self, query: &str) -> Result<Retrieval> {
        let snapshot = self.index.snapshot();
        let Some(generation) = snapshot.generation() else {
            return Ok(Retrieval::default());
        };
        if snapshot.is_empty() {
            return Ok(Retrieval::default());
        }

        let sparse_snapshot = Arc::clone(&snapshot);
        let sparse_query = query.to_owned();
        let sparse_top_k = self.config.sparse_top_k;
        let sparse = tokio::task::spawn_blocking(move || {
            sparse_snapshot.sparse().search(&sparse_query, sparse_top_k)
        });
        let dense = self
            .index
            .dense()
            .search(query, generation, self.config.dense_top_k);

        let (dense, sparse) = tokio::join!(dense, sparse);
        let dense = canonicalize(dense?, &snapshot);
        let sparse = sparse.map_err(|e| IndexError::Other(format!("sparse search task: {e}")))?;

        let fused = reciprocal_rank_fusion(&[&dense, &sparse], self.config.rrf_k);
        tracing::debug!(
            dense = dense.len(),
            sparse = sparse.len(),
            fused = fused.len(),
            "hybrid retrieval"
        );
        Ok(Retrieval {
            fused,
            dense_hits: dense.len(),
            sparse_hits: sparse.len(),
        })
    }
}

/// Replace payload copies with catalog chunks and drop hits the catalog does
/// not know.
fn canonicalize(hits: Vec<RankedResult>, snapshot: &IndexSnapshot) -> Vec<RankedResult> {
    hits.into_iter()
        .filter_map(|hit| {
            let chunk = snapshot.chunk(&hit.chunk.id)?.clone();
            Some(RankedResult { chunk, ..hit })
        })
        .enumerate()
        .map(|(i, hit)| RankedResult { rank: i + 1, ..hit })
        .collect()
}
