use std::collections::HashSet;
use std::sync::Arc;

use hrag_llm::Reranker;

use crate::error::{IndexError, Result};
use crate::types::{FusedResult, RerankedResult};

/// Reorders fused candidates with an external cross-encoder.
pub struct RerankStage<R: Reranker> {
    reranker: Arc<R>,
}

impl<R: Reranker> RerankStage<R> {
    #[must_use]
    pub fn new(reranker: Arc<R>) -> Self {
        Self { reranker }
    }

    /// Up to `top_n` candidates ordered by descending relevance.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Rerank`] if the reranker fails or answers with an
    /// index outside `candidates`.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: &[FusedResult],
        top_n: usize,
    ) -> Result<Vec<RerankedResult>> {
        if candidates.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        let documents: Vec<String> = candidates.iter().map(|c| c.chunk.content.clone()).collect();
        let hits = self
            .reranker
            .rerank(query, &documents, top_n)
            .await
            .map_err(IndexError::Rerank)?;
        hrag_llm::rerank::check_indices(self.reranker.name(), &hits, documents.len())
            .map_err(IndexError::Rerank)?;

        let mut seen = HashSet::new();
        let mut reranked: Vec<RerankedResult> = hits
            .into_iter()
            .filter(|hit| seen.insert(hit.index))
            .map(|hit| RerankedResult {
                chunk: candidates[hit.index].chunk.clone(),
                relevance_score: hit.relevance_score,
            })
            .collect();
        reranked.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        reranked.truncate(top_n);

        tracing::debug!(
            reranker = self.reranker.name(),
            candidates = candidates.len(),
            kept = reranked.len(),
            "reranked"
        );
        Ok(reranked)
    }
}
