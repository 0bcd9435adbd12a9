use std::future::Future;

use serde::Deserialize;

use crate::error::LlmError;

/// Relevance judgement for one candidate document, addressed by its position
/// in the request's document list.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct RerankHit {
    pub index: usize,
    pub relevance_score: f32,
}

pub trait Reranker: Send + Sync {
    /// Score `documents` against `query` and return at most `top_n` hits.
    ///
    /// Hits are not required to be sorted; callers order them.
    ///
    /// # Errors
    ///
    /// Returns an error if the rerank service fails or returns an index outside
    /// `documents`.
    fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> impl Future<Output = Result<Vec<RerankHit>, LlmError>> + Send;

    fn name(&self) -> &'static str;
}

/// Reject hits that point outside the submitted document list.
///
/// # Errors
///
/// Returns [`LlmError::RerankIndex`] for the first out-of-range hit.
pub fn check_indices(
    provider: &'static str,
    hits: &[RerankHit],
    documents: usize,
) -> Result<(), LlmError> {
    match hits.iter().find(|h| h.index >= documents) {
        Some(hit) => Err(LlmError::RerankIndex {
            provider,
            index: hit.index,
        }),
        None => Ok(()),
    }
}
