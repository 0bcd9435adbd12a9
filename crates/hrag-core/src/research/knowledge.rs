//! Vector collection of fetched web pages shared by the research nodes.

use std::collections::HashMap;
use std::sync::Arc;

use hrag_llm::LlmProvider;
use hrag_memory::{VectorPoint, VectorStore};

use super::search::WebPage;
use crate::pipeline::PipelineError;

/// Characters of page content kept per stored document.
pub const STORED_CONTENT_CHARS: usize = 4000;

#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeHit {
    pub title: String,
    pub url: String,
    pub content: String,
    pub score: f32,
}

pub struct KnowledgeStore<P: LlmProvider> {
    provider: Arc<P>,
    store: Arc<dyn VectorStore>,
    collection: String,
}

impl<P: LlmProvider> KnowledgeStore<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, store: Arc<dyn VectorStore>, collection: impl Into<String>) -> Self {
        Self {
            provider,
            store,
            collection: collection.into(),
        }
    }

    /// Embed and store `pages`. Returns the number stored.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Embedding`] or [`PipelineError::VectorStore`].
    pub async fn store(&self, pages: &[WebPage]) -> Result<usize, PipelineError> {
        if pages.is_empty() {
            return Ok(0);
        }
        let texts: Vec<String> = pages
            .iter()
            .map(|p| p.content.chars().take(STORED_CONTENT_CHARS).collect())
            .collect();
        let vectors = self
            .provider
            .embed_batch(&texts)
            .await
            .map_err(PipelineError::Embedding)?;
        let dim = vectors.first().map_or(0, Vec::len);
        let dim = u64::try_from(dim).map_err(|e| PipelineError::Custom(e.to_string()))?;
        self.store.ensure_collection(&self.collection, dim).await?;

        let points: Vec<VectorPoint> = pages
            .iter()
            .zip(texts)
            .zip(vectors)
            .map(|((page, content), vector)| VectorPoint {
                id: uuid::Uuid::new_v4().to_string(),
                vector,
                payload: HashMap::from([
                    ("content".to_owned(), serde_json::json!(content)),
                    ("url".to_owned(), serde_json::json!(page.url)),
                    ("title".to_owned(), serde_json::json!(page.title)),
                ]),
            })
            .collect();
        let stored = points.len();
        self.store.upsert(&self.collection, points).await?;
        tracing::debug!(collection = %self.collection, stored, "research pages stored");
        Ok(stored)
    }

    /// Closest stored pages to `query`; empty before anything was stored.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Embedding`] or [`PipelineError::VectorStore`].
    pub async fn related(&self, query: &str, limit: usize) -> Result<Vec<KnowledgeHit>, PipelineError> {
        if !self.store.collection_exists(&self.collection).await? {
            return Ok(Vec::new());
        }
        let vector = self
            .provider
            .embed(query)
            .await
            .map_err(PipelineError::Embedding)?;
        let limit = u64::try_from(limit).map_err(|e| PipelineError::Custom(e.to_string()))?;
        let hits = self
            .store
            .search(&self.collection, vector, limit, None)
            .await?;
        let text = |payload: &HashMap<String, serde_json::Value>, key: &str| {
            payload
                .get(key)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_owned()
        };
        Ok(hits
            .into_iter()
            .map(|hit| KnowledgeHit {
                title: text(&hit.payload, "title"),
                url: text(&hit.payload, "url"),
                content: text(&hit.payload, "content"),
                score: hit.score,
            })
            .collect())
    }
}
