//! Dense vector index over an external embedding provider and vector store.

use std::collections::HashMap;
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use hrag_llm::LlmProvider;
use hrag_memory::{FieldValue, Generation, VectorFilter, VectorPoint, VectorStore};

use crate::error::{IndexError, Result};
use crate::types::{IndexedChunk, RankedResult, RetrievalMethod};

pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_PARALLELISM: usize = 5;

pub struct DenseIndex<P: LlmProvider> {
    provider: Arc<P>,
    store: Arc<dyn VectorStore>,
    collection: String,
    batch_size: usize,
    parallelism: usize,
}

impl<P: LlmProvider> std::fmt::Debug for DenseIndex<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseIndex")
            .field("provider", &self.provider.name())
            .field("collection", &self.collection)
            .field("batch_size", &self.batch_size)
            .field("parallelism", &self.parallelism)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider> DenseIndex<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, store: Arc<dyn VectorStore>, collection: impl Into<String>) -> Self {
        Self {
            provider,
            store,
            collection: collection.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    /// Embedding batch size and the number of batches embedded concurrently.
    #[must_use]
    pub fn with_batching(mut self, batch_size: usize, parallelism: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self.parallelism = parallelism.max(1);
        self
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embed and store `chunks` under `generation`.
    ///
    /// Batches are embedded with at most `parallelism` requests in flight and
    /// written to the vector store one at a time, in chunk order.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Embedding`] or [`IndexError::VectorStore`] for the
    /// first failing batch; earlier batches stay written.
    pub async fn index(&self, generation: Generation, chunks: &[IndexedChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let total_batches = chunks.len().div_ceil(self.batch_size);
        let embedded = futures::stream::iter(chunks.chunks(self.batch_size))
            .map(|batch| async move {
                let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
                let vectors = self
                    .provider
                    .embed_batch(&texts)
                    .await
                    .map_err(IndexError::Embedding)?;
                Ok::<_, IndexError>((batch, vectors))
            })
            .buffered(self.parallelism)
            .boxed();
        let mut embedded = std::pin::pin!(embedded);

        let mut collection_ready = false;
        let mut written = 0;
        let mut batch_no = 0;
        while let Some((batch, vectors)) = embedded.try_next().await? {
            batch_no += 1;
            if vectors.len() != batch.len() {
                return Err(IndexError::Other(format!(
                    "embedding provider returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }
            if !collection_ready {
                let dim = vectors.first().map_or(0, Vec::len);
                self.store
                    .ensure_collection(&self.collection, u64::try_from(dim)?)
                    .await?;
                collection_ready = true;
            }

            let points = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| to_point(chunk, vector, generation))
                .collect::<Vec<_>>();
            self.store.upsert(&self.collection, points).await?;
            written += batch.len();
            tracing::debug!(batch = batch_no, total_batches, written, "dense batch stored");
        }

        Ok(written)
    }

    /// Nearest chunks of `generation` to `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Embedding`] if the query cannot be embedded or
    /// [`IndexError::VectorStore`] if the search fails.
    pub async fn search(
        &self,
        query: &str,
        generation: Generation,
        top_k: usize,
    ) -> Result<Vec<RankedResult>> {
        let vector = self
            .provider
            .embed(query)
            .await
            .map_err(IndexError::Embedding)?;
        let filter = VectorFilter::must_match("generation", FieldValue::Integer(generation.0));
        let hits = self
            .store
            .search(&self.collection, vector, u64::try_from(top_k)?, Some(filter))
            .await?;

        Ok(hits
            .into_iter()
            .enumerate()
            .filter_map(|(i, hit)| {
                let chunk = from_payload(hit.id, &hit.payload)?;
                Some(RankedResult {
                    chunk,
                    method: RetrievalMethod::Dense,
                    rank: i + 1,
                    score: Some(hit.score),
                })
            })
            .collect())
    }

    /// Remove points by chunk id.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::VectorStore`] if the delete fails.
    pub async fn delete(&self, ids: Vec<String>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.store.delete_by_ids(&self.collection, ids).await?;
        Ok(())
    }
}

fn to_point(chunk: &IndexedChunk, vector: Vec<f32>, generation: Generation) -> VectorPoint {
    VectorPoint {
        id: chunk.id.clone(),
        vector,
        payload: HashMap::from([
            ("generation".to_owned(), serde_json::json!(generation.0)),
            ("source".to_owned(), serde_json::json!(chunk.source)),
            ("position".to_owned(), serde_json::json!(chunk.position)),
            ("content".to_owned(), serde_json::json!(chunk.content)),
        ]),
    }
}

fn from_payload(id: String, payload: &HashMap<String, serde_json::Value>) -> Option<IndexedChunk> {
    let content = payload.get("content")?.as_str()?.to_owned();
    let source = payload
        .get("source")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_owned();
    let position = payload
        .get("position")
        .and_then(serde_json::Value::as_u64)
        .and_then(|p| usize::try_from(p).ok())
        .unwrap_or_default();
    Some(IndexedChunk {
        id,
        source,
        position,
        content,
    })
}
