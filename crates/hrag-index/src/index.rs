//! Index lifecycle: ingestion into generations and the snapshot queries read.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use hrag_llm::LlmProvider;
use hrag_memory::document::{Chunk, Document, TextSplitter};
use hrag_memory::{ChunkRecord, Generation, SqliteStore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dense::DenseIndex;
use crate::error::{IndexError, Result};
use crate::sparse::Bm25Index;
use crate::types::IndexedChunk;

/// What re-ingesting does with chunks already in the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReingestMode {
    /// Build a new generation and switch to it once fully written.
    #[default]
    Replace,
    /// Derive chunk ids from `(source, position)` so identical content
    /// overwrites itself.
    Dedupe,
    /// Random chunk ids; re-ingesting duplicates chunks.
    Append,
}

impl std::fmt::Display for ReingestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Replace => "replace",
            Self::Dedupe => "dedupe",
            Self::Append => "append",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub generation: Option<i64>,
    pub documents: usize,
    pub chunks: usize,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub generation: i64,
    /// Distinct sources that produced at least one chunk in this run.
    pub documents: usize,
    /// Chunks written by this run.
    pub chunks: usize,
    /// Chunks in the index after the run.
    pub total_chunks: usize,
}

/// Immutable view of one committed generation.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    generation: Option<Generation>,
    sparse: Bm25Index,
    by_id: HashMap<String, usize>,
    documents: usize,
}

impl IndexSnapshot {
    #[must_use]
    pub fn new(generation: Option<Generation>, chunks: Vec<IndexedChunk>) -> Self {
        let by_id = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        let documents = chunks
            .iter()
            .map(|c| c.source.as_str())
            .collect::<HashSet<_>>()
            .len();
        Self {
            generation,
            sparse: Bm25Index::new(chunks),
            by_id,
            documents,
        }
    }

    #[must_use]
    pub fn generation(&self) -> Option<Generation> {
        self.generation
    }

    #[must_use]
    pub fn sparse(&self) -> &Bm25Index {
        &self.sparse
    }

    #[must_use]
    pub fn chunk(&self, id: &str) -> Option<&IndexedChunk> {
        self.by_id.get(id).map(|&i| &self.sparse.chunks()[i])
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sparse.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            generation: self.generation.map(|g| g.0),
            documents: self.documents,
            chunks: self.sparse.len(),
        }
    }
}

/// Dense and sparse indexes over one chunk catalog.
///
/// Queries read an `Arc` snapshot that ingestion replaces only after a run is
/// fully written, so queries never wait on ingestion. Runs are serialized: a
/// second concurrent run fails with [`IndexError::IngestInProgress`].
pub struct HybridIndex<P: LlmProvider> {
    dense: DenseIndex<P>,
    catalog: SqliteStore,
    mode: ReingestMode,
    snapshot: RwLock<Arc<IndexSnapshot>>,
    ingest_lock: tokio::sync::Mutex<()>,
}

impl<P: LlmProvider> HybridIndex<P> {
    #[must_use]
    pub fn new(dense: DenseIndex<P>, catalog: SqliteStore) -> Self {
        Self {
            dense,
            catalog,
            mode: ReingestMode::default(),
            snapshot: RwLock::new(Arc::new(IndexSnapshot::default())),
            ingest_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_reingest_mode(mut self, mode: ReingestMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn dense(&self) -> &DenseIndex<P> {
        &self.dense
    }

    #[must_use]
    pub fn reingest_mode(&self) -> ReingestMode {
        self.mode
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        self.snapshot().stats()
    }

    #[must_use]
    pub fn is_ingesting(&self) -> bool {
        self.ingest_lock.try_lock().is_err()
    }

    fn publish(&self, snapshot: IndexSnapshot) {
        let stats = snapshot.stats();
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
        tracing::info!(
            generation = ?stats.generation,
            documents = stats.documents,
            chunks = stats.chunks,
            "index snapshot published"
        );
    }

    /// Rebuild the in-memory snapshot from the active generation in the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Catalog`] if the catalog cannot be read.
    pub async fn load_from_catalog(&self) -> Result<IndexStats> {
        let Some(generation) = self.catalog.active_generation().await? else {
            tracing::info!("chunk catalog is empty");
            return Ok(IndexStats::default());
        };
        let chunks = self.load_generation(generation).await?;
        let snapshot = IndexSnapshot::new(Some(generation), chunks);
        let stats = snapshot.stats();
        self.publish(snapshot);
        Ok(stats)
    }

    async fn load_generation(&self, generation: Generation) -> Result<Vec<IndexedChunk>> {
        self.catalog
            .load_chunks(generation)
            .await?
            .into_iter()
            .map(|r| IndexedChunk::try_from(r).map_err(IndexError::from))
            .collect()
    }

    /// Split, embed and index `documents` according to the re-ingest mode.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::IngestInProgress`] if another run holds the index,
    /// or the first embedding, vector store or catalog error. A failed run
    /// leaves the previously published snapshot serving queries.
    pub async fn ingest(
        &self,
        documents: &[Document],
        splitter: &TextSplitter,
    ) -> Result<IngestStats> {
        let _guard = self
            .ingest_lock
            .try_lock()
            .map_err(|_| IndexError::IngestInProgress)?;

        let chunks: Vec<IndexedChunk> = documents
            .iter()
            .flat_map(|doc| splitter.split(doc))
            .map(|chunk| self.to_indexed(chunk))
            .collect();
        let run_documents = chunks
            .iter()
            .map(|c| c.source.as_str())
            .collect::<HashSet<_>>()
            .len();
        let run_chunks = chunks.len();
        tracing::info!(
            documents = run_documents,
            chunks = run_chunks,
            mode = %self.mode,
            "ingestion started"
        );

        let generation = match self.mode {
            ReingestMode::Replace => self.ingest_replace(chunks).await?,
            ReingestMode::Dedupe | ReingestMode::Append => self.ingest_in_place(chunks).await?,
        };

        Ok(IngestStats {
            generation: generation.0,
            documents: run_documents,
            chunks: run_chunks,
            total_chunks: self.stats().chunks,
        })
    }

    fn to_indexed(&self, chunk: Chunk) -> IndexedChunk {
        let id = match self.mode {
            ReingestMode::Dedupe => {
                let name = format!("{}\u{0}{}", chunk.source, chunk.position);
                Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
            }
            ReingestMode::Replace | ReingestMode::Append => Uuid::new_v4(),
        };
        IndexedChunk {
            id: id.to_string(),
            source: chunk.source,
            position: chunk.position,
            content: chunk.content,
        }
    }

    async fn write(&self, generation: Generation, chunks: &[IndexedChunk]) -> Result<()> {
        let records = chunks
            .iter()
            .map(ChunkRecord::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        tokio::try_join!(self.dense.index(generation, chunks), async {
            self.catalog
                .upsert_chunks(generation, &records)
                .await
                .map_err(IndexError::from)
        })?;
        Ok(())
    }

    /// Best-effort removal of a generation's vectors and catalog rows.
    async fn discard(&self, generation: Generation, ids: Vec<String>) {
        if let Err(e) = self.dense.delete(ids).await {
            tracing::warn!(%generation, "failed to delete vectors: {e}");
        }
        if let Err(e) = self.catalog.delete_generation(generation).await {
            tracing::warn!(%generation, "failed to delete catalog generation: {e}");
        }
    }

    /// Best-effort removal of chunks written into a live generation.
    async fn discard_chunks(&self, ids: Vec<String>) {
        if let Err(e) = self.catalog.delete_chunks(&ids).await {
            tracing::warn!("failed to delete catalog chunks: {e}");
        }
        if let Err(e) = self.dense.delete(ids).await {
            tracing::warn!("failed to delete vectors: {e}");
        }
    }

    async fn ingest_replace(&self, chunks: Vec<IndexedChunk>) -> Result<Generation> {
        let generation = self.catalog.begin_generation().await?;
        let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();

        let activated = match self.write(generation, &chunks).await {
            Ok(()) => self
                .catalog
                .activate_generation(generation)
                .await
                .map_err(IndexError::from),
            Err(e) => Err(e),
        };
        let previous = match activated {
            Ok(previous) => previous,
            Err(e) => {
                tracing::error!(%generation, "ingestion failed, keeping previous index: {e}");
                self.discard(generation, ids).await;
                return Err(e);
            }
        };

        self.publish(IndexSnapshot::new(Some(generation), chunks));

        if let Some(previous) = previous {
            match self.catalog.chunk_ids(previous).await {
                Ok(old_ids) => self.discard(previous, old_ids).await,
                Err(e) => tracing::warn!(generation = %previous, "failed to list retired chunks: {e}"),
            }
        }
        Ok(generation)
    }

    async fn ingest_in_place(&self, chunks: Vec<IndexedChunk>) -> Result<Generation> {
        let (generation, fresh) = match self.catalog.active_generation().await? {
            Some(g) => (g, false),
            None => (self.catalog.begin_generation().await?, true),
        };

        if let Err(e) = self.write(generation, &chunks).await {
            let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
            if fresh {
                self.discard(generation, ids).await;
            } else if self.mode == ReingestMode::Append {
                self.discard_chunks(ids).await;
            }
            // Dedupe ids overwrite rows of earlier runs, so those are left in place.
            return Err(e);
        }
        if fresh {
            self.catalog.activate_generation(generation).await?;
        }

        let all = self.load_generation(generation).await?;
        self.publish(IndexSnapshot::new(Some(generation), all));
        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use hrag_llm::mock::MockProvider;
    use hrag_memory::InMemoryVectorStore;
    use hrag_memory::document::SplitterConfig;

    use super::*;

    async fn build(
        provider: MockProvider,
        mode: ReingestMode,
    ) -> (Arc<HybridIndex<MockProvider>>, Arc<InMemoryVectorStore>, SqliteStore) {
        let store = Arc::new(InMemoryVectorStore::new());
        let catalog = SqliteStore::new(":memory:").await.unwrap();
        let dense = DenseIndex::new(Arc::new(provider), store.clone(), "hybrid_rag");
        let index = HybridIndex::new(dense, catalog.clone()).with_reingest_mode(mode);
        (Arc::new(index), store, catalog)
    }

    fn docs() -> Vec<Document> {
        vec![
            Document::new("a.txt", "text/plain", "Rust ownership rules.".into()),
            Document::new("b.txt", "text/plain", "Tokio async runtime.".into()),
        ]
    }

    fn splitter() -> TextSplitter {
        TextSplitter::new(SplitterConfig::default())
    }

    #[tokio::test]
    async fn replace_swaps_generation_and_drops_old_vectors() {
        let (index, store, catalog) = build(MockProvider::default(), ReingestMode::Replace).await;

        let first = index.ingest(&docs(), &splitter()).await.unwrap();
        assert_eq!(first.chunks, 2);
        assert_eq!(first.documents, 2);

        let second = index.ingest(&docs()[..1], &splitter()).await.unwrap();
        assert!(second.generation > first.generation);
        assert_eq!(index.stats().chunks, 1);
        assert_eq!(store.len("hybrid_rag"), 1);
        assert_eq!(
            catalog.active_generation().await.unwrap(),
            Some(Generation(second.generation))
        );
        assert!(
            catalog
                .chunk_ids(Generation(first.generation))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn failed_replace_keeps_previous_snapshot() {
        let store = Arc::new(InMemoryVectorStore::new());
        let catalog = SqliteStore::new(":memory:").await.unwrap();
        let good = HybridIndex::new(
            DenseIndex::new(Arc::new(MockProvider::default()), store.clone(), "hybrid_rag"),
            catalog.clone(),
        );
        good.ingest(&docs(), &splitter()).await.unwrap();
        let before = good.stats();

        let failing = HybridIndex::new(
            DenseIndex::new(
                Arc::new(MockProvider::failing_embeddings()),
                store.clone(),
                "hybrid_rag",
            ),
            catalog.clone(),
        );
        failing.load_from_catalog().await.unwrap();
        let err = failing.ingest(&docs(), &splitter()).await.unwrap_err();
        assert!(matches!(err, IndexError::Embedding(_)));
        assert_eq!(failing.stats(), before);
        assert_eq!(
            catalog.active_generation().await.unwrap().map(|g| g.0),
            before.generation
        );
    }

    #[tokio::test]
    async fn dedupe_is_idempotent() {
        let (index, store, _) = build(MockProvider::default(), ReingestMode::Dedupe).await;
        index.ingest(&docs(), &splitter()).await.unwrap();
        let again = index.ingest(&docs(), &splitter()).await.unwrap();
        assert_eq!(again.total_chunks, 2);
        assert_eq!(store.len("hybrid_rag"), 2);
    }

    #[tokio::test]
    async fn append_duplicates_chunks() {
        let (index, store, _) = build(MockProvider::default(), ReingestMode::Append).await;
        let first = index.ingest(&docs(), &splitter()).await.unwrap();
        let second = index.ingest(&docs(), &splitter()).await.unwrap();
        assert_eq!(first.generation, second.generation);
        assert_eq!(second.chunks, 2);
        assert_eq!(second.total_chunks, 4);
        assert_eq!(store.len("hybrid_rag"), 4);
    }

    #[tokio::test]
    async fn catalog_write_overlaps_embedding() {
        let (index, store, catalog) =
            build(MockProvider::default().with_delay(300), ReingestMode::Replace).await;
        let background = Arc::clone(&index);
        let handle = tokio::spawn(async move { background.ingest(&docs(), &splitter()).await });

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(catalog.chunk_ids(Generation(1)).await.unwrap().len(), 2);
        assert_eq!(store.len("hybrid_rag"), 0);
        assert_eq!(catalog.active_generation().await.unwrap(), None);
        assert!(index.snapshot().is_empty());

        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.generation, 1);
        assert_eq!(store.len("hybrid_rag"), 2);
        assert_eq!(index.stats().chunks, 2);
    }

    #[tokio::test]
    async fn failed_append_removes_its_chunks() {
        let store = Arc::new(InMemoryVectorStore::new());
        let catalog = SqliteStore::new(":memory:").await.unwrap();
        let good = HybridIndex::new(
            DenseIndex::new(Arc::new(MockProvider::default()), store.clone(), "hybrid_rag"),
            catalog.clone(),
        )
        .with_reingest_mode(ReingestMode::Append);
        let first = good.ingest(&docs(), &splitter()).await.unwrap();

        let failing = HybridIndex::new(
            DenseIndex::new(
                Arc::new(MockProvider::failing_embeddings()),
                store.clone(),
                "hybrid_rag",
            ),
            catalog.clone(),
        )
        .with_reingest_mode(ReingestMode::Append);
        failing.load_from_catalog().await.unwrap();
        assert!(failing.ingest(&docs(), &splitter()).await.is_err());

        let ids = catalog.chunk_ids(Generation(first.generation)).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(store.len("hybrid_rag"), 2);
        assert_eq!(failing.stats().chunks, 2);
    }

    #[tokio::test]
    async fn concurrent_ingest_is_rejected() {
        let (index, _, _) = build(MockProvider::default().with_delay(200), ReingestMode::Replace).await;
        let background = Arc::clone(&index);
        let handle = tokio::spawn(async move { background.ingest(&docs(), &splitter()).await });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(index.is_ingesting());
        let err = index.ingest(&docs(), &splitter()).await.unwrap_err();
        assert!(matches!(err, IndexError::IngestInProgress));

        handle.await.unwrap().unwrap();
        assert!(!index.is_ingesting());
    }

    #[tokio::test]
    async fn snapshot_is_rebuilt_from_catalog() {
        let (index, store, catalog) = build(MockProvider::default(), ReingestMode::Replace).await;
        index.ingest(&docs(), &splitter()).await.unwrap();

        let restarted = HybridIndex::new(
            DenseIndex::new(Arc::new(MockProvider::default()), store, "hybrid_rag"),
            catalog,
        );
        assert_eq!(restarted.stats().chunks, 0);
        let stats = restarted.load_from_catalog().await.unwrap();
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.documents, 2);
        assert_eq!(restarted.stats(), index.stats());
    }

    #[tokio::test]
    async fn empty_ingest_in_replace_mode_empties_index() {
        let (index, _, _) = build(MockProvider::default(), ReingestMode::Replace).await;
        index.ingest(&docs(), &splitter()).await.unwrap();
        let stats = index.ingest(&[], &splitter()).await.unwrap();
        assert_eq!(stats.chunks, 0);
        assert_eq!(stats.documents, 0);
        assert_eq!(stats.total_chunks, 0);
        assert!(index.snapshot().is_empty());
    }

    #[tokio::test]
    async fn dedupe_ids_derive_from_source_and_position() {
        let (index, _, _) = build(MockProvider::default(), ReingestMode::Dedupe).await;
        let chunk = || Chunk {
            content: "x".into(),
            source: "a.txt".into(),
            position: 4,
        };
        let id = index.to_indexed(chunk()).id;
        assert_eq!(id, index.to_indexed(chunk()).id);
        assert_eq!(
            id,
            Uuid::new_v5(&Uuid::NAMESPACE_URL, b"a.txt\x004").to_string()
        );
    }

    #[test]
    fn reingest_mode_parses_lowercase() {
        let mode: ReingestMode = serde_json::from_str("\"dedupe\"").unwrap();
        assert_eq!(mode, ReingestMode::Dedupe);
        assert_eq!(ReingestMode::default().to_string(), "replace");
    }
}
