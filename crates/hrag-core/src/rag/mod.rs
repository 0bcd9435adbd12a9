//! Retrieval-augmented question answering over an ingested document directory.

mod error;
pub mod generator;
pub mod steps;
mod types;

pub use error::RagError;
pub use types::{
    HealthResponse, IngestResponse, QueryRequest, QueryResponse, SOURCE_PREVIEW_CHARS,
    SourceDocument,
};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hrag_index::{HybridIndex, HybridRetriever, RetrievalConfig};
use hrag_llm::{LlmProvider, Reranker};
use hrag_memory::document::{
    Document, SplitterConfig, TextSplitter, load_directory, load_file,
};

use crate::pipeline::Pipeline;
use crate::pipeline::builder::{Chain, Start};
use steps::{GenerateStep, QueryPlan, RerankStep, RetrieveStep};

/// Answer returned while nothing is indexed.
pub const EMPTY_INDEX_ANSWER: &str = "No documents indexed. Please run /ingest first.";

type QueryPipeline<P, R> =
    Pipeline<Chain<Chain<Start<RetrieveStep<P>>, RerankStep<R>>, GenerateStep<P>>>;

#[derive(Debug, Clone)]
pub struct RagSettings {
    pub retrieval: RetrievalConfig,
    pub splitter: SplitterConfig,
    pub data_dir: PathBuf,
    pub max_file_size: u64,
    /// Reranked sources per answer when the request does not say.
    pub default_top_k: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            splitter: SplitterConfig::default(),
            data_dir: PathBuf::from("./data"),
            max_file_size: hrag_memory::document::DEFAULT_MAX_FILE_SIZE,
            default_top_k: 5,
        }
    }
}

pub struct RagPipeline<P: LlmProvider, R: Reranker> {
    index: Arc<HybridIndex<P>>,
    splitter: TextSplitter,
    data_dir: PathBuf,
    max_file_size: u64,
    default_top_k: usize,
    query: QueryPipeline<P, R>,
}

impl<P: LlmProvider, R: Reranker> RagPipeline<P, R> {
    /// `chat` answers questions; embeddings come from the provider inside `index`.
    #[must_use]
    pub fn new(index: Arc<HybridIndex<P>>, reranker: Arc<R>, chat: Arc<P>, settings: RagSettings) -> Self {
        let retriever = Arc::new(HybridRetriever::new(Arc::clone(&index), settings.retrieval));
        let query = Pipeline::start(RetrieveStep::new(retriever))
            .step(RerankStep::new(reranker))
            .step(GenerateStep::new(chat));
        Self {
            index,
            splitter: TextSplitter::new(settings.splitter),
            data_dir: settings.data_dir,
            max_file_size: settings.max_file_size,
            default_top_k: settings.default_top_k,
            query,
        }
    }

    #[must_use]
    pub fn index(&self) -> &Arc<HybridIndex<P>> {
        &self.index
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn is_ingesting(&self) -> bool {
        self.index.is_ingesting()
    }

    #[must_use]
    pub fn health(&self) -> HealthResponse {
        let stats = self.index.stats();
        HealthResponse {
            status: "healthy".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            indexed_documents: stats.documents,
            indexed_chunks: stats.chunks,
            ingesting: self.index.is_ingesting(),
        }
    }

    /// Ingest every supported file in the configured data directory.
    ///
    /// # Errors
    ///
    /// See [`RagPipeline::ingest_documents`].
    pub async fn ingest(&self) -> Result<IngestResponse, RagError> {
        self.ingest_dir(&self.data_dir).await
    }

    /// # Errors
    ///
    /// See [`RagPipeline::ingest_documents`].
    pub async fn ingest_dir(&self, dir: &Path) -> Result<IngestResponse, RagError> {
        if self.index.is_ingesting() {
            return Err(RagError::IngestInProgress);
        }
        let documents = load_directory(dir, self.max_file_size).await?;
        self.ingest_documents(&documents).await
    }

    /// Ingest one file. In replace mode the index then holds only this file.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Document`] if the file has an unsupported extension
    /// or cannot be read, otherwise see [`RagPipeline::ingest_documents`].
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestResponse, RagError> {
        if self.index.is_ingesting() {
            return Err(RagError::IngestInProgress);
        }
        let document = load_file(path, self.max_file_size).await?;
        self.ingest_documents(std::slice::from_ref(&document)).await
    }

    /// Chunk and index `documents` according to the configured re-ingest mode.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IngestInProgress`] if another run is active, or the
    /// embedding, vector store or catalog error that stopped the run.
    pub async fn ingest_documents(&self, documents: &[Document]) -> Result<IngestResponse, RagError> {
        let stats = self.index.ingest(documents, &self.splitter).await?;
        let status = if stats.chunks == 0 { "warning" } else { "success" };
        tracing::info!(
            documents = stats.documents,
            chunks = stats.chunks,
            total_chunks = stats.total_chunks,
            generation = stats.generation,
            "ingestion complete"
        );
        Ok(IngestResponse {
            status: status.into(),
            documents_ingested: stats.documents,
            chunks_created: stats.chunks,
        })
    }

    /// Retrieve, rerank and answer.
    ///
    /// With nothing indexed this returns an explanatory answer and no sources
    /// without calling any external service.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for an empty query or a zero `top_k`,
    /// otherwise the error of the failing dependency.
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse, RagError> {
        let top_k = request.top_k.unwrap_or(self.default_top_k);
        if request.query.trim().is_empty() {
            return Err(RagError::InvalidInput("query must not be empty".into()));
        }
        if top_k == 0 {
            return Err(RagError::InvalidInput("top_k must be at least 1".into()));
        }

        if self.index.snapshot().is_empty() {
            return Ok(QueryResponse {
                query: request.query,
                answer: EMPTY_INDEX_ANSWER.into(),
                sources: Vec::new(),
                retrieval_count: 0,
            });
        }

        let response = self
            .query
            .run(QueryPlan {
                query: request.query,
                top_k,
            })
            .await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use hrag_index::{DenseIndex, ReingestMode};
    use hrag_llm::mock::{MockProvider, MockReranker};
    use hrag_memory::{InMemoryVectorStore, SqliteStore};

    use super::*;

    struct Harness {
        pipeline: RagPipeline<MockProvider, MockReranker>,
        embedder: Arc<MockProvider>,
        chat: Arc<MockProvider>,
        reranker: Arc<MockReranker>,
    }

    async fn harness(chat: MockProvider, reranker: MockReranker) -> Harness {
        harness_with(MockProvider::default(), 32, chat, reranker).await
    }

    async fn harness_with(
        embedder: MockProvider,
        batch_size: usize,
        chat: MockProvider,
        reranker: MockReranker,
    ) -> Harness {
        let embedder = Arc::new(embedder.with_dimensions(1024));
        let store = Arc::new(InMemoryVectorStore::new());
        let catalog = SqliteStore::new(":memory:").await.unwrap();
        let index = HybridIndex::new(
            DenseIndex::new(Arc::clone(&embedder), store, "hybrid_rag").with_batching(batch_size, 1),
            catalog,
        )
        .with_reingest_mode(ReingestMode::Replace);
        let chat = Arc::new(chat);
        let reranker = Arc::new(reranker);
        let pipeline = RagPipeline::new(
            Arc::new(index),
            Arc::clone(&reranker),
            Arc::clone(&chat),
            RagSettings::default(),
        );
        Harness {
            pipeline,
            embedder,
            chat,
            reranker,
        }
    }

    fn corpus() -> Vec<Document> {
        [
            ("refunds.md", "Refunds are issued to the original payment method within ten days."),
            ("payouts.md", "Payouts arrive in your bank account two business days after capture."),
            ("disputes.md", "A dispute occurs when a cardholder questions a payment with their bank."),
        ]
        .into_iter()
        .map(|(name, text)| Document::new(name, "text/markdown", text.into()))
        .collect()
    }

    fn updates() -> Vec<Document> {
        [
            ("webhooks.md", "Webhooks retry failed deliveries for three days."),
            ("payments.md", "Payments settle to the bank account on a rolling schedule."),
            ("fees.md", "Fees are deducted from each payment before settlement."),
        ]
        .into_iter()
        .map(|(name, text)| Document::new(name, "text/markdown", text.into()))
        .collect()
    }

    fn request(query: &str, top_k: Option<usize>) -> QueryRequest {
        QueryRequest {
            query: query.into(),
            top_k,
        }
    }

    #[tokio::test]
    async fn empty_index_answers_without_external_calls() {
        let h = harness(MockProvider::default(), MockReranker::default()).await;
        let response = h.pipeline.query(request("how do refunds work?", None)).await.unwrap();

        assert_eq!(response.retrieval_count, 0);
        assert!(response.sources.is_empty());
        assert_eq!(response.answer, EMPTY_INDEX_ANSWER);
        assert_eq!(h.embedder.embed_calls(), 0);
        assert_eq!(h.chat.chat_calls(), 0);
        assert_eq!(h.reranker.calls(), 0);
    }

    #[tokio::test]
    async fn query_runs_all_stages() {
        let h = harness(
            MockProvider::with_responses(vec!["Refunds take ten days [refunds.md].".into()]),
            MockReranker::default(),
        )
        .await;
        let ingested = h.pipeline.ingest_documents(&corpus()).await.unwrap();
        assert_eq!(ingested.status, "success");
        assert_eq!(ingested.documents_ingested, 3);
        assert_eq!(ingested.chunks_created, 3);

        let response = h
            .pipeline
            .query(request("refunds payment method", Some(2)))
            .await
            .unwrap();
        assert_eq!(response.answer, "Refunds take ten days [refunds.md].");
        assert_eq!(response.retrieval_count, 3);
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].source, "refunds.md");
        assert!((response.sources[0].score - 1.0).abs() < 1e-9);
        assert_eq!(h.reranker.calls(), 1);
        assert_eq!(h.chat.chat_calls(), 1);
    }

    #[tokio::test]
    async fn top_k_defaults_to_configured_value() {
        let h = harness(MockProvider::default(), MockReranker::default()).await;
        h.pipeline.ingest_documents(&corpus()).await.unwrap();
        let response = h.pipeline.query(request("bank", None)).await.unwrap();
        assert_eq!(response.sources.len(), 3);
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected_before_any_call() {
        let h = harness(MockProvider::default(), MockReranker::default()).await;
        h.pipeline.ingest_documents(&corpus()).await.unwrap();
        let embeds = h.embedder.embed_calls();

        let err = h.pipeline.query(request("   ", None)).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
        let err = h.pipeline.query(request("refunds", Some(0))).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
        assert_eq!(h.embedder.embed_calls(), embeds);
    }

    #[tokio::test]
    async fn rerank_failure_is_not_masked() {
        let h = harness(MockProvider::default(), MockReranker::failing()).await;
        h.pipeline.ingest_documents(&corpus()).await.unwrap();
        let err = h.pipeline.query(request("refunds", None)).await.unwrap_err();
        assert!(matches!(err, RagError::Rerank(_)));
        assert_eq!(err.dependency(), Some("rerank"));
        assert_eq!(h.chat.chat_calls(), 0);
    }

    #[tokio::test]
    async fn generation_failure_is_not_masked() {
        let h = harness(MockProvider::failing(), MockReranker::default()).await;
        h.pipeline.ingest_documents(&corpus()).await.unwrap();
        let err = h.pipeline.query(request("refunds", None)).await.unwrap_err();
        assert!(matches!(err, RagError::Generation(_)));
    }

    #[tokio::test]
    async fn ingesting_nothing_is_a_warning() {
        let h = harness(MockProvider::default(), MockReranker::default()).await;
        let dir = tempfile::tempdir().unwrap();
        let response = h.pipeline.ingest_dir(dir.path()).await.unwrap();
        assert_eq!(response.status, "warning");
        assert_eq!(response.documents_ingested, 0);
        assert_eq!(response.chunks_created, 0);
    }

    #[tokio::test]
    async fn ingest_reads_the_data_directory() {
        let h = harness(MockProvider::default(), MockReranker::default()).await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "Webhooks deliver events.").unwrap();
        std::fs::write(dir.path().join("slides.pptx"), "binary").unwrap();

        let response = h.pipeline.ingest_dir(dir.path()).await.unwrap();
        assert_eq!(response.documents_ingested, 1);
        let health = h.pipeline.health();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.indexed_chunks, 1);
        assert!(!health.ingesting);
    }

    #[tokio::test]
    async fn ingest_single_file() {
        let h = harness(MockProvider::default(), MockReranker::default()).await;
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.md");
        std::fs::write(&notes, "Webhooks deliver events.").unwrap();
        let slides = dir.path().join("slides.pptx");
        std::fs::write(&slides, "binary").unwrap();

        let response = h.pipeline.ingest_file(&notes).await.unwrap();
        assert_eq!(response.documents_ingested, 1);
        assert_eq!(h.pipeline.health().indexed_chunks, 1);

        let err = h.pipeline.ingest_file(&slides).await.unwrap_err();
        assert!(matches!(err, RagError::Document(_)));
        assert!(err.dependency().is_none());
        assert_eq!(h.pipeline.health().indexed_chunks, 1);
    }

    #[tokio::test]
    async fn queries_read_committed_snapshot_while_ingesting() {
        let h = Arc::new(
            harness_with(
                MockProvider::default().with_delay(150),
                1,
                MockProvider::default(),
                MockReranker::default(),
            )
            .await,
        );
        h.pipeline.ingest_documents(&corpus()).await.unwrap();
        let committed = h.pipeline.index().stats();
        let first: Vec<String> = corpus().into_iter().map(|d| d.metadata.source).collect();
        let second: Vec<String> = updates().into_iter().map(|d| d.metadata.source).collect();

        let background = Arc::clone(&h);
        let handle =
            tokio::spawn(async move { background.pipeline.ingest_documents(&updates()).await });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(h.pipeline.is_ingesting());

        let response = h.pipeline.query(request("bank payment", None)).await.unwrap();
        assert!(h.pipeline.is_ingesting());
        assert_eq!(response.retrieval_count, 3);
        assert!(response.sources.iter().all(|s| first.contains(&s.source)));
        assert_eq!(h.pipeline.index().stats(), committed);

        handle.await.unwrap().unwrap();
        assert!(!h.pipeline.is_ingesting());
        let swapped = h.pipeline.index().stats();
        assert!(swapped.generation > committed.generation);

        let response = h.pipeline.query(request("bank payment", None)).await.unwrap();
        assert!(!response.sources.is_empty());
        assert!(response.sources.iter().all(|s| second.contains(&s.source)));
    }
}
