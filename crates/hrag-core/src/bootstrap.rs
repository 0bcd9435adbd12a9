//! Wiring of configured providers, stores and pipelines.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use hrag_index::{DenseIndex, HybridIndex};
use hrag_llm::cohere::CohereReranker;
use hrag_llm::http::default_client;
use hrag_llm::openai::OpenAiProvider;
use hrag_llm::{AnyProvider, AnyReranker};
use hrag_memory::document::SplitterConfig;
use hrag_memory::{QdrantOps, SqliteStore, VectorStore};

use crate::config::Config;
use crate::rag::{RagPipeline, RagSettings};
use crate::research::{DuckDuckGoSearch, KnowledgeStore, ResearchGraph, ResearchSettings};

pub type Rag = RagPipeline<AnyProvider, AnyReranker>;
pub type Research = ResearchGraph<AnyProvider, DuckDuckGoSearch>;

/// Everything the CLI and the gateway serve from.
pub struct AppContext {
    pub config: Config,
    pub rag: Arc<Rag>,
    pub research: Arc<Research>,
    pub store: SqliteStore,
}

#[must_use]
pub fn rag_settings(config: &Config) -> RagSettings {
    RagSettings {
        retrieval: config.retrieval,
        splitter: SplitterConfig {
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
        },
        data_dir: PathBuf::from(&config.ingest.data_dir),
        max_file_size: config.ingest.max_file_size,
        default_top_k: config.rerank.top_n,
    }
}

#[must_use]
pub fn research_settings(config: &Config) -> ResearchSettings {
    ResearchSettings {
        search_result_limit: config.research.search_result_limit,
        cache_ttl: Duration::from_secs(config.research.cache_ttl_secs),
    }
}

fn openai(config: &Config, api_key: &str, timeout_secs: u64) -> OpenAiProvider {
    OpenAiProvider::new(
        api_key.to_owned(),
        config.llm.base_url.clone(),
        config.llm.model.clone(),
        config.llm.max_tokens,
        Some(config.llm.embedding_model.clone()),
    )
    .with_client(default_client(Duration::from_secs(timeout_secs)))
    .with_temperature(config.llm.temperature)
    .with_embedding_dimensions(Some(config.llm.embedding_dimensions))
}

/// Open the `SQLite` store, creating the parent directory when needed.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the database cannot
/// be opened and migrated.
pub async fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    let path = &config.storage.sqlite_path;
    if path != ":memory:"
        && let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    SqliteStore::new(path)
        .await
        .with_context(|| format!("failed to open SQLite store at {path}"))
}

/// Build the RAG pipeline and research graph from `config`.
///
/// Reloads the active index generation from the chunk catalog so queries work
/// right after a restart.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, an API key is missing,
/// or a store cannot be reached.
pub async fn build(config: Config) -> anyhow::Result<AppContext> {
    config.validate()?;
    let openai_key = config.openai_api_key()?.expose().to_owned();
    let cohere_key = config.cohere_api_key()?.expose().to_owned();

    let store = open_store(&config).await?;
    let vectors: Arc<dyn VectorStore> = Arc::new(
        QdrantOps::new(&config.storage.qdrant_url)
            .with_context(|| format!("invalid Qdrant URL {}", config.storage.qdrant_url))?,
    );

    let embedder = Arc::new(AnyProvider::OpenAi(openai(
        &config,
        &openai_key,
        config.timeouts.embedding_seconds,
    )));
    let chat = Arc::new(AnyProvider::OpenAi(openai(
        &config,
        &openai_key,
        config.timeouts.llm_seconds,
    )));
    let reranker = Arc::new(AnyReranker::Cohere(
        CohereReranker::new(
            cohere_key,
            config.rerank.base_url.clone(),
            config.rerank.model.clone(),
        )
        .with_client(default_client(Duration::from_secs(
            config.timeouts.rerank_seconds,
        ))),
    ));

    let dense = DenseIndex::new(
        Arc::clone(&embedder),
        Arc::clone(&vectors),
        config.storage.collection.clone(),
    )
    .with_batching(config.ingest.batch_size, config.ingest.parallelism);
    let index = Arc::new(
        HybridIndex::new(dense, store.clone()).with_reingest_mode(config.ingest.reingest_mode),
    );
    let stats = index
        .load_from_catalog()
        .await
        .context("failed to load chunk catalog")?;
    tracing::info!(
        generation = ?stats.generation,
        documents = stats.documents,
        chunks = stats.chunks,
        "index loaded"
    );

    let rag = Arc::new(RagPipeline::new(
        index,
        reranker,
        Arc::clone(&chat),
        rag_settings(&config),
    ));

    let knowledge = KnowledgeStore::new(
        embedder,
        vectors,
        config.storage.research_collection.clone(),
    );
    let search = DuckDuckGoSearch::new(
        config.research.search_endpoint.clone(),
        Duration::from_secs(config.timeouts.search_seconds),
    );
    let research = Arc::new(ResearchGraph::new(
        chat,
        search,
        knowledge,
        store.clone(),
        &research_settings(&config),
    ));

    Ok(AppContext {
        config,
        rag,
        research,
        store,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rag_settings_follow_config() {
        let mut config = Config::default();
        config.chunking.chunk_size = 300;
        config.rerank.top_n = 7;
        config.ingest.data_dir = "/srv/docs".into();
        let settings = rag_settings(&config);
        assert_eq!(settings.splitter.chunk_size, 300);
        assert_eq!(settings.default_top_k, 7);
        assert_eq!(settings.data_dir, PathBuf::from("/srv/docs"));
    }

    #[test]
    fn research_settings_follow_config() {
        let mut config = Config::default();
        config.research.cache_ttl_secs = 10;
        assert_eq!(research_settings(&config).cache_ttl, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn open_store_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.sqlite_path = dir
            .path()
            .join("nested/hrag.db")
            .to_string_lossy()
            .into_owned();
        open_store(&config).await.unwrap();
        assert!(dir.path().join("nested/hrag.db").exists());
    }

    #[tokio::test]
    async fn build_requires_api_keys() {
        let mut config = Config::default();
        config.storage.sqlite_path = ":memory:".into();
        let err = build(config).await.err().unwrap();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
