use std::fmt;

use hrag_index::{ReingestMode, RetrievalConfig};
use serde::{Deserialize, Serialize};

/// Secret value that never prints itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            rerank: RerankConfig::default(),
            retrieval: RetrievalConfig::default(),
            chunking: ChunkingConfig::default(),
            ingest: IngestConfig::default(),
            storage: StorageConfig::default(),
            research: ResearchConfig::default(),
            gateway: GatewayConfig::default(),
            timeouts: TimeoutConfig::default(),
            log_level: default_log_level(),
            secrets: ResolvedSecrets::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_chat_model() -> String {
    "gpt-5-mini".into()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

fn default_embedding_dimensions() -> usize {
    1536
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_chat_model(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            temperature: None,
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RerankConfig {
    #[serde(default = "default_cohere_base_url")]
    pub base_url: String,
    #[serde(default = "default_rerank_model")]
    pub model: String,
    #[serde(default = "default_rerank_top_n")]
    pub top_n: usize,
}

fn default_cohere_base_url() -> String {
    hrag_llm::cohere::DEFAULT_BASE_URL.into()
}

fn default_rerank_model() -> String {
    "rerank-english-v3.0".into()
}

fn default_rerank_top_n() -> usize {
    5
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            base_url: default_cohere_base_url(),
            model: default_rerank_model(),
            top_n: default_rerank_top_n(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    512
}

fn default_chunk_overlap() -> usize {
    50
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    #[serde(default)]
    pub reingest_mode: ReingestMode,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_data_dir() -> String {
    "./data".into()
}

fn default_batch_size() -> usize {
    500
}

fn default_parallelism() -> usize {
    5
}

fn default_max_file_size() -> u64 {
    hrag_memory::document::DEFAULT_MAX_FILE_SIZE
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            batch_size: default_batch_size(),
            parallelism: default_parallelism(),
            reingest_mode: ReingestMode::default(),
            max_file_size: default_max_file_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_research_collection")]
    pub research_collection: String,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_collection() -> String {
    "hybrid_rag".into()
}

fn default_research_collection() -> String {
    "research_documents".into()
}

fn default_sqlite_path() -> String {
    "./.hrag/hrag.db".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            qdrant_url: default_qdrant_url(),
            collection: default_collection(),
            research_collection: default_research_collection(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResearchConfig {
    #[serde(default = "default_search_result_limit")]
    pub search_result_limit: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_search_endpoint")]
    pub search_endpoint: String,
}

fn default_search_result_limit() -> usize {
    5
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_search_endpoint() -> String {
    crate::research::search::DEFAULT_ENDPOINT.into()
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            search_result_limit: default_search_result_limit(),
            cache_ttl_secs: default_cache_ttl_secs(),
            search_endpoint: default_search_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_gateway_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_gateway_max_body")]
    pub max_body_size: usize,
}

fn default_gateway_bind() -> String {
    "0.0.0.0".into()
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_gateway_rate_limit() -> u32 {
    120
}

fn default_gateway_max_body() -> usize {
    1_048_576
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_gateway_bind(),
            port: default_gateway_port(),
            auth_token: None,
            rate_limit: default_gateway_rate_limit(),
            max_body_size: default_gateway_max_body(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_llm_timeout")]
    pub llm_seconds: u64,
    #[serde(default = "default_embedding_timeout")]
    pub embedding_seconds: u64,
    #[serde(default = "default_rerank_timeout")]
    pub rerank_seconds: u64,
    #[serde(default = "default_search_timeout")]
    pub search_seconds: u64,
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_embedding_timeout() -> u64 {
    60
}

fn default_rerank_timeout() -> u64 {
    30
}

fn default_search_timeout() -> u64 {
    15
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_seconds: default_llm_timeout(),
            embedding_seconds: default_embedding_timeout(),
            rerank_seconds: default_rerank_timeout(),
            search_seconds: default_search_timeout(),
        }
    }
}

/// API keys, read from the environment only.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSecrets {
    pub openai_api_key: Option<Secret>,
    pub cohere_api_key: Option<Secret>,
}
