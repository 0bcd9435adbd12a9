use super::{Config, Secret};

fn first_var(keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| std::env::var(key).ok())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_core();
        self.apply_env_overrides_service();
        self.resolve_secrets();
    }

    fn apply_env_overrides_core(&mut self) {
        if let Ok(v) = std::env::var("HRAG_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("HRAG_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("HRAG_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("HRAG_LLM_TEMPERATURE")
            && let Ok(t) = v.parse::<f32>()
        {
            self.llm.temperature = Some(t.clamp(0.0, 2.0));
        }
        if let Ok(v) = std::env::var("HRAG_LLM_MAX_TOKENS")
            && let Ok(n) = v.parse::<u32>()
        {
            self.llm.max_tokens = n;
        }
        if let Ok(v) = std::env::var("HRAG_RERANK_MODEL") {
            self.rerank.model = v;
        }
        if let Ok(v) = std::env::var("HRAG_RERANK_TOP_N")
            && let Ok(n) = v.parse::<usize>()
        {
            self.rerank.top_n = n;
        }
        if let Ok(v) = std::env::var("HRAG_DENSE_TOP_K")
            && let Ok(n) = v.parse::<usize>()
        {
            self.retrieval.dense_top_k = n;
        }
        if let Ok(v) = std::env::var("HRAG_SPARSE_TOP_K")
            && let Ok(n) = v.parse::<usize>()
        {
            self.retrieval.sparse_top_k = n;
        }
        if let Ok(v) = std::env::var("HRAG_CHUNK_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.chunking.chunk_size = n;
        }
        if let Ok(v) = std::env::var("HRAG_CHUNK_OVERLAP")
            && let Ok(n) = v.parse::<usize>()
        {
            self.chunking.chunk_overlap = n;
        }
        if let Ok(v) = std::env::var("HRAG_DATA_DIR") {
            self.ingest.data_dir = v;
        }
        if let Ok(v) = std::env::var("HRAG_INGEST_BATCH_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.ingest.batch_size = n;
        }
        if let Ok(v) = std::env::var("HRAG_INGEST_PARALLELISM")
            && let Ok(n) = v.parse::<usize>()
        {
            self.ingest.parallelism = n;
        }
        if let Ok(v) = std::env::var("HRAG_REINGEST_MODE") {
            if let Ok(mode) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.ingest.reingest_mode = mode;
            } else {
                tracing::warn!("ignoring invalid HRAG_REINGEST_MODE value: {v}");
            }
        }
    }

    fn apply_env_overrides_service(&mut self) {
        if let Ok(v) = std::env::var("HRAG_QDRANT_URL") {
            self.storage.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("HRAG_COLLECTION") {
            self.storage.collection = v;
        }
        if let Ok(v) = std::env::var("HRAG_SQLITE_PATH") {
            self.storage.sqlite_path = v;
        }
        if let Ok(v) = std::env::var("HRAG_SEARCH_RESULT_LIMIT")
            && let Ok(n) = v.parse::<usize>()
        {
            self.research.search_result_limit = n;
        }
        if let Ok(v) = std::env::var("HRAG_CACHE_TTL_SECS")
            && let Ok(n) = v.parse::<u64>()
        {
            self.research.cache_ttl_secs = n;
        }
        if let Ok(v) = std::env::var("HRAG_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Ok(v) = std::env::var("HRAG_GATEWAY_PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            self.gateway.port = port;
        }
        if let Ok(v) = std::env::var("HRAG_GATEWAY_TOKEN") {
            self.gateway.auth_token = Some(v).filter(|t| !t.is_empty());
        }
        if let Ok(v) = std::env::var("HRAG_TIMEOUT_LLM")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.llm_seconds = secs;
        }
        if let Ok(v) = std::env::var("HRAG_TIMEOUT_EMBEDDING")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.embedding_seconds = secs;
        }
        if let Ok(v) = std::env::var("HRAG_TIMEOUT_RERANK")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.rerank_seconds = secs;
        }
        if let Ok(v) = std::env::var("HRAG_LOG_LEVEL") {
            self.log_level = v;
        }
    }

    fn resolve_secrets(&mut self) {
        if let Some(key) = first_var(&["HRAG_OPENAI_API_KEY", "OPENAI_API_KEY"]) {
            self.secrets.openai_api_key = Some(Secret::new(key));
        }
        if let Some(key) = first_var(&["HRAG_COHERE_API_KEY", "COHERE_API_KEY"]) {
            self.secrets.cohere_api_key = Some(Secret::new(key));
        }
    }
}
