mod env;
mod types;


pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be greater than 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }
        if self.ingest.batch_size == 0 {
            bail!("ingest.batch_size must be greater than 0");
        }
        if self.ingest.parallelism == 0 {
            bail!("ingest.parallelism must be greater than 0");
        }
        if self.retrieval.dense_top_k == 0 || self.retrieval.sparse_top_k == 0 {
            bail!("retrieval top-k values must be greater than 0");
        }
        if self.rerank.top_n == 0 {
            bail!("rerank.top_n must be greater than 0");
        }
        if self.research.search_result_limit == 0 {
            bail!("research.search_result_limit must be greater than 0");
        }
        if !(self.retrieval.rrf_k.is_finite() && self.retrieval.rrf_k >= 0.0) {
            bail!("retrieval.rrf_k must be a non-negative number");
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if no `OpenAI` key was found in the environment.
    pub fn openai_api_key(&self) -> anyhow::Result<&Secret> {
        self.secrets
            .openai_api_key
            .as_ref()
            .context("HRAG_OPENAI_API_KEY (or OPENAI_API_KEY) is not set")
    }

    /// # Errors
    ///
    /// Returns an error if no Cohere key was found in the environment.
    pub fn cohere_api_key(&self) -> anyhow::Result<&Secret> {
        self.secrets
            .cohere_api_key
            .as_ref()
            .context("HRAG_COHERE_API_KEY (or COHERE_API_KEY) is not set")
    }
}
