use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::rerank::{RerankHit, Reranker, check_indices};

const PROVIDER: &str = "cohere";

pub const DEFAULT_BASE_URL: &str = "https://api.cohere.com/v1";

#[derive(Clone)]
pub struct CohereReranker {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl fmt::Debug for CohereReranker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CohereReranker")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl CohereReranker {
    #[must_use]
    pub fn new(api_key: String, mut base_url: String, model: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(std::time::Duration::from_secs(30)),
            api_key,
            base_url,
            model,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
    return_documents: bool,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankHit>,
}

impl Reranker for CohereReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, LlmError> {
        if documents.is_empty() || top_n == 0 {
            return Ok(Vec::new());
        }

        let body = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_n: top_n.min(documents.len()),
            return_documents: false,
        };

        let response = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited { provider: PROVIDER });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!("Cohere rerank error {status}: {text}");
            return Err(LlmError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }

        let resp: RerankResponse = response.json().await?;
        check_indices(PROVIDER, &resp.results, documents.len())?;
        tracing::debug!(
            candidates = documents.len(),
            returned = resp.results.len(),
            "cohere rerank complete"
        );
        Ok(resp.results)
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}
