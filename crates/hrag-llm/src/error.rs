#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rate limited by {provider}")]
    RateLimited { provider: &'static str },

    #[error("{provider} API request failed (status {status})")]
    Api { provider: &'static str, status: u16 },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: &'static str },

    #[error("{provider} returned {got} embeddings for {expected} inputs")]
    EmbeddingCount {
        provider: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{provider} returned out-of-range document index {index}")]
    RerankIndex { provider: &'static str, index: usize },

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Name of the remote service that produced this error, when known.
    #[must_use]
    pub fn provider(&self) -> Option<&'static str> {
        match self {
            Self::RateLimited { provider }
            | Self::Api { provider, .. }
            | Self::EmptyResponse { provider }
            | Self::EmbedUnsupported { provider }
            | Self::EmbeddingCount { provider, .. }
            | Self::RerankIndex { provider, .. } => Some(provider),
            Self::Http(_) | Self::Json(_) | Self::Other(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_is_reported_for_api_errors() {
        let err = LlmError::Api {
            provider: "cohere",
            status: 503,
        };
        assert_eq!(err.provider(), Some("cohere"));
        assert_eq!(err.to_string(), "cohere API request failed (status 503)");
    }

    #[test]
    fn provider_unknown_for_transport_errors() {
        assert!(LlmError::Other("boom".into()).provider().is_none());
    }
}
