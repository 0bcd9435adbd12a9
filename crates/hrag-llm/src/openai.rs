use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message, Role};

const PROVIDER: &str = "openai";

#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
    embedding_model: Option<String>,
    embedding_dimensions: Option<usize>,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimensions", &self.embedding_dimensions)
            .finish()
    }
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(
        api_key: String,
        mut base_url: String,
        model: String,
        max_tokens: u32,
        embedding_model: Option<String>,
    ) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(std::time::Duration::from_secs(60)),
            api_key,
            base_url,
            model,
            max_tokens,
            temperature: None,
            embedding_model,
            embedding_dimensions: None,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Request shortened embeddings (`text-embedding-3-*` models only).
    #[must_use]
    pub fn with_embedding_dimensions(mut self, dimensions: Option<usize>) -> Self {
        self.embedding_dimensions = dimensions;
        self
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{}/{endpoint}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(endpoint, "OpenAI rate limited");
            return Err(LlmError::RateLimited { provider: PROVIDER });
        }

        if !status.is_success() {
            tracing::error!("OpenAI {endpoint} error {status}: {text}");
            return Err(LlmError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
            });
        }

        Ok(text)
    }

    fn embedding_model(&self) -> Result<&str, LlmError> {
        self.embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported { provider: PROVIDER })
    }
}

impl LlmProvider for OpenAiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let api_messages = convert_messages(messages);
        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            max_completion_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let text = self.post_json("chat/completions", &body).await?;
        let resp: OpenAiChatResponse = serde_json::from_str(&text)?;

        if let Some(usage) = resp.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "OpenAI API usage"
            );
        }

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse { provider: PROVIDER })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = self.embedding_model()?;
        let body = EmbeddingRequest {
            input: EmbeddingInput::One(text),
            model,
            dimensions: self.embedding_dimensions,
        };

        let text = self.post_json("embeddings", &body).await?;
        let resp: EmbeddingResponse = serde_json::from_str(&text)?;

        resp.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(LlmError::EmptyResponse { provider: PROVIDER })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let model = self.embedding_model()?;
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = EmbeddingRequest {
            input: EmbeddingInput::Many(texts),
            model,
            dimensions: self.embedding_dimensions,
        };

        let text = self.post_json("embeddings", &body).await?;
        let mut resp: EmbeddingResponse = serde_json::from_str(&text)?;

        if resp.data.len() != texts.len() {
            return Err(LlmError::EmbeddingCount {
                provider: PROVIDER,
                expected: texts.len(),
                got: resp.data.len(),
            });
        }

        resp.data.sort_by_key(|d| d.index);
        Ok(resp.data.into_iter().map(|d| d.embedding).collect())
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Serialize)]
#[serde(untagged)]
enum EmbeddingInput<'a> {
    One(&'a str),
    Many(&'a [String]),
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: EmbeddingInput<'a>,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

fn convert_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
    messages
        .iter()
        .map(|msg| ApiMessage {
            role: match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &msg.content,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_provider(base_url: &str) -> OpenAiProvider {
        OpenAiProvider::new(
            "sk-test-key".into(),
            base_url.into(),
            "gpt-5-mini".into(),
            1024,
            Some("text-embedding-3-small".into()),
        )
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let p = test_provider("https://api.openai.com/v1/");
        assert_eq!(p.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let p = test_provider("https://api.openai.com/v1");
        let debug = format!("{p:?}");
        assert!(!debug.contains("sk-test-key"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("gpt-5-mini"));
    }

    #[test]
    fn chat_request_omits_unset_temperature() {
        let msgs = [Message::user("hi")];
        let api = convert_messages(&msgs);
        let body = ChatRequest {
            model: "gpt-5-mini",
            messages: &api,
            max_completion_tokens: 10,
            temperature: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("temperature").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn convert_messages_maps_roles() {
        let msgs = [
            Message::system("s"),
            Message::user("u"),
            Message {
                role: Role::Assistant,
                content: "a".into(),
            },
        ];
        let api = convert_messages(&msgs);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
        assert_eq!(api[2].role, "assistant");
    }

    #[tokio::test]
    async fn chat_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test-key"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-5-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "hello there"}}],
                "usage": {"prompt_tokens": 5, "completion_tokens": 2}
            })))
            .mount(&server)
            .await;

        let p = test_provider(&server.uri());
        let answer = p.chat(&[Message::user("hi")]).await.unwrap();
        assert_eq!(answer, "hello there");
    }

    #[tokio::test]
    async fn chat_empty_choices_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let p = test_provider(&server.uri());
        let err = p.chat(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse { provider: "openai" }));
    }

    #[tokio::test]
    async fn rate_limit_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let p = test_provider(&server.uri());
        let err = p.chat(&[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn server_error_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let p = test_provider(&server.uri());
        let err = p.embed("x").await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn embed_batch_orders_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({"input": ["a", "b"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let p = test_provider(&server.uri());
        let vectors = p
            .embed_batch(&["a".to_owned(), "b".to_owned()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn embed_sends_requested_dimensions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({"dimensions": 256})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [0.5, 0.5]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let p = test_provider(&server.uri()).with_embedding_dimensions(Some(256));
        assert_eq!(p.embed("x").await.unwrap(), vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn embed_batch_count_mismatch_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"index": 0, "embedding": [1.0]}]
            })))
            .mount(&server)
            .await;

        let p = test_provider(&server.uri());
        let err = p
            .embed_batch(&["a".to_owned(), "b".to_owned()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LlmError::EmbeddingCount {
                expected: 2,
                got: 1,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn embed_batch_empty_input_skips_request() {
        let p = test_provider("http://127.0.0.1:1");
        assert!(p.embed_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn embed_without_model_returns_error() {
        let p = OpenAiProvider::new(
            "k".into(),
            "http://127.0.0.1:1".into(),
            "m".into(),
            10,
            None,
        );
        let err = p.embed("test").await.unwrap_err();
        assert!(err.to_string().contains("embedding not supported"));
    }

    #[tokio::test]
    async fn chat_unreachable_endpoint_errors() {
        let p = test_provider("http://127.0.0.1:1");
        assert!(p.chat(&[Message::user("test")]).await.is_err());
    }
}
