//! Test-only deterministic providers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};
use crate::rerank::{RerankHit, Reranker};

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
}

fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

/// Hashed bag-of-words vector, L2-normalized. Texts sharing words land close
/// together under cosine similarity.
#[must_use]
pub fn bag_of_words_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let dimensions = dimensions.max(1);
    let mut vector = vec![0.0_f32; dimensions];
    for token in tokens(text) {
        #[allow(clippy::cast_possible_truncation)]
        let bucket = (fnv1a(&token) % dimensions as u64) as usize;
        vector[bucket] += 1.0;
    }
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        vector[0] = 1.0;
    } else {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<Vec<Vec<Message>>>>,
    chat_calls: Arc<AtomicUsize>,
    embed_calls: Arc<AtomicUsize>,
    pub default_response: String,
    pub dimensions: usize,
    pub fail_chat: bool,
    pub fail_embed: bool,
    /// Milliseconds to sleep before answering a chat or embedding request.
    pub delay_ms: u64,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            chat_calls: Arc::new(AtomicUsize::new(0)),
            embed_calls: Arc::new(AtomicUsize::new(0)),
            default_response: "mock response".into(),
            dimensions: 64,
            fail_chat: false,
            fail_embed: false,
            delay_ms: 0,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_embeddings() -> Self {
        Self {
            fail_embed: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    #[must_use]
    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    /// Number of embedding round-trips, counting a batch as one.
    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    /// Messages of every chat call so far, oldest first.
    #[must_use]
    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn pause(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(messages.to_vec());
        if self.fail_chat {
            return Err(LlmError::Api {
                provider: "mock",
                status: 500,
            });
        }
        let mut responses = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_embed {
            return Err(LlmError::Api {
                provider: "mock",
                status: 500,
            });
        }
        Ok(bag_of_words_embedding(text, self.dimensions))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_embed {
            return Err(LlmError::Api {
                provider: "mock",
                status: 500,
            });
        }
        Ok(texts
            .iter()
            .map(|t| bag_of_words_embedding(t, self.dimensions))
            .collect())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Scores each document by the fraction of query words it contains.
#[derive(Debug, Clone, Default)]
pub struct MockReranker {
    calls: Arc<AtomicUsize>,
    pub fail: bool,
}

impl MockReranker {
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Reranker for MockReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LlmError::Api {
                provider: "mock",
                status: 503,
            });
        }
        let query_terms: Vec<String> = tokens(query).collect();
        let mut hits: Vec<RerankHit> = documents
            .iter()
            .enumerate()
            .map(|(index, doc)| {
                let doc_terms: Vec<String> = tokens(doc).collect();
                let matched = query_terms.iter().filter(|t| doc_terms.contains(t)).count();
                #[allow(clippy::cast_precision_loss)]
                let relevance_score = if query_terms.is_empty() {
                    0.0
                } else {
                    matched as f32 / query_terms.len() as f32
                };
                RerankHit {
                    index,
                    relevance_score,
                }
            })
            .collect();
        hits.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        hits.truncate(top_n);
        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
