use crate::cohere::CohereReranker;
#[cfg(feature = "mock")]
use crate::mock::{MockProvider, MockReranker};
use crate::openai::OpenAiProvider;
use crate::provider::{LlmProvider, Message};
use crate::rerank::{RerankHit, Reranker};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given expression for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::OpenAi($p) => $expr,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

macro_rules! delegate_reranker {
    ($self:expr, |$r:ident| $expr:expr) => {
        match $self {
            AnyReranker::Cohere($r) => $expr,
            #[cfg(feature = "mock")]
            AnyReranker::Mock($r) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyProvider {
    OpenAi(OpenAiProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl LlmProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, crate::LlmError> {
        delegate_provider!(self, |p| p.chat(messages).await)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, crate::LlmError> {
        delegate_provider!(self, |p| p.embed(text).await)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, crate::LlmError> {
        delegate_provider!(self, |p| p.embed_batch(texts).await)
    }

    fn name(&self) -> &'static str {
        delegate_provider!(self, |p| p.name())
    }
}

#[derive(Debug, Clone)]
pub enum AnyReranker {
    Cohere(CohereReranker),
    #[cfg(feature = "mock")]
    Mock(MockReranker),
}

impl Reranker for AnyReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<RerankHit>, crate::LlmError> {
        delegate_reranker!(self, |r| r.rerank(query, documents, top_n).await)
    }

    fn name(&self) -> &'static str {
        delegate_reranker!(self, |r| r.name())
    }
}
