use std::sync::Arc;

use hrag_index::RerankedResult;
use hrag_llm::LlmProvider;
use hrag_llm::provider::Message;

pub const SYSTEM_PROMPT: &str = "\
You are a helpful AI assistant. Answer the user's question based ONLY on the provided context.

Rules:
- Use only information from the context below.
- If the context doesn't contain enough information, say so clearly.
- Be concise and accurate.
- Cite which source document(s) your answer comes from when possible.

Context:
";

/// Answer returned when reranking left nothing to ground an answer on.
pub const NO_CONTEXT_ANSWER: &str = "I don't have enough context to answer this question.";

/// Context blocks as `[Source: name]` headers over chunk text.
#[must_use]
pub fn build_context(results: &[RerankedResult]) -> String {
    results
        .iter()
        .map(|r| format!("[Source: {}]\n{}", r.chunk.source, r.chunk.content))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub struct Generator<P: LlmProvider> {
    provider: Arc<P>,
}

impl<P: LlmProvider> Generator<P> {
    #[must_use]
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// # Errors
    ///
    /// Returns the chat provider's error unchanged.
    pub async fn generate(
        &self,
        query: &str,
        results: &[RerankedResult],
    ) -> Result<String, hrag_llm::LlmError> {
        if results.is_empty() {
            return Ok(NO_CONTEXT_ANSWER.to_owned());
        }
        let messages = [
            Message::system(format!("{SYSTEM_PROMPT}{}", build_context(results))),
            Message::user(format!("Question: {query}\n\nAnswer:")),
        ];
        let answer = self.provider.chat(&messages).await?;
        tracing::info!(chars = answer.len(), provider = self.provider.name(), "answer generated");
        Ok(answer)
    }
}
