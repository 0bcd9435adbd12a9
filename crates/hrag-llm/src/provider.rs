use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

pub trait LlmProvider: Send + Sync {
    /// Send messages to the chat model and return the assistant response.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid.
    fn chat(&self, messages: &[Message]) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Embed a single text.
    ///
    /// # Errors
    ///
    /// Returns an error if embeddings are unsupported or the request fails.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    /// Embed several texts in one round-trip where the backend allows it.
    ///
    /// The default issues one `embed` call per text. The output has one vector per
    /// input, in input order.
    ///
    /// # Errors
    ///
    /// Returns the first embedding error encountered.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send {
        async move {
            let mut vectors = Vec::with_capacity(texts.len());
            for text in texts {
                vectors.push(self.embed(text).await?);
            }
            Ok(vectors)
        }
    }

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn message_constructors_set_role() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);
        assert_eq!(Message::user("u").content, "u");
    }

    struct Counting;

    impl LlmProvider for Counting {
        async fn chat(&self, _messages: &[Message]) -> Result<String, LlmError> {
            Ok(String::new())
        }

        #[allow(clippy::cast_precision_loss)]
        async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
            Ok(vec![text.len() as f32])
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn default_embed_batch_preserves_order() {
        let texts = vec!["a".to_owned(), "bbb".to_owned(), "cc".to_owned()];
        let vectors = Counting.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![3.0], vec![2.0]]);
    }
}
