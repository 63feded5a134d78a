use crate::error::{CompletionError, VectorStoreError};
use crate::models::{VectorMatch, VectorRecord};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), VectorStoreError>;

    /// Nearest neighbours of `vector`, restricted to records tagged with
    /// `chat_id` when one is given.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        chat_id: Option<&str>,
    ) -> Result<Vec<VectorMatch>, VectorStoreError>;

    async fn delete_ids(&self, ids: &[String]) -> Result<(), VectorStoreError>;

    async fn delete_by_chat(&self, chat_id: &str) -> Result<(), VectorStoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionMessage {
    pub role: String,
    pub content: String,
}

impl CompletionMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 2_000,
            temperature: 0.4,
        }
    }
}

#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn chat(
        &self,
        messages: &[CompletionMessage],
        params: CompletionParams,
    ) -> Result<String, CompletionError>;

    /// Plain prompt continuation, used when the chat endpoint is unavailable.
    async fn text_generation(
        &self,
        prompt: &str,
        params: CompletionParams,
    ) -> Result<String, CompletionError>;
}
