use crate::error::EmbeddingError;
use crate::models::{DocumentChunk, EMBEDDING_DIMENSIONS};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-mpnet-base-v2";

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Hosted feature-extraction pipeline on the Hugging Face inference API.
pub struct HuggingFaceEmbedder {
    endpoint: String,
    token: Option<String>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureExtractionResponse {
    Pooled(Vec<f32>),
    PerToken(Vec<Vec<f32>>),
}

impl HuggingFaceEmbedder {
    pub fn new(
        inference_url: &str,
        model: &str,
        token: Option<String>,
        client: Client,
    ) -> Self {
        Self {
            endpoint: format!(
                "{}/models/{}/pipeline/feature-extraction",
                inference_url.trim_end_matches('/'),
                model
            ),
            token,
            client,
        }
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&FeatureExtractionRequest { inputs: text });

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::BackendResponse { status, body });
        }

        let parsed: FeatureExtractionResponse = response.json().await?;
        parsed.into_vector()
    }
}

impl FeatureExtractionResponse {
    fn into_vector(self) -> Result<Vec<f32>, EmbeddingError> {
        match self {
            FeatureExtractionResponse::Pooled(vector) if !vector.is_empty() => Ok(vector),
            FeatureExtractionResponse::PerToken(tokens) => mean_pool(&tokens),
            FeatureExtractionResponse::Pooled(_) => Err(EmbeddingError::EmptyResponse),
        }
    }
}

fn mean_pool(tokens: &[Vec<f32>]) -> Result<Vec<f32>, EmbeddingError> {
    let width = tokens.first().map(Vec::len).unwrap_or(0);
    if width == 0 {
        return Err(EmbeddingError::EmptyResponse);
    }

    let mut pooled = vec![0f32; width];
    for token in tokens {
        if token.len() != width {
            return Err(EmbeddingError::Dimension {
                expected: width,
                actual: token.len(),
            });
        }
        for (slot, value) in pooled.iter_mut().zip(token) {
            *slot += value;
        }
    }

    let count = tokens.len() as f32;
    for slot in &mut pooled {
        *slot /= count;
    }
    Ok(pooled)
}

/// Wraps an [`Embedder`] so callers always receive a vector of the expected
/// width: any backend failure degrades to a zero vector.
#[derive(Clone)]
pub struct EmbeddingService {
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingService {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub async fn generate_embedding(&self, text: &str) -> Vec<f32> {
        match self.embedder.embed(text).await {
            Ok(vector) if vector.len() == EMBEDDING_DIMENSIONS => vector,
            Ok(vector) => {
                let error = EmbeddingError::Dimension {
                    expected: EMBEDDING_DIMENSIONS,
                    actual: vector.len(),
                };
                warn!(%error, "embedding generation failed, using zero vector");
                zero_vector()
            }
            Err(error) => {
                warn!(%error, "embedding generation failed, using zero vector");
                zero_vector()
            }
        }
    }

    /// Fills in the embedding of every chunk, one request per chunk.
    pub async fn embed_chunks(&self, chunks: &mut [DocumentChunk]) {
        let total = chunks.len();
        info!(chunks = total, "generating embeddings");

        for (index, chunk) in chunks.iter_mut().enumerate() {
            chunk.embedding = self.generate_embedding(&chunk.content).await;
            if index % 5 == 0 {
                debug!(done = index + 1, total, "embedding progress");
            }
        }

        info!(chunks = total, "generated embeddings");
    }
}

pub fn zero_vector() -> Vec<f32> {
    vec![0.0; EMBEDDING_DIMENSIONS]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailingEmbedder, FixedEmbedder};

    #[tokio::test]
    async fn backend_failure_degrades_to_zero_vector() {
        let service = EmbeddingService::new(Arc::new(FailingEmbedder));

        let vector = service.generate_embedding("anything").await;

        assert_eq!(vector.len(), EMBEDDING_DIMENSIONS);
        assert!(vector.iter().all(|value| *value == 0.0));
    }

    #[tokio::test]
    async fn wrong_width_degrades_to_zero_vector() {
        let service = EmbeddingService::new(Arc::new(FixedEmbedder::with_width(12)));

        let vector = service.generate_embedding("anything").await;

        assert_eq!(vector.len(), EMBEDDING_DIMENSIONS);
        assert!(vector.iter().all(|value| *value == 0.0));
    }

    #[tokio::test]
    async fn successful_embeddings_pass_through() {
        let service = EmbeddingService::new(Arc::new(FixedEmbedder::default()));

        let vector = service.generate_embedding("pump pressure").await;

        assert_eq!(vector.len(), EMBEDDING_DIMENSIONS);
        assert!(vector.iter().any(|value| *value != 0.0));
    }

    #[tokio::test]
    async fn every_chunk_gets_an_embedding() {
        let service = EmbeddingService::new(Arc::new(FailingEmbedder));
        let mut chunks = vec![
            DocumentChunk {
                document_id: "doc".to_string(),
                chunk_index: 0,
                page_number: 0,
                content: "one".to_string(),
                embedding: Vec::new(),
            };
            3
        ];

        service.embed_chunks(&mut chunks).await;

        assert!(chunks
            .iter()
            .all(|chunk| chunk.embedding.len() == EMBEDDING_DIMENSIONS));
    }

    #[test]
    fn pooled_response_is_used_as_is() {
        let parsed: FeatureExtractionResponse =
            serde_json::from_str("[0.1, 0.2, 0.3]").expect("flat vector parses");
        assert_eq!(parsed.into_vector().expect("non-empty"), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn per_token_response_is_mean_pooled() {
        let parsed: FeatureExtractionResponse =
            serde_json::from_str("[[1.0, 2.0], [3.0, 4.0]]").expect("matrix parses");
        assert_eq!(parsed.into_vector().expect("non-empty"), vec![2.0, 3.0]);
    }

    #[test]
    fn empty_response_is_an_error() {
        let parsed: FeatureExtractionResponse =
            serde_json::from_str("[]").expect("empty array parses");
        assert!(matches!(
            parsed.into_vector(),
            Err(EmbeddingError::EmptyResponse)
        ));
    }

    #[test]
    fn endpoint_targets_the_feature_extraction_pipeline() {
        let embedder = HuggingFaceEmbedder::new(
            "https://router.huggingface.co/hf-inference/",
            DEFAULT_EMBEDDING_MODEL,
            None,
            Client::new(),
        );
        assert_eq!(
            embedder.endpoint,
            "https://router.huggingface.co/hf-inference/models/sentence-transformers/all-mpnet-base-v2/pipeline/feature-extraction"
        );
    }
}
