//! Fakes shared by the unit tests of this crate.

use crate::error::{CompletionError, EmbeddingError, VectorStoreError};
use crate::embeddings::Embedder;
use crate::models::{VectorMatch, VectorRecord, EMBEDDING_DIMENSIONS};
use crate::traits::{CompletionMessage, CompletionModel, CompletionParams, VectorIndex};
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::sync::Mutex;

/// One page per entry, each holding a single line of text.
pub fn sample_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for line in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let encoded = content.encode().expect("content encodes");
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("pdf serializes");
    buffer
}

/// Deterministic character-trigram embedder.
#[derive(Debug, Clone, Copy)]
pub struct FixedEmbedder {
    pub width: usize,
}

impl Default for FixedEmbedder {
    fn default() -> Self {
        Self {
            width: EMBEDDING_DIMENSIONS,
        }
    }
}

impl FixedEmbedder {
    pub fn with_width(width: usize) -> Self {
        Self { width }
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    fn dimensions(&self) -> usize {
        self.width
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0f32; self.width.max(1)];
        let chars: Vec<char> = format!("  {}", text.to_lowercase()).chars().collect();

        for window in chars.windows(3) {
            let mut hash = 1469598103934665603u64;
            for ch in window {
                hash ^= *ch as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }
        Ok(vector)
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSIONS
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::BackendResponse {
            status: 503,
            body: "model loading".to_string(),
        })
    }
}

/// Exact dot-product index kept in memory.
#[derive(Default)]
pub struct InMemoryIndex {
    records: Mutex<Vec<VectorRecord>>,
    cleared: Mutex<Vec<String>>,
}

impl InMemoryIndex {
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records
            .lock()
            .expect("records lock")
            .iter()
            .map(|record| record.id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn cleared_chats(&self) -> Vec<String> {
        self.cleared.lock().expect("cleared lock").clone()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), VectorStoreError> {
        let mut stored = self.records.lock().expect("records lock");
        for record in records {
            stored.retain(|existing| existing.id != record.id);
            stored.push(record.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        chat_id: Option<&str>,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        let stored = self.records.lock().expect("records lock");
        let mut matches: Vec<VectorMatch> = stored
            .iter()
            .filter(|record| chat_id.map_or(true, |chat| record.metadata.chat_id == chat))
            .map(|record| VectorMatch {
                id: record.id.clone(),
                score: record
                    .values
                    .iter()
                    .zip(vector)
                    .map(|(left, right)| f64::from(left * right))
                    .sum(),
                pdf_id: Some(record.metadata.pdf_id.clone()),
                chunk_id: Some(record.metadata.chunk_id),
                page: Some(record.metadata.page),
                text: Some(record.metadata.text.clone()),
                chat_id: Some(record.metadata.chat_id.clone()),
            })
            .collect();
        matches.sort_by(|left, right| right.score.total_cmp(&left.score));
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<(), VectorStoreError> {
        self.records
            .lock()
            .expect("records lock")
            .retain(|record| !ids.contains(&record.id));
        Ok(())
    }

    async fn delete_by_chat(&self, chat_id: &str) -> Result<(), VectorStoreError> {
        self.cleared
            .lock()
            .expect("cleared lock")
            .push(chat_id.to_string());
        self.records
            .lock()
            .expect("records lock")
            .retain(|record| record.metadata.chat_id != chat_id);
        Ok(())
    }
}

/// Returns the same matches for every query, ignoring any filter, the way a
/// shared index with stale or foreign records can.
pub struct ScriptedIndex {
    pub matches: Vec<VectorMatch>,
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    async fn upsert(&self, _records: &[VectorRecord]) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn query(
        &self,
        _vector: &[f32],
        top_k: usize,
        _chat_id: Option<&str>,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        Ok(self.matches.iter().take(top_k).cloned().collect())
    }

    async fn delete_ids(&self, _ids: &[String]) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn delete_by_chat(&self, _chat_id: &str) -> Result<(), VectorStoreError> {
        Ok(())
    }
}

pub struct FailingIndex;

#[async_trait]
impl VectorIndex for FailingIndex {
    async fn upsert(&self, _records: &[VectorRecord]) -> Result<(), VectorStoreError> {
        Err(VectorStoreError::Request("index offline".to_string()))
    }

    async fn query(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _chat_id: Option<&str>,
    ) -> Result<Vec<VectorMatch>, VectorStoreError> {
        Err(VectorStoreError::Request("index offline".to_string()))
    }

    async fn delete_ids(&self, _ids: &[String]) -> Result<(), VectorStoreError> {
        Err(VectorStoreError::Request("index offline".to_string()))
    }

    async fn delete_by_chat(&self, _chat_id: &str) -> Result<(), VectorStoreError> {
        Err(VectorStoreError::Request("index offline".to_string()))
    }
}

/// Completion model with canned outcomes that records every prompt.
pub struct ScriptedCompletion {
    chat_reply: Option<String>,
    generation_reply: Option<String>,
    pub chat_prompts: Mutex<Vec<Vec<CompletionMessage>>>,
    pub generation_prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(chat_reply: Option<&str>, generation_reply: Option<&str>) -> Self {
        Self {
            chat_reply: chat_reply.map(str::to_string),
            generation_reply: generation_reply.map(str::to_string),
            chat_prompts: Mutex::new(Vec::new()),
            generation_prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn last_chat_prompt(&self) -> Option<String> {
        self.chat_prompts
            .lock()
            .expect("prompts lock")
            .last()
            .and_then(|messages| messages.last())
            .map(|message| message.content.clone())
    }
}

#[async_trait]
impl CompletionModel for ScriptedCompletion {
    async fn chat(
        &self,
        messages: &[CompletionMessage],
        _params: CompletionParams,
    ) -> Result<String, CompletionError> {
        self.chat_prompts
            .lock()
            .expect("prompts lock")
            .push(messages.to_vec());
        self.chat_reply.clone().ok_or(CompletionError::BackendResponse {
            status: 500,
            body: "chat unavailable".to_string(),
        })
    }

    async fn text_generation(
        &self,
        prompt: &str,
        _params: CompletionParams,
    ) -> Result<String, CompletionError> {
        self.generation_prompts
            .lock()
            .expect("prompts lock")
            .push(prompt.to_string());
        self.generation_reply
            .clone()
            .ok_or(CompletionError::EmptyResponse)
    }
}
