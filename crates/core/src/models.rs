use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const EMBEDDING_DIMENSIONS: usize = 768;
pub const METADATA_TEXT_LIMIT: usize = 1_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub chat_id: String,
    pub filename: String,
    pub file_path: Option<PathBuf>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentChunk {
    pub document_id: String,
    pub chunk_index: u32,
    pub page_number: u32,
    pub content: String,
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
}

/// Identifier of a chunk's vector in the external index.
pub fn vector_id(document_id: &str, chunk_index: u32) -> String {
    format!("{document_id}_{chunk_index}")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorMetadata {
    pub pdf_id: String,
    pub chunk_id: u32,
    pub page: u32,
    #[serde(default)]
    pub text: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: VectorMetadata,
}

impl VectorRecord {
    pub fn for_chunk(chunk: &DocumentChunk, chat_id: &str) -> Self {
        Self {
            id: vector_id(&chunk.document_id, chunk.chunk_index),
            values: chunk.embedding.clone(),
            metadata: VectorMetadata {
                pdf_id: chunk.document_id.clone(),
                chunk_id: chunk.chunk_index,
                page: chunk.page_number,
                text: chunk.content.chars().take(METADATA_TEXT_LIMIT).collect(),
                chat_id: chat_id.to_string(),
            },
        }
    }
}

/// A nearest-neighbour hit. Metadata fields are optional because the index
/// may hold records written by other producers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorMatch {
    pub id: String,
    pub score: f64,
    pub pdf_id: Option<String>,
    pub chunk_id: Option<u32>,
    pub page: Option<u32>,
    pub text: Option<String>,
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub text: String,
    pub page: u32,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub temp_dir: Option<PathBuf>,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_500,
            chunk_overlap: 400,
            temp_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestionReport {
    pub page_count: usize,
    pub chunk_count: usize,
    pub vectors_stored: bool,
}
