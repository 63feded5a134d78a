use crate::embeddings::EmbeddingService;
use crate::error::StoreError;
use crate::models::{DocumentChunk, Source, VectorMatch};
use crate::store::VectorStore;
use crate::stores::Database;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_TOP_K: usize = 3;
const KEYWORD_SCORE: f64 = 0.8;
const FIRST_CHUNKS_SCORE: f64 = 0.5;

/// Finds passages of a chat's documents relevant to a query.
///
/// Vector search runs first. When it yields nothing usable the chat's chunks
/// are scanned for query words, and when those do not match either the first
/// chunks of the chat are returned so the model still sees some context.
#[derive(Clone)]
pub struct Retriever {
    database: Arc<Database>,
    embeddings: EmbeddingService,
    vectors: VectorStore,
}

impl Retriever {
    pub fn new(database: Arc<Database>, embeddings: EmbeddingService, vectors: VectorStore) -> Self {
        Self {
            database,
            embeddings,
            vectors,
        }
    }

    pub async fn retrieve(&self, query: &str, chat_id: &str, top_k: usize) -> Vec<Source> {
        if top_k == 0 {
            return Vec::new();
        }

        if self.vectors.is_available() {
            let sources = self.vector_sources(query, chat_id, top_k).await;
            if !sources.is_empty() {
                info!(chat_id, sources = sources.len(), "retrieved sources from vector store");
                return sources;
            }
        }

        match self.relational_sources(query, chat_id, top_k) {
            Ok(sources) => {
                info!(chat_id, sources = sources.len(), "retrieved sources from database");
                sources
            }
            Err(error) => {
                warn!(chat_id, %error, "database retrieval failed");
                Vec::new()
            }
        }
    }

    async fn vector_sources(&self, query: &str, chat_id: &str, top_k: usize) -> Vec<Source> {
        let embedding = self.embeddings.generate_embedding(query).await;
        let matches = self.vectors.query(&embedding, top_k, chat_id).await;
        debug!(chat_id, matches = matches.len(), "vector query returned");

        matches
            .into_iter()
            .filter(|hit| hit.chat_id.as_deref() == Some(chat_id))
            .filter_map(|hit| self.resolve_match(hit))
            .collect()
    }

    /// Uses the inline text when present, else the stored chunk.
    fn resolve_match(&self, hit: VectorMatch) -> Option<Source> {
        let inline = hit.text.filter(|text| !text.trim().is_empty());
        let text = match inline {
            Some(text) => text,
            None => {
                let (document_id, chunk_index) = (hit.pdf_id.as_deref()?, hit.chunk_id?);
                match self.database.get_chunk(document_id, chunk_index) {
                    Ok(Some(chunk)) if !chunk.content.trim().is_empty() => chunk.content,
                    Ok(_) => return None,
                    Err(error) => {
                        warn!(id = %hit.id, %error, "chunk lookup failed");
                        return None;
                    }
                }
            }
        };

        Some(Source {
            text,
            page: hit.page.unwrap_or(0),
            score: hit.score,
            document_id: hit.pdf_id,
            chunk_index: hit.chunk_id,
        })
    }

    fn relational_sources(
        &self,
        query: &str,
        chat_id: &str,
        top_k: usize,
    ) -> Result<Vec<Source>, StoreError> {
        let chunks = self.database.chat_chunks(chat_id)?;
        let words = query_words(query);

        let keyword_hits: Vec<Source> = chunks
            .iter()
            .filter(|chunk| contains_any(&chunk.content, &words))
            .take(top_k)
            .map(|chunk| source_from_chunk(chunk, KEYWORD_SCORE))
            .collect();
        if !keyword_hits.is_empty() {
            return Ok(keyword_hits);
        }

        Ok(chunks
            .iter()
            .take(top_k)
            .map(|chunk| source_from_chunk(chunk, FIRST_CHUNKS_SCORE))
            .collect())
    }
}

fn query_words(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}

fn contains_any(content: &str, words: &[String]) -> bool {
    let content = content.to_lowercase();
    words.iter().any(|word| content.contains(word.as_str()))
}

fn source_from_chunk(chunk: &DocumentChunk, score: f64) -> Source {
    Source {
        text: chunk.content.clone(),
        page: chunk.page_number,
        score,
        document_id: Some(chunk.document_id.clone()),
        chunk_index: Some(chunk.chunk_index),
    }
}

/// Block appended to a user message so the model can ground its answer.
pub fn format_context(sources: &[Source]) -> String {
    let mut context = String::from("\n\nRelevant information from uploaded documents:\n");
    for (position, source) in sources.iter().enumerate() {
        context.push_str(&format!("[Source {}]: {}\n", position + 1, source.text));
    }
    context
}
