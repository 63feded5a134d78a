use crate::error::IngestError;
use crate::extractor::PageText;
use crate::models::{DocumentChunk, IngestionOptions};

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IngestError> {
        if chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {chunk_overlap} must be smaller than chunk size {chunk_size}"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

impl TryFrom<&IngestionOptions> for ChunkingConfig {
    type Error = IngestError;

    fn try_from(value: &IngestionOptions) -> Result<Self, Self::Error> {
        Self::new(value.chunk_size, value.chunk_overlap)
    }
}

/// Splits every page into overlapping windows and numbers the chunks
/// sequentially across the whole document.
pub fn build_chunks(
    document_id: &str,
    pages: &[PageText],
    config: ChunkingConfig,
) -> Vec<DocumentChunk> {
    let mut chunks = Vec::new();
    let mut cursor = 0u32;

    for page in pages {
        for piece in split_text(&page.text, config) {
            chunks.push(DocumentChunk {
                document_id: document_id.to_string(),
                chunk_index: cursor,
                page_number: page.number,
                content: piece,
                embedding: Vec::new(),
            });
            cursor = cursor.saturating_add(1);
        }
    }

    chunks
}

/// Recursive character splitting: try paragraph breaks first, then lines,
/// then words, then single characters, merging neighbours back up to the
/// chunk size with the configured overlap.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    split_recursive(text, &SEPARATORS, config)
}

fn split_recursive(text: &str, separators: &[&str], config: ChunkingConfig) -> Vec<String> {
    let mut separator = "";
    let mut remaining: &[&str] = &[];
    for (position, &candidate) in separators.iter().enumerate() {
        if candidate.is_empty() || text.contains(candidate) {
            separator = candidate;
            remaining = &separators[position + 1..];
            break;
        }
    }

    let mut chunks = Vec::new();
    let mut good_splits: Vec<&str> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) < config.chunk_size {
            good_splits.push(piece);
            continue;
        }

        if !good_splits.is_empty() {
            chunks.extend(merge_splits(&good_splits, config));
            good_splits.clear();
        }

        if remaining.is_empty() {
            chunks.push(piece.to_string());
        } else {
            chunks.extend(split_recursive(piece, remaining, config));
        }
    }

    if !good_splits.is_empty() {
        chunks.extend(merge_splits(&good_splits, config));
    }

    chunks
}

// The separator stays attached to the start of the piece that follows it.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(start, ch)| &text[start..start + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        pieces.push(&text[start..index]);
        start = index;
    }
    pieces.push(&text[start..]);

    pieces.into_iter().filter(|piece| !piece.is_empty()).collect()
}

fn merge_splits(splits: &[&str], config: ChunkingConfig) -> Vec<String> {
    let mut documents = Vec::new();
    let mut window: Vec<&str> = Vec::new();
    let mut total = 0usize;

    for &split in splits {
        let length = char_len(split);

        if total + length > config.chunk_size && !window.is_empty() {
            push_joined(&mut documents, &window);

            while total > config.chunk_overlap
                || (total + length > config.chunk_size && total > 0)
            {
                let Some(first) = window.first() else {
                    break;
                };
                total -= char_len(first);
                window.remove(0);
            }
        }

        window.push(split);
        total += length;
    }

    push_joined(&mut documents, &window);
    documents
}

fn push_joined(documents: &mut Vec<String>, window: &[&str]) {
    let joined = window.concat();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        documents.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
