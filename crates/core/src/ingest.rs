use crate::chunking::{build_chunks, ChunkingConfig};
use crate::embeddings::EmbeddingService;
use crate::error::IngestError;
use crate::extractor::extract_page_texts;
use crate::models::{Document, DocumentChunk, IngestionOptions, IngestionReport, VectorRecord};
use crate::store::VectorStore;
use crate::stores::Database;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Turns an uploaded PDF into stored chunks and vectors.
#[derive(Clone)]
pub struct PdfProcessor {
    database: Arc<Database>,
    embeddings: EmbeddingService,
    vectors: VectorStore,
    options: IngestionOptions,
}

impl PdfProcessor {
    pub fn new(
        database: Arc<Database>,
        embeddings: EmbeddingService,
        vectors: VectorStore,
        options: IngestionOptions,
    ) -> Self {
        Self {
            database,
            embeddings,
            vectors,
            options,
        }
    }

    pub async fn process(
        &self,
        document: &Document,
        data: &[u8],
        chat_id: &str,
    ) -> Result<IngestionReport, IngestError> {
        info!(document_id = %document.id, "starting pdf processing");
        let config = ChunkingConfig::try_from(&self.options)?;

        // Dropping the handle removes the file, whichever way this returns.
        let temp = self.write_temp_file(data)?;
        let path = temp.path().to_path_buf();
        // Parsing is CPU bound and must stay off the async workers.
        let pages = tokio::task::spawn_blocking(move || extract_page_texts(&path)).await??;
        drop(temp);

        let mut chunks = build_chunks(&document.id, &pages, config);
        info!(chunks = chunks.len(), "split document");

        self.embeddings.embed_chunks(&mut chunks).await;
        let vectors_stored = self.persist_vectors(document, chat_id, &chunks).await;
        self.store_chunks(document, &chunks);

        info!(document_id = %document.id, chunks = chunks.len(), "processed pdf");
        Ok(IngestionReport {
            page_count: pages.len(),
            chunk_count: chunks.len(),
            vectors_stored,
        })
    }

    fn write_temp_file(&self, data: &[u8]) -> Result<NamedTempFile, IngestError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("upload-").suffix(".pdf");
        let mut temp = match &self.options.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        temp.write_all(data)?;
        temp.flush()?;
        debug!(path = %temp.path().display(), "saved pdf to temp file");
        Ok(temp)
    }

    async fn persist_vectors(
        &self,
        document: &Document,
        chat_id: &str,
        chunks: &[DocumentChunk],
    ) -> bool {
        if !self.vectors.is_available() {
            info!("vector store not available, skipping vector storage");
            return false;
        }

        self.vectors.clear_chat(chat_id).await;

        let records = chunks
            .iter()
            .map(|chunk| VectorRecord::for_chunk(chunk, chat_id))
            .collect::<Vec<_>>();
        info!(document_id = %document.id, vectors = records.len(), "storing vectors");
        self.vectors.upsert(&records).await
    }

    fn store_chunks(&self, document: &Document, chunks: &[DocumentChunk]) {
        debug!(document_id = %document.id, "storing chunks");
        for chunk in chunks {
            if let Err(error) = self.database.insert_chunk(chunk) {
                warn!(chunk = chunk.chunk_index, %error, "failed to store chunk");
            }
        }
    }
}

/// Every PDF under `root` (or `root` itself when it is a file), sorted.
pub fn discover_pdf_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).into_iter().filter_map(|item| item.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        if is_pdf_name(&entry.path().to_string_lossy()) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn is_pdf_name(name: &str) -> bool {
    name.to_lowercase().ends_with(".pdf")
}
