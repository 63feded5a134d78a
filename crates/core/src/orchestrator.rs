use crate::embeddings::EmbeddingService;
use crate::error::ChatError;
use crate::generation::ResponseGenerator;
use crate::ingest::{is_pdf_name, PdfProcessor};
use crate::models::{
    vector_id, Chat, Document, DocumentChunk, IngestionOptions, IngestionReport, Message, Role,
    Source,
};
use crate::retrieval::{format_context, Retriever, DEFAULT_TOP_K};
use crate::storage::LocalFileStore;
use crate::store::VectorStore;
use crate::stores::Database;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatReply {
    pub response: String,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub document: Document,
    pub report: IngestionReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub document: Document,
    pub chunks: Vec<DocumentChunk>,
}

/// Entry point for every chat and document operation of the service.
#[derive(Clone)]
pub struct ChatOrchestrator {
    database: Arc<Database>,
    files: LocalFileStore,
    processor: PdfProcessor,
    retriever: Retriever,
    generator: ResponseGenerator,
    vectors: VectorStore,
    top_k: usize,
}

impl ChatOrchestrator {
    pub fn new(
        database: Arc<Database>,
        files: LocalFileStore,
        embeddings: EmbeddingService,
        vectors: VectorStore,
        generator: ResponseGenerator,
        options: IngestionOptions,
    ) -> Self {
        let processor = PdfProcessor::new(
            database.clone(),
            embeddings.clone(),
            vectors.clone(),
            options,
        );
        let retriever = Retriever::new(database.clone(), embeddings, vectors.clone());
        Self {
            database,
            files,
            processor,
            retriever,
            generator,
            vectors,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    // ── Chats ──

    pub fn create_chat(&self, title: Option<&str>) -> Result<Chat, ChatError> {
        let title = title
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(DEFAULT_CHAT_TITLE);
        let chat = self.database.create_chat(title)?;
        info!(chat_id = %chat.id, "created chat");
        Ok(chat)
    }

    pub fn list_chats(&self) -> Result<Vec<Chat>, ChatError> {
        Ok(self.database.list_chats()?)
    }

    pub fn get_chat(&self, chat_id: &str) -> Result<Chat, ChatError> {
        self.database
            .get_chat(chat_id)?
            .ok_or_else(|| ChatError::NotFound(format!("chat {chat_id}")))
    }

    /// Removes the chat, its vectors and its uploaded files.
    pub async fn delete_chat(&self, chat_id: &str) -> Result<Chat, ChatError> {
        let chat = self.get_chat(chat_id)?;
        let documents = self.database.list_documents(chat_id)?;

        self.vectors.clear_chat(chat_id).await;
        for document in &documents {
            self.remove_file(document).await;
        }
        self.database.delete_chat(chat_id)?;

        info!(chat_id, documents = documents.len(), "deleted chat");
        Ok(chat)
    }

    // ── Conversation ──

    pub fn messages(&self, chat_id: &str) -> Result<Vec<Message>, ChatError> {
        self.get_chat(chat_id)?;
        Ok(self.database.list_messages(chat_id)?)
    }

    /// The last `limit` messages of the chat, oldest first. Unknown chats
    /// have no history.
    pub fn conversation_context(&self, chat_id: &str, limit: usize) -> Result<Vec<Message>, ChatError> {
        Ok(self.database.recent_messages(chat_id, limit)?)
    }

    pub async fn generate_response_with_context(
        &self,
        message: &str,
        chat_id: &str,
        use_rag: bool,
    ) -> Result<ChatReply, ChatError> {
        let history = self.conversation_context(chat_id, DEFAULT_HISTORY_LIMIT)?;

        let sources = if use_rag {
            self.retriever.retrieve(message, chat_id, self.top_k).await
        } else {
            Vec::new()
        };

        let prompt_message = if sources.is_empty() {
            debug!(chat_id, "no document context, using plain generation");
            message.to_string()
        } else {
            info!(chat_id, sources = sources.len(), "augmenting message with sources");
            format!("{message}\n\n{}", format_context(&sources))
        };

        let response = self.generator.generate_response(&prompt_message, &history).await;
        Ok(ChatReply { response, sources })
    }

    /// Answers `message` and records both sides of the exchange.
    pub async fn send_message(
        &self,
        chat_id: &str,
        message: &str,
        use_rag: bool,
    ) -> Result<ChatReply, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::InvalidInput("Message cannot be empty".to_string()));
        }
        self.get_chat(chat_id)?;

        let reply = self
            .generate_response_with_context(message, chat_id, use_rag)
            .await?;

        self.database.add_message(chat_id, Role::User, message)?;
        self.database
            .add_message(chat_id, Role::Assistant, &reply.response)?;
        Ok(reply)
    }

    // ── Documents ──

    /// Stores and ingests an uploaded PDF. The document record is kept even
    /// when processing fails.
    pub async fn upload_document(
        &self,
        chat_id: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<UploadOutcome, ChatError> {
        if !is_pdf_name(filename) {
            return Err(ChatError::InvalidInput("Please upload a PDF file".to_string()));
        }
        if data.is_empty() {
            return Err(ChatError::InvalidInput("No file provided".to_string()));
        }
        self.get_chat(chat_id)?;

        let document_id = uuid::Uuid::new_v4().to_string();
        let path = self.files.save(&document_id, filename, data).await?;
        let document = Document {
            id: document_id,
            chat_id: chat_id.to_string(),
            filename: filename.to_string(),
            file_path: Some(path),
            uploaded_at: Utc::now(),
        };
        self.database.insert_document(&document)?;
        info!(document_id = %document.id, chat_id, filename, "stored upload");

        let report = self.processor.process(&document, data, chat_id).await?;
        Ok(UploadOutcome { document, report })
    }

    pub fn list_documents(&self, chat_id: &str) -> Result<Vec<Document>, ChatError> {
        self.get_chat(chat_id)?;
        Ok(self.database.list_documents(chat_id)?)
    }

    pub fn get_document(&self, document_id: &str) -> Result<Document, ChatError> {
        self.database
            .get_document(document_id)?
            .ok_or_else(|| ChatError::NotFound(format!("document {document_id}")))
    }

    pub fn view_document(&self, document_id: &str) -> Result<DocumentView, ChatError> {
        let document = self.get_document(document_id)?;
        let chunks = self.database.document_chunks(document_id)?;
        Ok(DocumentView { document, chunks })
    }

    /// Deletes the document's vectors, its stored file and its record.
    pub async fn delete_document(&self, document_id: &str) -> Result<Document, ChatError> {
        let document = self.get_document(document_id)?;

        let ids: Vec<String> = self
            .database
            .document_chunks(document_id)?
            .iter()
            .map(|chunk| vector_id(&chunk.document_id, chunk.chunk_index))
            .collect();
        if !ids.is_empty() {
            self.vectors.delete_ids(&ids).await;
        }

        self.remove_file(&document).await;
        self.database.delete_document(document_id)?;

        info!(document_id, vectors = ids.len(), "deleted document");
        Ok(document)
    }

    async fn remove_file(&self, document: &Document) {
        let Some(path) = &document.file_path else {
            return;
        };
        match self.files.delete(path).await {
            Ok(true) => debug!(path = %path.display(), "removed stored file"),
            Ok(false) => debug!(path = %path.display(), "stored file already gone"),
            Err(error) => warn!(path = %path.display(), %error, "failed to remove stored file"),
        }
    }
}
