pub mod chunking;
pub mod completion;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod retrieval;
pub mod storage;
pub mod store;
pub mod stores;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

pub use chunking::{build_chunks, split_text, ChunkingConfig};
pub use completion::HuggingFaceCompletionModel;
pub use embeddings::{Embedder, EmbeddingService, HuggingFaceEmbedder, DEFAULT_EMBEDDING_MODEL};
pub use error::{
    ChatError, CompletionError, EmbeddingError, IngestError, StorageError, StoreError,
    VectorStoreError,
};
pub use extractor::{extract_page_texts, PageText, PdfExtractor};
pub use generation::{build_prompt, ResponseGenerator};
pub use ingest::{discover_pdf_files, is_pdf_name, PdfProcessor};
pub use models::{
    Chat, Document, DocumentChunk, IngestionOptions, IngestionReport, Message, Role, Source,
    VectorMatch, VectorRecord, EMBEDDING_DIMENSIONS,
};
pub use orchestrator::{ChatOrchestrator, ChatReply, DocumentView, UploadOutcome};
pub use retrieval::{format_context, Retriever, DEFAULT_TOP_K};
pub use storage::LocalFileStore;
pub use store::VectorStore;
pub use stores::{Database, PineconeStore};
pub use traits::{CompletionMessage, CompletionModel, CompletionParams, VectorIndex};
