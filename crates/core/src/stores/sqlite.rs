use crate::error::StoreError;
use crate::models::{Chat, Document, DocumentChunk, Message, Role};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
    PRAGMA foreign_keys=ON;

    CREATE TABLE IF NOT EXISTS chats (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        chat_id TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS documents (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        chat_id TEXT NOT NULL,
        filename TEXT NOT NULL,
        file_path TEXT,
        uploaded_at TEXT NOT NULL,
        FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS document_chunks (
        document_id TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        page_number INTEGER NOT NULL,
        content TEXT NOT NULL,
        embedding TEXT NOT NULL,
        PRIMARY KEY (document_id, chunk_index),
        FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
    );
";

/// Relational store for chats, messages, documents and their chunks.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    // ── Chats ──

    pub fn create_chat(&self, title: &str) -> Result<Chat, StoreError> {
        let chat = Chat {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            created_at: Utc::now(),
        };
        self.insert_chat(&chat)?;
        Ok(chat)
    }

    pub fn insert_chat(&self, chat: &Chat) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO chats (id, title, created_at) VALUES (?1, ?2, ?3)",
            params![chat.id, chat.title, chat.created_at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, title, created_at FROM chats WHERE id = ?1",
                params![chat_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
            )
            .optional()?;

        row.map(|(id, title, created_at)| {
            Ok(Chat {
                id,
                title,
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .transpose()
    }

    pub fn list_chats(&self) -> Result<Vec<Chat>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, title, created_at FROM chats ORDER BY created_at DESC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;

        let mut chats = Vec::new();
        for row in rows {
            let (id, title, created_at) = row?;
            chats.push(Chat {
                id,
                title,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(chats)
    }

    /// Deletes the chat together with its messages, documents and chunks.
    pub fn delete_chat(&self, chat_id: &str) -> Result<bool, StoreError> {
        let removed = self
            .conn()?
            .execute("DELETE FROM chats WHERE id = ?1", params![chat_id])?;
        Ok(removed > 0)
    }

    // ── Messages ──

    pub fn add_message(&self, chat_id: &str, role: Role, content: &str) -> Result<Message, StoreError> {
        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        };

        self.conn()?.execute(
            "INSERT INTO messages (id, chat_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id,
                message.chat_id,
                message.role.as_str(),
                message.content,
                message.created_at.to_rfc3339()
            ],
        )?;
        Ok(message)
    }

    pub fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, role, content, created_at FROM messages
             WHERE chat_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![chat_id], message_columns)?;
        collect_messages(rows)
    }

    /// The most recent `limit` messages, oldest first.
    pub fn recent_messages(&self, chat_id: &str, limit: usize) -> Result<Vec<Message>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, role, content, created_at FROM messages
             WHERE chat_id = ?1 ORDER BY seq DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![chat_id, limit as i64], message_columns)?;
        let mut messages = collect_messages(rows)?;
        messages.reverse();
        Ok(messages)
    }

    // ── Documents ──

    pub fn insert_document(&self, document: &Document) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO documents (id, chat_id, filename, file_path, uploaded_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                document.id,
                document.chat_id,
                document.filename,
                document
                    .file_path
                    .as_ref()
                    .map(|path| path.to_string_lossy().to_string()),
                document.uploaded_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    pub fn get_document(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, chat_id, filename, file_path, uploaded_at FROM documents WHERE id = ?1",
                params![document_id],
                document_columns,
            )
            .optional()?;
        row.map(into_document).transpose()
    }

    pub fn list_documents(&self, chat_id: &str) -> Result<Vec<Document>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, filename, file_path, uploaded_at FROM documents
             WHERE chat_id = ?1 ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![chat_id], document_columns)?;

        let mut documents = Vec::new();
        for row in rows {
            documents.push(into_document(row?)?);
        }
        Ok(documents)
    }

    /// Deletes the document row; its chunks go with it.
    pub fn delete_document(&self, document_id: &str) -> Result<bool, StoreError> {
        let removed = self
            .conn()?
            .execute("DELETE FROM documents WHERE id = ?1", params![document_id])?;
        Ok(removed > 0)
    }

    // ── Chunks ──

    pub fn insert_chunk(&self, chunk: &DocumentChunk) -> Result<(), StoreError> {
        let embedding = serde_json::to_string(&chunk.embedding)?;
        self.conn()?.execute(
            "INSERT INTO document_chunks (document_id, chunk_index, page_number, content, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                chunk.document_id,
                chunk.chunk_index,
                chunk.page_number,
                chunk.content,
                embedding
            ],
        )?;
        Ok(())
    }

    pub fn get_chunk(
        &self,
        document_id: &str,
        chunk_index: u32,
    ) -> Result<Option<DocumentChunk>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT document_id, chunk_index, page_number, content, embedding
                 FROM document_chunks WHERE document_id = ?1 AND chunk_index = ?2",
                params![document_id, chunk_index],
                chunk_columns,
            )
            .optional()?;
        row.map(into_chunk).transpose()
    }

    /// Chunks of one document ordered by page, then position.
    pub fn document_chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT document_id, chunk_index, page_number, content, embedding
             FROM document_chunks WHERE document_id = ?1
             ORDER BY page_number ASC, chunk_index ASC",
        )?;
        let rows = stmt.query_map(params![document_id], chunk_columns)?;
        collect_chunks(rows)
    }

    /// Every chunk uploaded into a chat, in upload order.
    pub fn chat_chunks(&self, chat_id: &str) -> Result<Vec<DocumentChunk>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.document_id, c.chunk_index, c.page_number, c.content, c.embedding
             FROM document_chunks c JOIN documents d ON d.id = c.document_id
             WHERE d.chat_id = ?1
             ORDER BY d.seq ASC, c.chunk_index ASC",
        )?;
        let rows = stmt.query_map(params![chat_id], chunk_columns)?;
        collect_chunks(rows)
    }

    pub fn count_chunks(&self, document_id: &str) -> Result<u32, StoreError> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM document_chunks WHERE document_id = ?1",
            params![document_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u32)
    }
}

type MessageRow = (String, String, String, String, String);
type DocumentRow = (String, String, String, Option<String>, String);
type ChunkRow = (String, u32, u32, String, String);

fn message_columns(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn document_columns(row: &Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn chunk_columns(row: &Row<'_>) -> rusqlite::Result<ChunkRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn collect_messages(
    rows: impl Iterator<Item = rusqlite::Result<MessageRow>>,
) -> Result<Vec<Message>, StoreError> {
    let mut messages = Vec::new();
    for row in rows {
        let (id, chat_id, role, content, created_at) = row?;
        let role = Role::parse(&role).ok_or_else(|| StoreError::UnknownRole(role.clone()))?;
        messages.push(Message {
            id,
            chat_id,
            role,
            content,
            created_at: parse_timestamp(&created_at)?,
        });
    }
    Ok(messages)
}

fn collect_chunks(
    rows: impl Iterator<Item = rusqlite::Result<ChunkRow>>,
) -> Result<Vec<DocumentChunk>, StoreError> {
    let mut chunks = Vec::new();
    for row in rows {
        chunks.push(into_chunk(row?)?);
    }
    Ok(chunks)
}

fn into_document(row: DocumentRow) -> Result<Document, StoreError> {
    let (id, chat_id, filename, file_path, uploaded_at) = row;
    Ok(Document {
        id,
        chat_id,
        filename,
        file_path: file_path.map(PathBuf::from),
        uploaded_at: parse_timestamp(&uploaded_at)?,
    })
}

fn into_chunk(row: ChunkRow) -> Result<DocumentChunk, StoreError> {
    let (document_id, chunk_index, page_number, content, embedding) = row;
    Ok(DocumentChunk {
        document_id,
        chunk_index,
        page_number,
        content,
        embedding: serde_json::from_str(&embedding)?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}
