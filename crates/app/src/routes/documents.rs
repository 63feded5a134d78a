use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use ragchat_core::Document;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Document upload and management routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/chats/{chat_id}/documents",
            post(upload_document)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
                .get(list_documents),
        )
        .route(
            "/documents/{document_id}",
            get(view_document).delete(delete_document),
        )
}

#[derive(Debug, Serialize)]
struct DocumentSummary {
    id: String,
    filename: String,
    created_at: DateTime<Utc>,
}

impl From<&Document> for DocumentSummary {
    fn from(document: &Document) -> Self {
        Self {
            id: document.id.clone(),
            filename: document.filename.clone(),
            created_at: document.uploaded_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChunkView {
    chunk_id: u32,
    page_number: u32,
    content: String,
}

/// POST /chats/{chat_id}/documents - multipart upload, field `file`.
async fn upload_document(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(err.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|err| ApiError::bad_request(err.body_text()))?;
        upload = Some((filename, data.to_vec()));
    }

    let Some((filename, data)) = upload else {
        return Err(ApiError::bad_request("No file provided"));
    };
    info!(chat_id, filename, bytes = data.len(), "received upload");

    let outcome = state
        .orchestrator
        .upload_document(&chat_id, &filename, &data)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("PDF \"{filename}\" uploaded and processed successfully!"),
        "document": DocumentSummary::from(&outcome.document),
        "report": outcome.report,
    })))
}

/// GET /chats/{chat_id}/documents
async fn list_documents(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> Result<Json<Vec<DocumentSummary>>, ApiError> {
    let documents = state.orchestrator.list_documents(&chat_id)?;
    Ok(Json(documents.iter().map(DocumentSummary::from).collect()))
}

/// GET /documents/{document_id}
async fn view_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let view = state.orchestrator.view_document(&document_id)?;
    let chunks: Vec<ChunkView> = view
        .chunks
        .into_iter()
        .map(|chunk| ChunkView {
            chunk_id: chunk.chunk_index,
            page_number: chunk.page_number,
            content: chunk.content,
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "document": DocumentSummary::from(&view.document),
        "chunks": chunks,
    })))
}

/// DELETE /documents/{document_id}
async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let document = state.orchestrator.delete_document(&document_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Document \"{}\" deleted successfully", document.filename),
    })))
}

#[cfg(test)]
mod tests {
    use crate::error::PROCESSING_FAILED;
    use crate::routes::build_router;
    use crate::routes::testing::{body_json, empty_request, state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use ragchat_core::{Document, DocumentChunk};
    use serde_json::json;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "ragchat-test-boundary";

    fn upload_request(chat_id: &str, field: &str, filename: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(format!("/chats/{chat_id}/documents"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request builds")
    }

    #[tokio::test]
    async fn non_pdf_uploads_are_rejected() {
        let media = TempDir::new().expect("media dir");
        let app_state = state(media.path());
        let chat = app_state.orchestrator.create_chat(None).expect("chat");
        let app = build_router(app_state);

        let response = app
            .oneshot(upload_request(&chat.id, "file", "notes.txt", b"plain"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "success": false, "error": "Please upload a PDF file" })
        );
    }

    #[tokio::test]
    async fn missing_file_field_is_rejected() {
        let media = TempDir::new().expect("media dir");
        let app_state = state(media.path());
        let chat = app_state.orchestrator.create_chat(None).expect("chat");
        let app = build_router(app_state);

        let response = app
            .oneshot(upload_request(&chat.id, "attachment", "a.pdf", b"%PDF-1.4"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No file provided");
    }

    #[tokio::test]
    async fn unreadable_pdf_is_kept_but_reported() {
        let media = TempDir::new().expect("media dir");
        let app_state = state(media.path());
        let chat = app_state.orchestrator.create_chat(None).expect("chat");
        let app = build_router(app_state);

        let response = app
            .clone()
            .oneshot(upload_request(&chat.id, "file", "broken.pdf", b"%PDF-1.4\n%broken"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], PROCESSING_FAILED);

        let listed = app
            .oneshot(empty_request("GET", &format!("/chats/{}/documents", chat.id)))
            .await
            .expect("response");
        let documents = body_json(listed).await;
        assert_eq!(documents[0]["filename"], "broken.pdf");
        assert!(documents[0]["created_at"].is_string());
    }

    #[tokio::test]
    async fn view_and_delete_document() {
        let media = TempDir::new().expect("media dir");
        let app_state = state(media.path());
        let chat = app_state.orchestrator.create_chat(None).expect("chat");
        let database = app_state.orchestrator.database();
        let document = Document {
            id: "doc-1".to_string(),
            chat_id: chat.id.clone(),
            filename: "manual.pdf".to_string(),
            file_path: None,
            uploaded_at: Utc::now(),
        };
        database.insert_document(&document).expect("document");
        for (index, page) in [(0u32, 1u32), (1, 0)] {
            database
                .insert_chunk(&DocumentChunk {
                    document_id: document.id.clone(),
                    chunk_index: index,
                    page_number: page,
                    content: format!("chunk {index}"),
                    embedding: Vec::new(),
                })
                .expect("chunk");
        }
        let app = build_router(app_state.clone());

        let viewed = app
            .clone()
            .oneshot(empty_request("GET", "/documents/doc-1"))
            .await
            .expect("response");
        assert_eq!(viewed.status(), StatusCode::OK);
        let body = body_json(viewed).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["document"]["filename"], "manual.pdf");
        assert_eq!(
            body["chunks"],
            json!([
                { "chunk_id": 1, "page_number": 0, "content": "chunk 1" },
                { "chunk_id": 0, "page_number": 1, "content": "chunk 0" },
            ])
        );

        let deleted = app
            .clone()
            .oneshot(empty_request("DELETE", "/documents/doc-1"))
            .await
            .expect("response");
        assert_eq!(
            body_json(deleted).await["message"],
            "Document \"manual.pdf\" deleted successfully"
        );

        let gone = app
            .oneshot(empty_request("GET", "/documents/doc-1"))
            .await
            .expect("response");
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }
}
