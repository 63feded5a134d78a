use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use ragchat_core::{Chat, ChatReply, Message};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;

/// Chat and conversation routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chats", get(list_chats).post(create_chat))
        .route("/chats/{chat_id}", get(get_chat).delete(delete_chat))
        .route(
            "/chats/{chat_id}/messages",
            get(list_messages).post(send_message),
        )
}

#[derive(Debug, Default, Deserialize)]
struct CreateChatRequest {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    message: String,
    #[serde(default = "default_use_rag")]
    use_rag: bool,
}

fn default_use_rag() -> bool {
    true
}

/// POST /chats
async fn create_chat(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateChatRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Chat>), ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let chat = state.orchestrator.create_chat(request.title.as_deref())?;
    Ok((StatusCode::CREATED, Json(chat)))
}

/// GET /chats
async fn list_chats(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Chat>>, ApiError> {
    Ok(Json(state.orchestrator.list_chats()?))
}

/// GET /chats/{chat_id}
async fn get_chat(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> Result<Json<Chat>, ApiError> {
    Ok(Json(state.orchestrator.get_chat(&chat_id)?))
}

/// DELETE /chats/{chat_id}
async fn delete_chat(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let chat = state.orchestrator.delete_chat(&chat_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Chat \"{}\" deleted successfully", chat.title),
    })))
}

/// GET /chats/{chat_id}/messages
async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(state.orchestrator.messages(&chat_id)?))
}

/// POST /chats/{chat_id}/messages
async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<String>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    info!(chat_id, use_rag = request.use_rag, "received message");

    let reply = state
        .orchestrator
        .send_message(&chat_id, &request.message, request.use_rag)
        .await?;
    Ok(Json(reply))
}
