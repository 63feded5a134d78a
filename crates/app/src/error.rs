use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ragchat_core::ChatError;
use serde_json::json;
use tracing::error;

pub const PROCESSING_FAILED: &str =
    "PDF uploaded but processing failed. Check server logs for details.";

/// Error body returned by every handler: `{"success": false, "error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::NotFound(what) => Self {
                status: StatusCode::NOT_FOUND,
                message: format!("{} not found", capitalize(&what)),
            },
            ChatError::InvalidInput(message) => Self::bad_request(message),
            ChatError::Processing(source) => {
                error!(error = %source, "pdf processing failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: PROCESSING_FAILED.to_string(),
                }
            }
            other => {
                error!(error = %other, "request failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: other.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
