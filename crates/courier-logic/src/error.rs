use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use courier_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Push RPC failed: {0}")]
    Push(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage unavailable".to_string())
            }
            ServerError::Push(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
