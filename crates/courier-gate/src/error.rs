use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use courier_shared::CodecError;

#[derive(Debug, Error)]
pub enum GateError {
    /// Malformed frame or body from the client.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The routing RPC to the logic tier failed.
    #[error("Routing RPC failed: {0}")]
    Rpc(#[from] reqwest::Error),

    /// The hub task has stopped.
    #[error("Connection hub is not running")]
    HubClosed,

    /// The session's outbound queue was closed.
    #[error("Session closed")]
    SessionClosed,
}

impl GateError {
    /// Whether this error means the client stream itself is unusable.
    pub fn is_transport_fault(&self) -> bool {
        matches!(self, GateError::Codec(_) | GateError::SessionClosed)
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = match &self {
            GateError::HubClosed => StatusCode::SERVICE_UNAVAILABLE,
            GateError::Codec(_) => StatusCode::BAD_REQUEST,
            GateError::Rpc(_) | GateError::SessionClosed => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
