//! Broker errors and their JSON responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Broker server error.
#[derive(Debug, thiserror::Error)]
pub enum BrokerServerError {
    #[error("Authorization code required")]
    MissingCode,
    #[error("{context}: {message}")]
    IdentityProvider {
        /// Response `error` field.
        context: &'static str,
        /// Provider's `error_description`, or a generic message.
        message: String,
    },
    #[error("API endpoint not found")]
    NotFound,
}

impl IntoResponse for BrokerServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::MissingCode => (StatusCode::BAD_REQUEST, json!({ "error": self.to_string() })),
            Self::IdentityProvider { context, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": context, "message": message }),
            ),
            Self::NotFound => (StatusCode::NOT_FOUND, json!({ "error": self.to_string() })),
        };
        (status, Json(body)).into_response()
    }
}
