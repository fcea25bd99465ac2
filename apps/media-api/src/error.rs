//! Error types for the Media API.
//!
//! Every error leaves the service as `{"error": "..."}` with a matching
//! status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use puesto_inventory::InventoryError;
use serde_json::json;

/// Media API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("El body no es JSON válido")]
    InvalidJson,

    #[error("Falta el publicId")]
    MissingPublicId,

    #[error("Método no permitido")]
    MethodNotAllowed,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    MediaHost(String),
}

impl From<InventoryError> for ApiError {
    fn from(error: InventoryError) -> Self {
        match error {
            InventoryError::Media(message) => ApiError::MediaHost(message),
            other if other.is_validation() => ApiError::BadRequest(other.to_string()),
            other => ApiError::MediaHost(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidJson | ApiError::MissingPublicId | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::MediaHost(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Result type alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;
