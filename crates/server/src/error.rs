use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use library::LibraryError;

/// Service-level error taxonomy. Each variant maps to one HTTP status; the
/// upstream variants carry a truncated detail string for the caller's log
/// rather than the end user.
#[derive(Debug)]
pub enum ServiceError {
    Validation(String),
    NotFound(String),
    Conflict(String),
    Upstream {
        status: Option<u16>,
        message: String,
        details: Option<String>,
    },
    UpstreamTimeout(String),
    Internal(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Validation(message) => write!(f, "{}", message),
            ServiceError::NotFound(message) => write!(f, "{}", message),
            ServiceError::Conflict(message) => write!(f, "{}", message),
            ServiceError::Upstream { status, message, .. } => match status {
                Some(status) => write!(f, "{} (upstream status {})", message, status),
                None => write!(f, "{}", message),
            },
            ServiceError::UpstreamTimeout(message) => write!(f, "{}", message),
            ServiceError::Internal(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<LibraryError> for ServiceError {
    fn from(err: LibraryError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, details) = match &self {
            ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, None),
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            ServiceError::Conflict(_) => (StatusCode::CONFLICT, None),
            ServiceError::Upstream { details, .. } => {
                (StatusCode::BAD_GATEWAY, details.clone())
            }
            ServiceError::UpstreamTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, None),
            ServiceError::Internal(message) => {
                error!("internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };
        let body = ErrorBody {
            error: self.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}
