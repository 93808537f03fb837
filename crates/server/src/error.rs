use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway::{DialogueError, IngestError};
use serde::{Deserialize, Serialize};

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Payload too large: max {0}MB allowed")]
    PayloadTooLarge(usize),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Not found")]
    NotFound,
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ServerError {
    /// Get HTTP status code for this error
    fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::ServiceUnavailable(_)
            | ServerError::Storage(_)
            | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    fn error_code(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ServerError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ServerError::Storage(_) => "STORAGE_ERROR",
            ServerError::Internal(_) => "INTERNAL_ERROR",
            ServerError::NotFound => "NOT_FOUND",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<DialogueError> for ServerError {
    fn from(err: DialogueError) -> Self {
        if err.is_client_error() {
            ServerError::BadRequest("Invalid request".to_string())
        } else {
            ServerError::ServiceUnavailable("RAG Service unavailable".to_string())
        }
    }
}

impl From<IngestError> for ServerError {
    fn from(_: IngestError) -> Self {
        ServerError::Storage("Failed to create upload directory".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway::AnswerError;

    #[test]
    fn dialogue_errors_map_to_client_and_server_statuses() {
        let bad: ServerError = DialogueError::EmptyMessage.into();
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(bad.to_string(), "Invalid request");

        let down: ServerError = DialogueError::Unavailable(AnswerError::Cancelled).into();
        assert_eq!(down.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(down.error_code(), "SERVICE_UNAVAILABLE");
    }

    #[test]
    fn storage_failure_is_internal() {
        let err: ServerError = IngestError::StorageUnavailable {
            path: "/nowhere".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "STORAGE_ERROR");
    }
}
