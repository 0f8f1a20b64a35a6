//! Mapping from engine errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;
use tunecast_core::{EngineError, LibraryError, TranscodeError};

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error with the status it is reported under.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

fn transcode_status(e: &TranscodeError) -> StatusCode {
    match e {
        TranscodeError::InputNotFound { .. } => StatusCode::NOT_FOUND,
        TranscodeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        TranscodeError::Cancelled | TranscodeError::SupervisorUnavailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        TranscodeError::EncoderNotFound { .. }
        | TranscodeError::ProbeNotFound { .. }
        | TranscodeError::ProbeFailed { .. }
        | TranscodeError::Failed { .. } => StatusCode::BAD_GATEWAY,
        TranscodeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        let status = match &e {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Transcode(inner) => transcode_status(inner),
            EngineError::Library(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<TranscodeError> for ApiError {
    fn from(e: TranscodeError) -> Self {
        EngineError::from(e).into()
    }
}

impl From<LibraryError> for ApiError {
    fn from(e: LibraryError) -> Self {
        EngineError::from(e).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request failed with {}: {}", self.status, self.message);
        }
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}
