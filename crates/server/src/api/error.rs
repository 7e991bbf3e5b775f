//! Error responses: `{"error": "...", "code": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::task::JoinError;
use tracing::error;

use loket_core::QueueError;

use crate::metrics::QUEUE_ERRORS_TOTAL;

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

/// An error ready to be sent to the client.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: message.into(),
                code,
            },
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

/// HTTP status for a queue error.
pub fn status_for(err: &QueueError) -> StatusCode {
    match err {
        QueueError::Validation(_) => StatusCode::BAD_REQUEST,
        QueueError::NotFound(_) => StatusCode::NOT_FOUND,
        QueueError::Forbidden(_) => StatusCode::FORBIDDEN,
        QueueError::InvalidState { .. }
        | QueueError::OperatorBusy { .. }
        | QueueError::AlreadyTerminal { .. }
        | QueueError::AlreadyExists(_) => StatusCode::CONFLICT,
        QueueError::Contention { .. } => StatusCode::SERVICE_UNAVAILABLE,
        QueueError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        let status = status_for(&err);
        QUEUE_ERRORS_TOTAL.with_label_values(&[err.code()]).inc();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %err, "Queue operation failed");
        }
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        error!(error = %err, "Blocking store task failed");
        Self::internal("Request could not be completed")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
