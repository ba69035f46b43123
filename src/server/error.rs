//! API error handling.
//!
//! Maps the core error taxonomy onto HTTP statuses: saturation and lifecycle
//! failures are 503, deadline and cancellation failures are 408, tool
//! transport failures are 502, and everything else is 500. The debug detail
//! goes verbatim into the `details` field.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::CorralError;

/// API error response body.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ApiErrorBody {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// API error type that converts to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// Create a 408 Request Timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::REQUEST_TIMEOUT, "REQUEST_TIMEOUT", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.message,
            code: self.code,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CorralError> for ApiError {
    fn from(err: CorralError) -> Self {
        let status = match &err {
            CorralError::QueueFull(_)
            | CorralError::NoWorkerAvailable(_)
            | CorralError::NotRunning
            | CorralError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
            CorralError::ProcessingTimeout(_) | CorralError::Cancelled => {
                StatusCode::REQUEST_TIMEOUT
            }
            CorralError::Tool { .. }
            | CorralError::ConnectionClosed
            | CorralError::StartupFailed(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &err {
            CorralError::QueueFull(_) | CorralError::NoWorkerAvailable(_) => {
                "Service temporarily unavailable, please try again later"
            }
            CorralError::NotRunning | CorralError::Shutdown => "Service is currently unavailable",
            CorralError::ProcessingTimeout(_) => "Request timeout, please try again",
            CorralError::Cancelled => "Request was cancelled or timed out",
            CorralError::Tool { .. } | CorralError::ConnectionClosed => "Tool execution failed",
            _ => "Internal server error",
        };

        Self {
            status,
            code: err.code().to_string(),
            message: message.to_string(),
            details: Some(err.to_string()),
        }
    }
}
