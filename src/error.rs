//! Error types for corral.

use std::time::Duration;
use thiserror::Error;

/// Main error type for corral.
///
/// Variants map one-to-one onto the classification surfaced to HTTP callers;
/// errors are classified at the boundary where they first become unambiguous
/// and passed through unchanged. Nothing is retried inside the core.
#[derive(Error, Debug)]
pub enum CorralError {
    #[error("request queue is full, timeout after {0:?}")]
    QueueFull(Duration),

    #[error("no available workers, timeout after {0:?}")]
    NoWorkerAvailable(Duration),

    #[error("request timeout after {0:?}")]
    ProcessingTimeout(Duration),

    #[error("request was cancelled")]
    Cancelled,

    #[error("queue manager is not running")]
    NotRunning,

    #[error("queue manager is already running")]
    AlreadyRunning,

    #[error("queue manager is shutting down")]
    Shutdown,

    #[error("tool server error {code}: {message}")]
    Tool { code: i64, message: String },

    #[error("tool server connection closed")]
    ConnectionClosed,

    #[error("tool server startup failed: {0}")]
    StartupFailed(String),

    #[error("query processor failed: {0}")]
    Processor(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CorralError {
    /// Stable machine-readable code for the HTTP error body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::QueueFull(_) => "QUEUE_FULL",
            Self::NoWorkerAvailable(_) => "NO_WORKER_AVAILABLE",
            Self::ProcessingTimeout(_) => "PROCESSING_TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::NotRunning => "NOT_RUNNING",
            Self::AlreadyRunning => "ALREADY_RUNNING",
            Self::Shutdown => "SHUTDOWN",
            Self::Tool { .. } => "TOOL_ERROR",
            Self::ConnectionClosed => "CONNECTION_CLOSED",
            Self::StartupFailed(_) => "STARTUP_FAILED",
            Self::Processor(_) => "PROCESSOR_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Http(_) => "HTTP_ERROR",
        }
    }
}

/// Result type alias for corral operations.
pub type Result<T> = std::result::Result<T, CorralError>;
