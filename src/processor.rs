//! The query-processor contract between the admission core and the agent.
//!
//! The core never introspects an implementation; its only obligations are to
//! honor the cancellation token and to return within a bounded time (the
//! manager's processing timeout is the authoritative bound).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Response produced for a single chat query.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ChatResponse {
    /// Final answer text.
    pub response: String,
    /// When the response was produced.
    pub timestamp: DateTime<Utc>,
    /// Whether processing succeeded end to end.
    pub success: bool,
    /// Error detail when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    /// A successful response with the current timestamp.
    pub fn ok(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            timestamp: Utc::now(),
            success: true,
            error: None,
        }
    }

    /// A degraded response: the query was processed but the agent could not
    /// complete it. Served as HTTP 200 with `success: false`; only
    /// queue/transport-level failures become HTTP error statuses.
    pub fn error(response: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            timestamp: Utc::now(),
            success: false,
            error: Some(detail.into()),
        }
    }
}

/// Health/status snapshot reported by a processor implementation.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ProcessorStatus {
    /// Current pipeline step ("ready" when idle).
    pub step: String,
    /// Whether the downstream tool transport is healthy.
    pub tools_healthy: bool,
    /// Implementation-defined capabilities payload.
    pub capabilities: serde_json::Value,
}

/// Maps a query string to a response, possibly invoking downstream tools.
#[async_trait]
pub trait QueryProcessor: Send + Sync {
    /// Process one query. Implementations must observe `cancel` promptly.
    async fn process(&self, cancel: CancellationToken, query: &str) -> Result<ChatResponse>;

    /// Report workflow health for the status endpoint.
    async fn status(&self) -> ProcessorStatus;
}
