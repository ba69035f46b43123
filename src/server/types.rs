//! API request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::queue::QueueStats;

/// One message of conversation history. Accepted for API compatibility;
/// the workflow currently routes on the query alone.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    /// system, user, or assistant.
    pub role: String,
    pub content: String,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChatRequest {
    /// The user's question.
    pub query: String,
    /// Optional conversation history.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// Body of `GET /api/queue/status`.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueueStatusResponse {
    pub healthy: bool,
    pub running: bool,
    pub timestamp: DateTime<Utc>,
}

/// Body of `GET /api/queue/stats`.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueueStatsResponse {
    #[serde(flatten)]
    pub stats: QueueStats,
    pub timestamp: DateTime<Utc>,
}

/// Body of `GET /api/workflow/status`.
#[derive(Debug, Serialize, ToSchema)]
pub struct WorkflowStatusResponse {
    pub step: String,
    pub tools_healthy: bool,
    pub capabilities: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
