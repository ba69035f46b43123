//! API request handlers.
//!
//! Each handler is instrumented with `tracing` for structured logging of
//! requests and timing. The chat handler owns the outermost deadline layer:
//! its cancellation token is dropped (and therefore fired) when the client
//! disconnects, and a hard wall-clock cap backstops everything below it.

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, extract::State};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::processor::ChatResponse;

use super::AppState;
use super::error::{ApiError, ApiErrorBody};
use super::types::*;

/// Outer HTTP deadline; the enqueue and processing timeouts below it are
/// configured on the queue.
const CHAT_DEADLINE: Duration = Duration::from_secs(60);

/// Process a chat query through the admission queue.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Query processed", body = ChatResponse),
        (status = 408, description = "Deadline elapsed or caller cancelled", body = ApiErrorBody),
        (status = 502, description = "Tool server failure", body = ApiErrorBody),
        (status = 503, description = "Queue saturated or not running", body = ApiErrorBody),
    ),
    tag = "chat"
)]
#[instrument(skip(state, request), fields(query = %request.query))]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }

    info!(messages = request.messages.len(), "received chat request");

    // Dropping the guard fires the token, so a client disconnect aborts the
    // submission at whichever phase it is in.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match tokio::time::timeout(CHAT_DEADLINE, state.queue.submit(cancel, &request.query)).await {
        Ok(Ok(response)) => Ok(Json(response)),
        Ok(Err(e)) => {
            warn!(error = %e, "chat request failed");
            Err(e.into())
        }
        Err(_elapsed) => {
            warn!("chat request exceeded the outer deadline");
            Err(ApiError::timeout("Request was cancelled or timed out"))
        }
    }
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Server is up", body = HealthResponse)),
    tag = "health"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}

/// Queue health.
#[utoipa::path(
    get,
    path = "/api/queue/status",
    responses((status = 200, description = "Queue health", body = QueueStatusResponse)),
    tag = "queue"
)]
#[instrument(skip(state))]
pub async fn queue_status(State(state): State<Arc<AppState>>) -> Json<QueueStatusResponse> {
    let healthy = state.queue.healthy();
    Json(QueueStatusResponse {
        healthy,
        running: healthy,
        timestamp: Utc::now(),
    })
}

/// Queue statistics snapshot.
#[utoipa::path(
    get,
    path = "/api/queue/stats",
    responses((status = 200, description = "Counter snapshot", body = QueueStatsResponse)),
    tag = "queue"
)]
#[instrument(skip(state))]
pub async fn queue_stats(State(state): State<Arc<AppState>>) -> Json<QueueStatsResponse> {
    Json(QueueStatsResponse {
        stats: state.queue.stats(),
        timestamp: Utc::now(),
    })
}

/// Workflow (query processor) health.
#[utoipa::path(
    get,
    path = "/api/workflow/status",
    responses((status = 200, description = "Workflow status", body = WorkflowStatusResponse)),
    tag = "workflow"
)]
#[instrument(skip(state))]
pub async fn workflow_status(State(state): State<Arc<AppState>>) -> Json<WorkflowStatusResponse> {
    let status = state.processor.status().await;
    Json(WorkflowStatusResponse {
        step: status.step,
        tools_healthy: status.tools_healthy,
        capabilities: status.capabilities,
        timestamp: Utc::now(),
    })
}
