//! OpenAPI specification for the corral API.

use utoipa::OpenApi;

use super::error::ApiErrorBody;
use super::handlers;
use super::types::*;
use crate::processor::ChatResponse;
use crate::queue::QueueStats;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "corral API",
        description = "Agent chat gateway with a bounded admission queue. Queries are routed to tools through a co-resident JSON-RPC tool server.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        handlers::chat,
        handlers::health,
        handlers::queue_status,
        handlers::queue_stats,
        handlers::workflow_status,
    ),
    components(schemas(
        ChatRequest,
        ChatMessage,
        ChatResponse,
        HealthResponse,
        QueueStatusResponse,
        QueueStatsResponse,
        QueueStats,
        WorkflowStatusResponse,
        ApiErrorBody,
    )),
    tags(
        (name = "chat", description = "Query processing"),
        (name = "queue", description = "Admission queue introspection"),
        (name = "workflow", description = "Agent workflow status"),
        (name = "health", description = "Health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("/api/chat"));
        assert!(json.contains("/api/queue/stats"));
        assert!(json.contains("/api/workflow/status"));
    }
}
