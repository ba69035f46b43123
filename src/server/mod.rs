//! HTTP API server for corral.
//!
//! Exposes the chat endpoint backed by the admission queue, queue
//! introspection endpoints, and interactive API documentation.
//!
//! # Example
//!
//! ```bash
//! # Start the gateway
//! corral serve --port 8080
//!
//! # Ask something
//! curl -X POST http://localhost:8080/api/chat \
//!   -H 'content-type: application/json' \
//!   -d '{"query": "weather in Berlin"}'
//!
//! # View API documentation
//! open "http://localhost:8080/docs"
//! ```

pub mod error;
pub mod handlers;
pub mod openapi;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get, routing::post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::error::{CorralError, Result};
use crate::processor::QueryProcessor;
use crate::queue::QueueManager;

/// Shared application state.
pub struct AppState {
    /// The admission queue fronting all query processing.
    pub queue: Arc<QueueManager>,
    /// The workflow behind the queue, for the status endpoint.
    pub processor: Arc<dyn QueryProcessor>,
}

/// Server configuration.
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

/// Build the API router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/chat", post(handlers::chat))
        .route("/queue/status", get(handlers::queue_status))
        .route("/queue/stats", get(handlers::queue_stats))
        .route("/workflow/status", get(handlers::workflow_status));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api_routes)
        .merge(Scalar::with_url("/docs", openapi::ApiDoc::openapi()))
        .route(
            "/openapi.json",
            get(|| async { axum::Json(openapi::ApiDoc::openapi()) }),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .max_age(Duration::from_secs(3600)),
        )
        .with_state(state)
}

/// Start the API server; returns after a shutdown signal.
pub async fn run_server(config: &ServerConfig, state: Arc<AppState>) -> Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(CorralError::Io)?;

    info!(addr = %addr, "HTTP server listening");
    eprintln!("corral listening on http://{}", addr);
    eprintln!("API documentation: http://{}/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(CorralError::Io)?;

    info!("HTTP server stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
