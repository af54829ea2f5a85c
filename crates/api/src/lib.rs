//! HTTP API server for Chiron.
//!
//! This crate exposes the analysis pipeline to external clients via
//! HTTP, with both batch and streaming endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /analyze` - Run the pipeline, one JSON envelope back
//! - `POST /analyze/stream` - Same pipeline, answer streamed over SSE
//!
//! Every endpoint is also mounted under `/api` for clients that expect
//! a path prefix.
//!
//! # Architecture
//!
//! ```text
//! Client (editor plugin, web UI)
//!    │
//!    ▼
//! ┌─────────────────┐
//! │   API Server    │ ◄── This crate
//! │     (Axum)      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Pipeline     │
//! │ (classify, then │
//! │  task agents)   │
//! └─────────────────┘
//! ```

pub mod routes;
pub mod state;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use state::AppState;

/// Create the API router with all routes configured.
///
/// `cors_origins` of `None` (or a list containing `"*"`) allows any
/// origin.
pub fn create_router(state: Arc<AppState>, cors_origins: Option<Vec<String>>) -> Router {
    let cors = cors_layer(cors_origins);

    Router::new()
        // Health check
        .route("/health", get(routes::health))
        // Analysis endpoints
        .route("/analyze", post(routes::analyze))
        .route("/analyze/stream", post(routes::analyze_stream))
        // Prefixed aliases
        .route("/api/health", get(routes::health))
        .route("/api/analyze", post(routes::analyze))
        .route("/api/analyze/stream", post(routes::analyze_stream))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(cors_origins: Option<Vec<String>>) -> CorsLayer {
    match cors_origins {
        Some(origins) if !origins.iter().any(|origin| origin == "*") => {
            let parsed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(origin = %origin, "Ignoring unparseable CORS origin");
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parsed))
                .allow_methods(Any)
                .allow_headers(Any)
        }
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    }
}

/// Start the API server on the given address.
pub async fn serve(
    state: Arc<AppState>,
    addr: SocketAddr,
    cors_origins: Option<Vec<String>>,
) -> anyhow::Result<()> {
    let router = create_router(state, cors_origins);

    info!(%addr, "Starting Chiron API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
