//! HTTP route handlers for the API.

use crate::AppState;
use axum::{
    extract::{Json, State},
    response::sse::{Event, KeepAlive, Sse},
};
use chiron_common::{AnalyzeRequest, AnalyzeResponse, StreamEvent};
use futures::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Run the full pipeline and return the batch envelope.
///
/// Always `200 OK`: refusals and task failures are carried inside the
/// envelope, not as HTTP errors.
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Json<AnalyzeResponse> {
    Json(state.pipeline.analyze(&request).await)
}

/// Run the pipeline with the answer streamed as server-sent events.
///
/// Events carry a JSON body of the form `{"type": ..., "data": ...}`;
/// the last event is always `{"type": "end"}`.
pub async fn analyze_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Opening analysis stream");

    let (tx, mut rx) = mpsc::channel(100);
    let worker = state.clone();
    tokio::spawn(async move {
        worker.pipeline.analyze_stream(request, tx).await;
    });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok(encode_event(&event));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn encode_event(event: &StreamEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(payload) => Event::default().data(payload),
        Err(e) => {
            error!(error = %e, "Failed to encode stream event");
            Event::default().data("{}")
        }
    }
}
