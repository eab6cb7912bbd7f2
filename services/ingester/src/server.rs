//! HTTP server for the ingester service.
//!
//! Provides endpoints for:
//! - `POST /events` - Process a storage-event notification (S3 or SNS-wrapped)
//! - `GET /health` - Health check

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use ingestion::{IngestionError, MergeOutcome, Pipeline};

/// Shared state for the HTTP server.
pub struct ServerState {
    pub pipeline: Pipeline,
}

/// Result of one scene named in an event.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EventOutcome {
    Inserted { location: String },
    AlreadyExists { key: String },
}

/// Response body for /events.
#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub success: bool,
    pub message: String,
    pub outcomes: Vec<EventOutcome>,
}

impl EventResponse {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            message,
            outcomes: Vec::new(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

fn status_for(err: &IngestionError) -> StatusCode {
    match err {
        IngestionError::Parse(_) | IngestionError::MissingField(_) => StatusCode::BAD_REQUEST,
        IngestionError::FetchNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// POST /events - Process a storage-event notification
async fn events_handler(
    Extension(state): Extension<Arc<ServerState>>,
    body: String,
) -> impl IntoResponse {
    info!(size = body.len(), "Received storage event");

    match state.pipeline.handle_event(&body).await {
        Ok(outcomes) => {
            let outcomes: Vec<EventOutcome> = outcomes
                .into_iter()
                .filter_map(|outcome| match outcome {
                    MergeOutcome::Inserted { location } => Some(EventOutcome::Inserted { location }),
                    MergeOutcome::AlreadyExists { key } => Some(EventOutcome::AlreadyExists { key }),
                    MergeOutcome::Failed { .. } => None,
                })
                .collect();
            let inserted = outcomes
                .iter()
                .filter(|o| matches!(o, EventOutcome::Inserted { .. }))
                .count();

            let response = EventResponse {
                success: true,
                message: format!("Processed {} scenes, {} inserted", outcomes.len(), inserted),
                outcomes,
            };
            (StatusCode::OK, Json(response))
        }
        Err(e) => {
            error!(error = %e, "Event processing failed");
            (
                status_for(&e),
                Json(EventResponse::failure(format!("Event processing failed: {}", e))),
            )
        }
    }
}

/// GET /health - Health check
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "landsat-stac".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Build the HTTP router.
pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/events", post(events_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}

/// Start the HTTP server.
pub async fn start_server(state: Arc<ServerState>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting ingester HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
