//! HTTP API for graph queries, health checks and Prometheus metrics

use crate::SERVER_VERSION;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use graph_lib::{
    health::HealthRegistry,
    ContextGraph, GraphError, GraphService, ResourceType,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

const HELP: &str = "\
Context graph of the cluster

GET /cluster                      resources and relations
GET /cluster/resources            all resources
GET /cluster/resources/<type>     nodes, services, rcontrollers, pods,
                                  containers, processes or images
GET /debug                        the full graph in Graphviz DOT
GET /version                      server version
GET /healthz, /readyz, /metrics   operational endpoints
";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub graph: GraphService,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(graph: GraphService) -> Self {
        let health_registry = graph.state().health.clone();
        Self {
            graph,
            health_registry,
        }
    }
}

/// Error body shared by every failing endpoint
pub enum ApiError {
    Graph(GraphError),
    NotFound(String),
}

impl From<GraphError> for ApiError {
    fn from(e: GraphError) -> Self {
        Self::Graph(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Graph(e) => {
                error!(error = %e, "Snapshot failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
        };
        (
            status,
            Json(json!({"success": false, "error_message": message})),
        )
            .into_response()
    }
}

async fn help() -> &'static str {
    HELP
}

async fn full_graph(State(state): State<Arc<AppState>>) -> Result<Json<ContextGraph>, ApiError> {
    Ok(Json(state.graph.get_full_graph().await?))
}

async fn resources(State(state): State<Arc<AppState>>) -> Result<Json<ContextGraph>, ApiError> {
    Ok(Json(state.graph.get_resources().await?))
}

async fn resources_of(
    State(state): State<Arc<AppState>>,
    Path(segment): Path<String>,
) -> Result<Json<ContextGraph>, ApiError> {
    let kind = ResourceType::from_path_segment(&segment)
        .ok_or_else(|| ApiError::NotFound(format!("unknown resource type: {}", segment)))?;
    Ok(Json(state.graph.get_resources_of(kind).await?))
}

async fn debug_graph(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let graph = state.graph.get_full_graph().await?;
    Ok((
        StatusCode::OK,
        [("content-type", "text/vnd.graphviz; charset=utf-8")],
        graph.to_dot(),
    )
        .into_response())
}

async fn version() -> impl IntoResponse {
    Json(json!({"success": true, "version": SERVER_VERSION}))
}

/// Health check response - 200 while partial snapshots can still be served
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = if health.status.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(help))
        .route("/cluster", get(full_graph))
        .route("/cluster/resources", get(resources))
        .route("/cluster/resources/:kind", get(resources_of))
        .route("/debug", get(debug_graph))
        .route("/version", get(version))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
