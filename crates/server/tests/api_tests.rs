//! Integration tests for the server API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use context_graph_server::api::{create_router, AppState};
use graph_lib::{fetcher::FixtureFetcher, health::components, GraphService, GraphState};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

fn testdata_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../graph-lib/testdata")
}

async fn setup_test_app(fixture_dir: PathBuf) -> (Router, Arc<AppState>) {
    let state = GraphState::builder()
        .fetcher(Arc::new(FixtureFetcher::new(fixture_dir)))
        .testing(true)
        .build()
        .await
        .unwrap();
    let app_state = Arc::new(AppState::new(GraphService::new(state)));
    let router = create_router(app_state.clone());

    (router, app_state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn count_of_type(items: &Value, kind: &str) -> usize {
    items
        .as_array()
        .unwrap()
        .iter()
        .filter(|item| item["type"] == kind)
        .count()
}

#[tokio::test]
async fn test_cluster_returns_full_graph() {
    let (app, _state) = setup_test_app(testdata_dir()).await;

    let (status, graph) = get_json(app, "/cluster").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(graph["resources"].as_array().unwrap().len(), 36);
    assert_eq!(count_of_type(&graph["relations"], "contains"), 23);
    assert_eq!(count_of_type(&graph["relations"], "runs"), 10);
    assert_eq!(count_of_type(&graph["relations"], "monitors"), 6);
    assert_eq!(count_of_type(&graph["relations"], "loadBalances"), 7);
    assert_eq!(count_of_type(&graph["relations"], "createdFrom"), 3);
    assert!(graph["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_resources_has_no_relations() {
    let (app, _state) = setup_test_app(testdata_dir()).await;

    let (status, graph) = get_json(app, "/cluster/resources").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(count_of_type(&graph["resources"], "Pod"), 10);
    assert_eq!(count_of_type(&graph["resources"], "ReplicationController"), 3);
    assert!(graph["relations"].as_array().unwrap().is_empty());

    let first = &graph["resources"][0];
    assert_eq!(first["type"], "Cluster");
    assert_eq!(first["annotations"]["createdBy"], "context-graph-collector");
}

#[tokio::test]
async fn test_resources_of_kind() {
    let (app, _state) = setup_test_app(testdata_dir()).await;

    let (status, graph) = get_json(app.clone(), "/cluster/resources/rcontrollers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graph["resources"].as_array().unwrap().len(), 3);

    let (status, graph) = get_json(app, "/cluster/resources/processes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count_of_type(&graph["resources"], "Process"), 7);
    assert_eq!(graph["resources"].as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn test_unknown_kind_returns_404() {
    let (app, _state) = setup_test_app(testdata_dir()).await;

    let (status, body) = get_json(app, "/cluster/resources/volumes").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["error_message"].as_str().unwrap().contains("volumes"));
}

#[tokio::test]
async fn test_debug_renders_dot() {
    let (app, _state) = setup_test_app(testdata_dir()).await;

    let (status, body) = get(app, "/debug").await;
    let dot = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(dot.starts_with("digraph context_graph {"));
    assert!(dot.contains("[label=\"runs\"]"));
    assert!(dot.contains("\"Service:redis-master\" -> \"Pod:redis-master\""));
}

#[tokio::test]
async fn test_version() {
    let (app, _state) = setup_test_app(testdata_dir()).await;

    let (status, body) = get_json(app, "/version").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_help_lists_endpoints() {
    let (app, _state) = setup_test_app(testdata_dir()).await;

    let (status, body) = get(app, "/").await;
    let help = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(help.contains("/cluster/resources"));
}

#[tokio::test]
async fn test_missing_pod_fixture_degrades_health() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["nodes.json", "services.json", "replicationcontrollers.json"] {
        std::fs::copy(testdata_dir().join(name), dir.path().join(name)).unwrap();
    }
    let (app, state) = setup_test_app(dir.path().to_path_buf()).await;

    // A failed fetch still yields a graph
    let (status, graph) = get_json(app.clone(), "/cluster").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count_of_type(&graph["resources"], "Pod"), 0);
    assert_eq!(count_of_type(&graph["resources"], "Node"), 3);
    assert_eq!(count_of_type(&graph["relations"], "runs"), 0);

    let health = state.health_registry.health().await;
    assert_eq!(
        health.components[components::KUBERNETES].status,
        graph_lib::ComponentStatus::Degraded
    );

    let (status, body) = get_json(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn test_readyz_reflects_readiness() {
    let (app, state) = setup_test_app(testdata_dir()).await;

    let (status, body) = get_json(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);

    state.health_registry.set_ready(true).await;
    let (status, body) = get_json(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn test_metrics_after_snapshot() {
    let (app, _state) = setup_test_app(testdata_dir()).await;

    let (status, _) = get(app.clone(), "/cluster").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(app, "/metrics").await;
    let text = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("context_graph_snapshots_total"));
    assert!(text.contains("context_graph_resources"));
}

#[tokio::test]
async fn test_failed_snapshot_returns_error_body() {
    let (app, state) = setup_test_app(testdata_dir()).await;
    state.graph.state().workers.close();

    for uri in ["/cluster", "/cluster/resources", "/cluster/resources/pods"] {
        let (status, json) = get_json(app.clone(), uri).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
        assert_eq!(json["success"], false);
        assert!(json["error_message"]
            .as_str()
            .unwrap()
            .starts_with("worker pool unavailable"));
    }
}
