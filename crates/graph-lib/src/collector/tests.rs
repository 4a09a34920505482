use super::*;
use crate::health::ComponentStatus;
use crate::models::annotation;
use crate::test_support::{fixture_fetcher, fixture_state, FlakyFetcher, PanickingFetcher};
use std::time::Duration;

const NODE_1: &str = "k8s-guestbook-node-1.c.rising-apricot-840.internal";
const NODE_2: &str = "k8s-guestbook-node-2.c.rising-apricot-840.internal";

fn count(snapshot: &Snapshot, kind: ResourceType) -> usize {
    snapshot.resources.iter().filter(|r| r.kind == kind).count()
}

fn assert_reference_counts(snapshot: &Snapshot) {
    assert_eq!(count(snapshot, ResourceType::Cluster), 1);
    assert_eq!(count(snapshot, ResourceType::Node), 3);
    assert_eq!(count(snapshot, ResourceType::Service), 6);
    assert_eq!(count(snapshot, ResourceType::ReplicationController), 3);
    assert_eq!(count(snapshot, ResourceType::Pod), 10);
    assert_eq!(count(snapshot, ResourceType::Container), 4);
    assert_eq!(count(snapshot, ResourceType::Process), 7);
    assert_eq!(count(snapshot, ResourceType::Image), 2);
}

#[test]
fn test_fetch_task_key() {
    assert_eq!(FetchTask::cluster_wide(ResourceType::Pod).key(), "Pod");
    assert_eq!(
        FetchTask::on_node(ResourceType::Container, "node-1").key(),
        "Container@node-1"
    );
}

#[tokio::test]
async fn test_collect_all_reference_cluster() {
    let collector = Collector::new(fixture_state().await);
    let snapshot = collector.collect_all().await.unwrap();

    assert_reference_counts(&snapshot);
    assert!(snapshot.failures.is_empty());
    assert_eq!(snapshot.resources.len(), 36);
}

#[tokio::test]
async fn test_resources_are_ordered_by_kind() {
    let collector = Collector::new(fixture_state().await);
    let snapshot = collector.collect_all().await.unwrap();

    let kinds: Vec<ResourceType> = snapshot.resources.iter().map(|r| r.kind).collect();
    let mut sorted = kinds.clone();
    sorted.sort();
    assert_eq!(kinds, sorted);
    assert_eq!(snapshot.resources[0].kind, ResourceType::Cluster);
    assert_eq!(snapshot.resources[0].id, "guestbook");
}

#[tokio::test]
async fn test_timestamps_within_collection_window() {
    let collector = Collector::new(fixture_state().await);
    let snapshot = collector.collect_all().await.unwrap();

    assert!(snapshot.collection_start <= snapshot.collection_end);
    for resource in &snapshot.resources {
        assert!(
            resource.timestamp >= snapshot.collection_start
                && resource.timestamp <= snapshot.collection_end,
            "{} stamped {} outside [{}, {}]",
            resource.id,
            resource.timestamp,
            snapshot.collection_start,
            snapshot.collection_end
        );
    }
}

#[tokio::test]
async fn test_every_resource_is_annotated() {
    let collector = Collector::new(fixture_state().await);
    let snapshot = collector.collect_all().await.unwrap();

    for resource in &snapshot.resources {
        assert_eq!(
            resource.annotations.get(annotation::CREATED_BY).map(String::as_str),
            Some(crate::state::DEFAULT_CREATED_BY)
        );
        assert!(!resource.label().is_empty());
    }
    let alternate = snapshot
        .resources
        .iter()
        .filter(|r| r.annotations.contains_key(annotation::ALTERNATE_LABEL))
        .count();
    assert_eq!(alternate, 2);
}

#[tokio::test]
async fn test_collect_subset_skips_unrequested_kinds() {
    let collector = Collector::new(fixture_state().await);
    let snapshot = collector.collect(&[ResourceType::Container]).await.unwrap();

    // Nodes are fetched to scope the containers but not reported
    assert_eq!(snapshot.resources.len(), 4);
    assert!(snapshot.resources.iter().all(|r| r.kind == ResourceType::Container));
}

#[tokio::test]
async fn test_collect_pods_only() {
    let collector = Collector::new(fixture_state().await);
    let snapshot = collector.collect(&[ResourceType::Pod]).await.unwrap();
    assert_eq!(count(&snapshot, ResourceType::Pod), 10);
    assert_eq!(snapshot.resources.len(), 10);
}

#[tokio::test]
async fn test_failed_pair_does_not_affect_others() {
    let fetcher = Arc::new(FlakyFetcher::new(
        fixture_fetcher(),
        ResourceType::Process,
        Some(NODE_1),
    ));
    let state = GraphState::builder()
        .fetcher(fetcher)
        .testing(true)
        .build()
        .await
        .unwrap();
    let collector = Collector::new(state.clone());

    let snapshot = collector.collect_all().await.unwrap();

    // Only node-2's processes survive
    assert_eq!(count(&snapshot, ResourceType::Process), 3);
    assert_eq!(count(&snapshot, ResourceType::Container), 4);
    assert_eq!(count(&snapshot, ResourceType::Image), 2);
    assert_eq!(count(&snapshot, ResourceType::Pod), 10);

    assert_eq!(snapshot.failures.len(), 1);
    let failure = &snapshot.failures[0];
    assert_eq!(failure.task, FetchTask::on_node(ResourceType::Process, NODE_1));
    assert!(failure.error.contains("connection refused"));

    let health = state.health.health().await;
    assert_eq!(
        health.components[components::CONTAINER_RUNTIME].status,
        ComponentStatus::Degraded
    );
    assert_eq!(
        health.components[components::KUBERNETES].status,
        ComponentStatus::Healthy
    );
}

#[tokio::test]
async fn test_failed_node_fetch_empties_node_scoped_kinds() {
    let fetcher = Arc::new(FlakyFetcher::new(fixture_fetcher(), ResourceType::Node, None));
    let state = GraphState::builder()
        .fetcher(fetcher)
        .testing(true)
        .build()
        .await
        .unwrap();

    let snapshot = Collector::new(state.clone()).collect_all().await.unwrap();

    assert_eq!(count(&snapshot, ResourceType::Node), 0);
    assert_eq!(count(&snapshot, ResourceType::Container), 0);
    assert_eq!(count(&snapshot, ResourceType::Pod), 10);
    // The cluster is still reported, with an unknown name
    assert_eq!(count(&snapshot, ResourceType::Cluster), 1);

    let health = state.health.health().await;
    assert_eq!(
        health.components[components::KUBERNETES].status,
        ComponentStatus::Degraded
    );
}

#[tokio::test]
async fn test_repeat_snapshot_refreshes_timestamps() {
    let state = fixture_state().await;
    let collector = Collector::new(state.clone());

    let first = collector.collect_all().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    let second = collector.collect_all().await.unwrap();

    assert_eq!(first.resources.len(), second.resources.len());
    assert!(second.collection_start > first.collection_end);
    for resource in &second.resources {
        assert!(resource.timestamp >= second.collection_start);
    }
    assert_eq!(state.cache.len(), 36);
}

#[tokio::test]
async fn test_parallel_pool_matches_sequential_order() {
    let sequential = Collector::new(fixture_state().await)
        .collect_all()
        .await
        .unwrap();

    let state = GraphState::builder()
        .fetcher(fixture_fetcher())
        .num_workers(4)
        .build()
        .await
        .unwrap();
    let parallel = Collector::new(state).collect_all().await.unwrap();

    let ids = |s: &Snapshot| s.resources.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&sequential), ids(&parallel));
}

#[tokio::test]
async fn test_concurrent_snapshots_are_consistent() {
    let fetcher = Arc::new(
        FlakyFetcher::new(fixture_fetcher(), ResourceType::Cluster, None)
            .with_delay(Duration::from_millis(1)),
    );
    let state = GraphState::builder()
        .fetcher(fetcher)
        .num_workers(3)
        .build()
        .await
        .unwrap();
    let collector = Collector::new(state.clone());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let collector = collector.clone();
        handles.push(tokio::spawn(async move { collector.collect_all().await }));
    }

    for handle in handles {
        let snapshot = handle.await.unwrap().unwrap();
        assert_reference_counts(&snapshot);
        for resource in &snapshot.resources {
            assert!(resource.timestamp >= snapshot.collection_start);
            assert!(resource.timestamp <= snapshot.collection_end);
        }
    }
    assert_eq!(state.cache.len(), 36);
}

#[tokio::test]
async fn test_cluster_name_override() {
    let state = GraphState::builder()
        .fetcher(fixture_fetcher())
        .testing(true)
        .cluster_name("prod")
        .build()
        .await
        .unwrap();

    let snapshot = Collector::new(state).collect(&[ResourceType::Cluster]).await.unwrap();
    assert_eq!(snapshot.resources.len(), 1);
    assert_eq!(snapshot.resources[0].id, "prod");
}

async fn panicking_state(kind: ResourceType, testing: bool) -> Arc<GraphState> {
    GraphState::builder()
        .fetcher(Arc::new(PanickingFetcher::new(fixture_fetcher(), kind)))
        .num_workers(4)
        .testing(testing)
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_panicking_fetch_fails_snapshot() {
    let collector = Collector::new(panicking_state(ResourceType::Pod, false).await);
    let result = collector.collect_all().await;
    assert!(matches!(result, Err(GraphError::TaskPanicked(_))));
}

#[tokio::test]
async fn test_panicking_fetch_fails_snapshot_sequentially() {
    let collector = Collector::new(panicking_state(ResourceType::Process, true).await);
    let result = collector.collect_all().await;
    assert!(matches!(result, Err(GraphError::TaskPanicked(_))));
}

#[tokio::test]
async fn test_closed_worker_pool_fails_snapshot() {
    let state = fixture_state().await;
    state.workers.close();

    let result = Collector::new(state).collect_all().await;
    assert!(matches!(result, Err(GraphError::WorkerPool(_))));
}
