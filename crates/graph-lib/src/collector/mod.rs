//! Concurrent resource collection
//!
//! One snapshot fans out a fetch task per (resource type, scope) pair over
//! the shared worker pool, wraps and caches what comes back and merges the
//! results into a single de-duplicated resource list. Node-scoped types get
//! one task per Node found in the first phase.

mod wrapping;

#[cfg(test)]
mod tests;

pub use wrapping::{cluster_resource, wrap_records};

use crate::cache::UpsertOutcome;
use crate::error::{FetchError, GraphError};
use crate::health::components;
use crate::models::{ResourceType, WrappedResource};
use crate::state::GraphState;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::debug;

/// One unit of fetch work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub kind: ResourceType,
    /// Node id for node-scoped kinds
    pub scope: Option<String>,
}

impl FetchTask {
    pub fn cluster_wide(kind: ResourceType) -> Self {
        Self { kind, scope: None }
    }

    pub fn on_node(kind: ResourceType, node_id: impl Into<String>) -> Self {
        Self {
            kind,
            scope: Some(node_id.into()),
        }
    }

    /// Lock key of this task, e.g. `Pod` or `Container@node-1`
    pub fn key(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}@{}", self.kind, scope),
            None => self.kind.to_string(),
        }
    }
}

impl fmt::Display for FetchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// A fetch task that failed
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub task: FetchTask,
    pub error: String,
}

/// Result of running one task
#[derive(Debug)]
struct TaskOutcome {
    task: FetchTask,
    resources: Vec<WrappedResource>,
    unchanged: usize,
    error: Option<FetchError>,
}

/// Resources of one collection cycle and the window they were fetched in
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub collection_start: String,
    pub collection_end: String,
    pub resources: Vec<WrappedResource>,
    pub failures: Vec<FetchFailure>,
}

/// Fans fetch tasks out over the worker pool
#[derive(Clone)]
pub struct Collector {
    state: Arc<GraphState>,
}

impl Collector {
    pub fn new(state: Arc<GraphState>) -> Self {
        Self { state }
    }

    /// Collect every resource kind
    pub async fn collect_all(&self) -> Result<Snapshot, GraphError> {
        self.collect(&ResourceType::ALL).await
    }

    /// Collect the given kinds.
    ///
    /// Nodes are always fetched when a node-scoped kind or the Cluster is
    /// requested, but only reported when requested themselves. Failed fetch
    /// tasks contribute no resources and are listed in `failures`.
    pub async fn collect(&self, kinds: &[ResourceType]) -> Result<Snapshot, GraphError> {
        let wants = |kind: ResourceType| kinds.contains(&kind);
        let needs_nodes = wants(ResourceType::Node)
            || wants(ResourceType::Cluster)
            || kinds.iter().any(ResourceType::is_node_scoped);

        let collection_start = self.state.clock.now();

        // Phase 1: cluster-wide kinds, including the Nodes that scope phase 2
        let first_phase: Vec<FetchTask> = ResourceType::FETCHED
            .into_iter()
            .filter(|kind| !kind.is_node_scoped())
            .filter(|&kind| wants(kind) || (kind == ResourceType::Node && needs_nodes))
            .map(FetchTask::cluster_wide)
            .collect();
        let mut outcomes = self.run_tasks(first_phase).await?;

        let nodes: Vec<WrappedResource> = outcomes
            .iter()
            .filter(|outcome| outcome.task.kind == ResourceType::Node)
            .flat_map(|outcome| outcome.resources.iter().cloned())
            .collect();

        // Phase 2: node-scoped kinds, one task per known node
        let second_phase: Vec<FetchTask> = ResourceType::FETCHED
            .into_iter()
            .filter(|kind| kind.is_node_scoped() && wants(*kind))
            .flat_map(|kind| nodes.iter().map(move |node| FetchTask::on_node(kind, node.id.clone())))
            .collect();
        outcomes.extend(self.run_tasks(second_phase).await?);

        let mut cluster = None;
        if wants(ResourceType::Cluster) {
            let resource = cluster_resource(
                self.state.config.cluster_name.as_deref(),
                &nodes,
                &self.state.clock.now(),
                &self.state.config.created_by,
            );
            let (stored, _) = self.state.cache.upsert(resource).await;
            cluster = Some(stored);
        }

        let snapshot = self.merge(kinds, cluster, outcomes, collection_start).await;

        self.state.metrics.set_cache_entries(self.state.cache.len());
        Ok(snapshot)
    }

    /// Merge task results into the snapshot order: by kind, then by dispatch
    /// order, first occurrence of an id winning
    async fn merge(
        &self,
        kinds: &[ResourceType],
        cluster: Option<WrappedResource>,
        outcomes: Vec<TaskOutcome>,
        collection_start: String,
    ) -> Snapshot {
        let mut by_kind: BTreeMap<ResourceType, Vec<WrappedResource>> = BTreeMap::new();
        let mut fetch_results: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        let mut failures = Vec::new();
        let mut unchanged = 0;

        if let Some(cluster) = cluster {
            by_kind.entry(ResourceType::Cluster).or_default().push(cluster);
        }

        for outcome in outcomes {
            let counts = fetch_results
                .entry(components::for_kind(outcome.task.kind))
                .or_default();
            counts.0 += 1;
            unchanged += outcome.unchanged;

            if let Some(error) = outcome.error {
                counts.1 += 1;
                self.state.metrics.inc_fetch_failures(outcome.task.kind);
                self.state.logger.log_fetch_failure(
                    outcome.task.kind,
                    outcome.task.scope.as_deref(),
                    &error.to_string(),
                );
                failures.push(FetchFailure {
                    task: outcome.task,
                    error: error.to_string(),
                });
                continue;
            }

            if kinds.contains(&outcome.task.kind) {
                by_kind
                    .entry(outcome.task.kind)
                    .or_default()
                    .extend(outcome.resources);
            }
        }

        let mut resources = Vec::new();
        for kind in ResourceType::ALL {
            let mut seen = HashSet::new();
            for resource in by_kind.remove(&kind).unwrap_or_default() {
                if seen.insert(resource.id.clone()) {
                    resources.push(resource);
                }
            }
        }

        self.state.health.record_fetch_results(&fetch_results).await;
        self.state.metrics.inc_unchanged_upserts(unchanged);

        Snapshot {
            collection_start,
            collection_end: self.state.clock.now(),
            resources,
            failures,
        }
    }

    /// Run tasks on the worker pool and return their outcomes in dispatch
    /// order. Sequential configurations run them one by one. Every task runs
    /// in its own tokio task so a panicking fetcher surfaces as
    /// [`GraphError::TaskPanicked`] in both modes.
    async fn run_tasks(&self, tasks: Vec<FetchTask>) -> Result<Vec<TaskOutcome>, GraphError> {
        if self.state.config.sequential() {
            let mut outcomes = Vec::with_capacity(tasks.len());
            for task in tasks {
                let handle = tokio::spawn(run_task(self.state.clone(), task));
                outcomes.push(handle.await??);
            }
            return Ok(outcomes);
        }

        let count = tasks.len();
        let mut set = JoinSet::new();
        for (index, task) in tasks.into_iter().enumerate() {
            let state = self.state.clone();
            set.spawn(async move { (index, run_task(state, task).await) });
        }

        let mut slots: Vec<Option<TaskOutcome>> = (0..count).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            let (index, outcome) = joined?;
            slots[index] = Some(outcome?);
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

/// Fetch, wrap and cache one (kind, scope) pair.
///
/// Only a closed worker pool is an error here; fetch and payload problems
/// are reported in the outcome.
async fn run_task(state: Arc<GraphState>, task: FetchTask) -> Result<TaskOutcome, GraphError> {
    let _permit = state.workers.clone().acquire_owned().await?;
    let _key = state.cache.lock_key(&task.key()).await;

    let started = Instant::now();
    let fetched = state.fetcher.fetch(task.kind, task.scope.as_deref()).await;
    state
        .metrics
        .observe_fetch_latency(started.elapsed().as_secs_f64());

    let fetch_time = state.clock.now();
    let wrapped = fetched.and_then(|records| {
        wrap_records(task.kind, records, &fetch_time, &state.config.created_by)
    });

    let wrapped = match wrapped {
        Ok(wrapped) => wrapped,
        Err(error) => {
            return Ok(TaskOutcome {
                task,
                resources: Vec::new(),
                unchanged: 0,
                error: Some(error),
            })
        }
    };

    let mut resources = Vec::with_capacity(wrapped.len());
    let mut unchanged = 0;
    for resource in wrapped {
        let (stored, outcome) = state.cache.upsert(resource).await;
        if outcome == UpsertOutcome::Refreshed {
            unchanged += 1;
        }
        resources.push(stored);
    }

    debug!(task = %task, count = resources.len(), unchanged, "Fetch task complete");

    Ok(TaskOutcome {
        task,
        resources,
        unchanged,
        error: None,
    })
}
