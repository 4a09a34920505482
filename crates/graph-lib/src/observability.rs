//! Observability infrastructure for the collector
//!
//! Provides:
//! - Prometheus metrics (snapshot and fetch latency, fetch failures, graph sizes, cache size)
//! - Structured JSON logging of snapshot events with tracing

use crate::models::{RelationType, ResourceType};
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, register_int_gauge_vec, Histogram, HistogramVec, IntCounter,
    IntCounterVec, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for snapshot and fetch latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<CollectorMetricsInner> = OnceLock::new();

struct CollectorMetricsInner {
    snapshot_latency_seconds: HistogramVec,
    fetch_latency_seconds: Histogram,
    fetch_failures: IntCounterVec,
    snapshots: IntCounterVec,
    resources: IntGaugeVec,
    relations: IntGaugeVec,
    cache_entries: IntGauge,
    unchanged_upserts: IntCounter,
}

impl CollectorMetricsInner {
    fn new() -> Self {
        Self {
            snapshot_latency_seconds: register_histogram_vec!(
                "context_graph_snapshot_latency_seconds",
                "Time spent assembling one context graph snapshot",
                &["view"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register snapshot_latency_seconds"),

            fetch_latency_seconds: register_histogram!(
                "context_graph_fetch_latency_seconds",
                "Time spent in a single resource fetch",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register fetch_latency_seconds"),

            fetch_failures: register_int_counter_vec!(
                "context_graph_fetch_failures_total",
                "Number of failed resource fetches",
                &["type"]
            )
            .expect("Failed to register fetch_failures_total"),

            snapshots: register_int_counter_vec!(
                "context_graph_snapshots_total",
                "Number of snapshots served",
                &["view"]
            )
            .expect("Failed to register snapshots_total"),

            resources: register_int_gauge_vec!(
                "context_graph_resources",
                "Resources in the latest snapshot",
                &["type"]
            )
            .expect("Failed to register resources"),

            relations: register_int_gauge_vec!(
                "context_graph_relations",
                "Relations in the latest full graph",
                &["type"]
            )
            .expect("Failed to register relations"),

            cache_entries: register_int_gauge!(
                "context_graph_cache_entries",
                "Resource ids held in the cache"
            )
            .expect("Failed to register cache_entries"),

            unchanged_upserts: register_int_counter!(
                "context_graph_unchanged_upserts_total",
                "Fetched resources whose content matched the cached value"
            )
            .expect("Failed to register unchanged_upserts_total"),
        }
    }
}

/// Collector metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct CollectorMetrics {
    _private: (),
}

impl Default for CollectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(CollectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &CollectorMetricsInner {
        GLOBAL_METRICS.get_or_init(CollectorMetricsInner::new)
    }

    pub fn observe_snapshot(&self, view: &str, duration_secs: f64) {
        let inner = self.inner();
        inner
            .snapshot_latency_seconds
            .with_label_values(&[view])
            .observe(duration_secs);
        inner.snapshots.with_label_values(&[view]).inc();
    }

    pub fn observe_fetch_latency(&self, duration_secs: f64) {
        self.inner().fetch_latency_seconds.observe(duration_secs);
    }

    pub fn inc_fetch_failures(&self, kind: ResourceType) {
        self.inner()
            .fetch_failures
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn set_resource_count(&self, kind: ResourceType, count: usize) {
        self.inner()
            .resources
            .with_label_values(&[kind.as_str()])
            .set(count as i64);
    }

    pub fn set_relation_count(&self, kind: RelationType, count: usize) {
        self.inner()
            .relations
            .with_label_values(&[kind.as_str()])
            .set(count as i64);
    }

    pub fn set_cache_entries(&self, count: usize) {
        self.inner().cache_entries.set(count as i64);
    }

    pub fn inc_unchanged_upserts(&self, count: usize) {
        self.inner().unchanged_upserts.inc_by(count as u64);
    }
}

/// Structured logger for collector events
#[derive(Clone)]
pub struct SnapshotLogger {
    instance: String,
}

impl SnapshotLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log a completed snapshot
    pub fn log_snapshot(
        &self,
        view: &str,
        resources: usize,
        relations: usize,
        failed_fetches: usize,
        window: (&str, &str),
    ) {
        if failed_fetches > 0 {
            warn!(
                event = "snapshot_completed",
                instance = %self.instance,
                view = %view,
                resources = resources,
                relations = relations,
                failed_fetches = failed_fetches,
                collection_start = %window.0,
                collection_end = %window.1,
                "Served degraded snapshot"
            );
        } else {
            info!(
                event = "snapshot_completed",
                instance = %self.instance,
                view = %view,
                resources = resources,
                relations = relations,
                collection_start = %window.0,
                collection_end = %window.1,
                "Served snapshot"
            );
        }
    }

    /// Log a failed fetch task
    pub fn log_fetch_failure(&self, kind: ResourceType, scope: Option<&str>, error: &str) {
        warn!(
            event = "fetch_failed",
            instance = %self.instance,
            kind = %kind,
            scope = ?scope,
            error = %error,
            "Fetch failed, continuing without its resources"
        );
    }

    /// Log server startup
    pub fn log_startup(&self, version: &str, port: u16, testing: bool) {
        info!(
            event = "server_started",
            instance = %self.instance,
            version = %version,
            port = port,
            testing = testing,
            "Context graph server started"
        );
    }

    /// Log server shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "server_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Context graph server shutting down"
        );
    }
}
