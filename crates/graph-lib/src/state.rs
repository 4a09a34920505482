//! Long-lived collector state
//!
//! Everything that outlives a single snapshot request lives here: the
//! resource cache, the worker pool, the data sources and the health and
//! metrics handles. It is built once at startup and shared by reference.

use crate::cache::ResourceCache;
use crate::clock::{Clock, SystemClock};
use crate::fetcher::ResourceFetcher;
use crate::health::{components, HealthRegistry};
use crate::observability::{CollectorMetrics, SnapshotLogger};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Default worker pool size
const DEFAULT_NUM_WORKERS: usize = 8;

/// Default value of the `createdBy` annotation
pub const DEFAULT_CREATED_BY: &str = "context-graph-collector";

/// Collector configuration
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Size of the fetch worker pool
    pub num_workers: usize,
    /// Deterministic mode: fetch tasks run one at a time in dispatch order
    pub testing: bool,
    /// Overrides the cluster name derived from node identifiers
    pub cluster_name: Option<String>,
    /// Value of the `createdBy` annotation on every resource and relation
    pub created_by: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            num_workers: DEFAULT_NUM_WORKERS,
            testing: false,
            cluster_name: None,
            created_by: DEFAULT_CREATED_BY.to_string(),
        }
    }
}

impl CollectorConfig {
    /// Effective worker pool size; testing forces a single worker
    pub fn pool_size(&self) -> usize {
        if self.testing {
            1
        } else {
            self.num_workers.max(1)
        }
    }

    /// True when fetch tasks must run strictly in sequence
    pub fn sequential(&self) -> bool {
        self.pool_size() == 1
    }
}

/// Process-wide collector state
pub struct GraphState {
    pub config: CollectorConfig,
    pub cache: ResourceCache,
    pub workers: Arc<Semaphore>,
    pub fetcher: Arc<dyn ResourceFetcher>,
    pub clock: Arc<dyn Clock>,
    pub health: HealthRegistry,
    pub metrics: CollectorMetrics,
    pub logger: SnapshotLogger,
}

impl GraphState {
    pub fn builder() -> GraphStateBuilder {
        GraphStateBuilder::new()
    }
}

/// Builder for [`GraphState`]
pub struct GraphStateBuilder {
    fetcher: Option<Arc<dyn ResourceFetcher>>,
    clock: Arc<dyn Clock>,
    health: Option<HealthRegistry>,
    config: CollectorConfig,
}

impl GraphStateBuilder {
    pub fn new() -> Self {
        Self {
            fetcher: None,
            clock: Arc::new(SystemClock),
            health: None,
            config: CollectorConfig::default(),
        }
    }

    /// Set the resource fetcher
    pub fn fetcher(mut self, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set the clock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share an existing health registry
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: CollectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the worker pool size
    pub fn num_workers(mut self, num_workers: usize) -> Self {
        self.config.num_workers = num_workers;
        self
    }

    /// Enable or disable deterministic sequential execution
    pub fn testing(mut self, testing: bool) -> Self {
        self.config.testing = testing;
        self
    }

    /// Override the derived cluster name
    pub fn cluster_name(mut self, name: impl Into<String>) -> Self {
        self.config.cluster_name = Some(name.into());
        self
    }

    /// Build the state and register the data-source health components
    pub async fn build(self) -> Result<Arc<GraphState>> {
        let fetcher = self
            .fetcher
            .ok_or_else(|| anyhow::anyhow!("Fetcher is required"))?;

        let health = self.health.unwrap_or_default();
        health.register(components::KUBERNETES).await;
        health.register(components::CONTAINER_RUNTIME).await;

        let workers = Arc::new(Semaphore::new(self.config.pool_size()));
        let logger = SnapshotLogger::new(self.config.created_by.clone());

        Ok(Arc::new(GraphState {
            config: self.config,
            cache: ResourceCache::new(),
            workers,
            fetcher,
            clock: self.clock,
            health,
            metrics: CollectorMetrics::new(),
            logger,
        }))
    }
}

impl Default for GraphStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
