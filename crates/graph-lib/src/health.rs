//! Health tracking for the context graph collector
//!
//! Each data source is a component. A snapshot marks a component degraded
//! when any of its fetch tasks failed and healthy when all succeeded.

use crate::clock::now;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is experiencing issues but still operational
    Degraded,
    /// Component has failed
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component is at least partially operational
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// ISO-8601 time of the last status change
    pub last_check: String,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self::from_fetch_counts(0, 0)
    }

    /// Health of a component after a snapshot that ran `attempted` fetch
    /// tasks against it, `failed` of which failed
    pub fn from_fetch_counts(attempted: usize, failed: usize) -> Self {
        let (status, message) = if failed == 0 {
            (ComponentStatus::Healthy, None)
        } else if failed < attempted {
            (
                ComponentStatus::Degraded,
                Some(format!("{} of {} fetches failed", failed, attempted)),
            )
        } else {
            (
                ComponentStatus::Unhealthy,
                Some(format!("all {} fetches failed", attempted)),
            )
        };
        Self {
            status,
            message,
            last_check: now(),
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Overall status is the worst component status
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|health| health.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    use crate::models::ResourceType;

    /// Control-plane API serving cluster-wide resources
    pub const KUBERNETES: &str = "kubernetes";
    /// Per-node container runtime serving node-scoped resources
    pub const CONTAINER_RUNTIME: &str = "container_runtime";

    /// Component that serves a resource type
    pub fn for_kind(kind: ResourceType) -> &'static str {
        if kind.is_node_scoped() {
            CONTAINER_RUNTIME
        } else {
            KUBERNETES
        }
    }
}

/// Health registry for tracking component health
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::healthy());
    }

    /// Record per-component fetch results of one snapshot.
    ///
    /// `results` maps a component to `(attempted, failed)` task counts.
    /// Components without tasks in this snapshot keep their last status.
    pub async fn record_fetch_results(&self, results: &BTreeMap<&str, (usize, usize)>) {
        let mut components = self.components.write().await;
        for (name, &(attempted, failed)) in results {
            components.insert(
                name.to_string(),
                ComponentHealth::from_fetch_counts(attempted, failed),
            );
        }
    }

    /// Set readiness status
    pub async fn set_ready(&self, ready: bool) {
        let mut r = self.ready.write().await;
        *r = ready;
    }

    /// Get health response
    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Ready once the first snapshot ran and no component is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let reason = if !*self.ready.read().await {
            Some("Collector not yet initialized")
        } else if !self.health().await.status.is_operational() {
            Some("Critical component unhealthy")
        } else {
            None
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason: reason.map(str::to_string),
        }
    }
}
