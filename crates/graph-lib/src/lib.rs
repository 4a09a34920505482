//! Context graph library for Kubernetes clusters
//!
//! This crate provides the core functionality for:
//! - Fetching raw cluster, node and runtime records
//! - Wrapping records into uniform resources with stable ids
//! - Content-addressed caching with per-key locking
//! - Concurrent snapshot collection over a bounded worker pool
//! - Relation inference between resources
//! - Health checks and observability

pub mod cache;
pub mod clock;
pub mod collector;
pub mod error;
pub mod fetcher;
pub mod graph;
pub mod health;
pub mod identity;
pub mod models;
pub mod observability;
pub mod relations;
pub mod state;

#[cfg(test)]
mod test_support;

pub use error::{FetchError, GraphError, IdentityError};
pub use graph::GraphService;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{CollectorMetrics, SnapshotLogger};
pub use state::{CollectorConfig, GraphState};
