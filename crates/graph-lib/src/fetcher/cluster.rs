//! Routing fetcher combining the Kubernetes API and the container runtime

use super::ResourceFetcher;
use crate::error::FetchError;
use crate::models::ResourceType;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Sends cluster-wide kinds to one fetcher and node-scoped kinds to another
pub struct ClusterFetcher {
    cluster_wide: Arc<dyn ResourceFetcher>,
    node_scoped: Arc<dyn ResourceFetcher>,
}

impl ClusterFetcher {
    pub fn new(cluster_wide: Arc<dyn ResourceFetcher>, node_scoped: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            cluster_wide,
            node_scoped,
        }
    }
}

#[async_trait]
impl ResourceFetcher for ClusterFetcher {
    async fn fetch(&self, kind: ResourceType, scope: Option<&str>) -> Result<Vec<Value>, FetchError> {
        if kind.is_node_scoped() {
            self.node_scoped.fetch(kind, scope).await
        } else {
            self.cluster_wide.fetch(kind, scope).await
        }
    }
}
