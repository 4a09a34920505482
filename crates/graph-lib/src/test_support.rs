//! Shared helpers for unit tests

use crate::error::FetchError;
use crate::fetcher::{FixtureFetcher, ResourceFetcher};
use crate::models::ResourceType;
use crate::state::GraphState;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Recorded reference cluster: 3 nodes, 6 services, 3 controllers,
/// 10 pods, 4 containers, 7 processes and 2 images
pub fn testdata_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata")
}

pub fn fixture_fetcher() -> Arc<dyn ResourceFetcher> {
    Arc::new(FixtureFetcher::new(testdata_dir()))
}

/// Deterministic state over the reference cluster
pub async fn fixture_state() -> Arc<GraphState> {
    GraphState::builder()
        .fetcher(fixture_fetcher())
        .testing(true)
        .build()
        .await
        .unwrap()
}

/// Wraps a fetcher and fails selected (kind, scope) pairs
pub struct FlakyFetcher {
    inner: Arc<dyn ResourceFetcher>,
    fail_kind: ResourceType,
    fail_scope: Option<String>,
    delay: Duration,
}

impl FlakyFetcher {
    pub fn new(inner: Arc<dyn ResourceFetcher>, fail_kind: ResourceType, fail_scope: Option<&str>) -> Self {
        Self {
            inner,
            fail_kind,
            fail_scope: fail_scope.map(str::to_string),
            delay: Duration::ZERO,
        }
    }

    /// Delay every fetch, to widen overlap between concurrent snapshots
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ResourceFetcher for FlakyFetcher {
    async fn fetch(&self, kind: ResourceType, scope: Option<&str>) -> Result<Vec<Value>, FetchError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scope_matches = match &self.fail_scope {
            Some(fail_scope) => scope == Some(fail_scope.as_str()),
            None => true,
        };
        if kind == self.fail_kind && scope_matches {
            return Err(FetchError::Transport("connection refused".to_string()));
        }

        self.inner.fetch(kind, scope).await
    }
}

/// Panics on every fetch of one kind
pub struct PanickingFetcher {
    inner: Arc<dyn ResourceFetcher>,
    kind: ResourceType,
}

impl PanickingFetcher {
    pub fn new(inner: Arc<dyn ResourceFetcher>, kind: ResourceType) -> Self {
        Self { inner, kind }
    }
}

#[async_trait]
impl ResourceFetcher for PanickingFetcher {
    async fn fetch(&self, kind: ResourceType, scope: Option<&str>) -> Result<Vec<Value>, FetchError> {
        if kind == self.kind {
            panic!("fetcher bug on {}", kind);
        }
        self.inner.fetch(kind, scope).await
    }
}
