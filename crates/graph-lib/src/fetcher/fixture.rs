//! Fetcher reading recorded API responses from a directory

use super::{list_items, ResourceFetcher};
use crate::error::FetchError;
use crate::identity::node_id_to_host_name;
use crate::models::ResourceType;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

/// Serves recorded responses, one file per (type, scope):
///
/// - `nodes.json`, `services.json`, `replicationcontrollers.json`, `pods.json`
/// - `containers-<host>.json`, `processes-<host>.json`, `images-<host>.json`
///
/// A missing node-scoped file means the node reported nothing; a missing
/// cluster-wide file is an error.
#[derive(Debug, Clone)]
pub struct FixtureFetcher {
    dir: PathBuf,
}

impl FixtureFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_for(&self, kind: ResourceType, scope: Option<&str>) -> Result<PathBuf, FetchError> {
        let name = match (kind, scope) {
            (ResourceType::Node, None) => "nodes.json".to_string(),
            (ResourceType::Service, None) => "services.json".to_string(),
            (ResourceType::ReplicationController, None) => "replicationcontrollers.json".to_string(),
            (ResourceType::Pod, None) => "pods.json".to_string(),
            (kind, Some(node)) if kind.is_node_scoped() => {
                format!("{}-{}.json", kind.path_segment(), node_id_to_host_name(node)?)
            }
            (kind, scope) => {
                return Err(FetchError::Unsupported {
                    kind,
                    scope: scope.map(str::to_string),
                })
            }
        };
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl ResourceFetcher for FixtureFetcher {
    async fn fetch(&self, kind: ResourceType, scope: Option<&str>) -> Result<Vec<Value>, FetchError> {
        let path = self.file_for(kind, scope)?;

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && kind.is_node_scoped() => {
                debug!(path = %path.display(), "No fixture for node, treating as empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(FetchError::Transport(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let payload: Value = serde_json::from_str(&content)
            .map_err(|e| FetchError::malformed(kind, format!("{}: {}", path.display(), e)))?;

        list_items(kind, payload)
    }
}
