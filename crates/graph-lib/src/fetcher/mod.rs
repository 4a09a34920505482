//! Resource fetchers
//!
//! A fetcher returns the raw JSON records of one resource type, optionally
//! scoped to a single Node. The collector treats every error as "zero
//! records" for that (type, scope) pair.

mod cluster;
mod docker;
mod fixture;
mod kube;

pub use cluster::ClusterFetcher;
pub use docker::{DockerFetcher, DockerFetcherConfig};
pub use fixture::FixtureFetcher;
pub use kube::{KubeApiFetcher, KubeFetcherConfig};

use crate::error::FetchError;
use crate::models::ResourceType;
use serde_json::Value;

pub use async_trait::async_trait;

/// Source of raw records for one or more resource types
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch raw records of `kind`. Node-scoped kinds receive the Node id
    /// as `scope`; cluster-wide kinds receive `None`.
    async fn fetch(&self, kind: ResourceType, scope: Option<&str>) -> Result<Vec<Value>, FetchError>;
}

/// Extract the records of a list payload.
///
/// Accepts a Kubernetes list object (`{"items": [...]}`, where a null
/// `items` means empty) or a bare JSON array.
pub fn list_items(kind: ResourceType, payload: Value) -> Result<Vec<Value>, FetchError> {
    match payload {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) => Ok(Vec::new()),
            Some(_) => Err(FetchError::malformed(kind, "`items` is not an array")),
            None => Err(FetchError::malformed(kind, "list object has no `items`")),
        },
        _ => Err(FetchError::malformed(kind, "payload is neither a list object nor an array")),
    }
}
