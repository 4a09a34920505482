//! Fetcher for node-scoped resources from each node's container runtime
//!
//! Talks to the Docker remote API on every node. Containers are returned as
//! inspect records, processes as one record per `top` row and images as
//! inspect records of every image referenced by a running container.

use super::ResourceFetcher;
use crate::error::FetchError;
use crate::identity::{is_pod_infra_container, node_id_to_host_name};
use crate::models::ResourceType;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// Configuration for the container-runtime fetcher
#[derive(Debug, Clone)]
pub struct DockerFetcherConfig {
    /// Port of the runtime's remote API on every node
    pub port: u16,
    /// Timeout of a single request
    pub timeout: Duration,
}

impl Default for DockerFetcherConfig {
    fn default() -> Self {
        Self {
            port: 4243,
            timeout: Duration::from_secs(20),
        }
    }
}

/// Lists Containers, Processes and Images of one node
pub struct DockerFetcher {
    client: Client,
    port: u16,
}

impl DockerFetcher {
    pub fn new(config: DockerFetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            port: config.port,
        })
    }

    fn base_url(&self, node_id: &str) -> Result<String, FetchError> {
        let host = node_id_to_host_name(node_id)?;
        Ok(format!("http://{}:{}", host, self.port))
    }

    async fn get_json(&self, url: String) -> Result<Value, FetchError> {
        debug!(url = %url, "Fetching from container runtime");
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    /// Running containers as `(id, name)`, without pod infrastructure containers
    async fn running_containers(&self, base: &str) -> Result<Vec<(String, String)>, FetchError> {
        let listing = self.get_json(format!("{}/containers/json", base)).await?;
        let entries = listing
            .as_array()
            .ok_or_else(|| FetchError::malformed(ResourceType::Container, "listing is not an array"))?;

        Ok(entries
            .iter()
            .filter_map(|entry| {
                let id = entry.get("Id")?.as_str()?;
                let name = entry
                    .get("Names")
                    .and_then(Value::as_array)
                    .and_then(|names| names.first())
                    .and_then(Value::as_str)
                    .unwrap_or(id)
                    .trim_start_matches('/');
                Some((id.to_string(), name.to_string()))
            })
            .filter(|(_, name)| !is_pod_infra_container(name))
            .collect())
    }

    async fn containers(&self, base: &str) -> Result<Vec<Value>, FetchError> {
        let mut records = Vec::new();
        for (id, _) in self.running_containers(base).await? {
            records.push(self.get_json(format!("{}/containers/{}/json", base, id)).await?);
        }
        Ok(records)
    }

    async fn processes(&self, base: &str) -> Result<Vec<Value>, FetchError> {
        let mut records = Vec::new();
        for (id, name) in self.running_containers(base).await? {
            let top = self
                .get_json(format!("{}/containers/{}/top?ps_args=aux", base, id))
                .await?;
            records.extend(flatten_top(&top, &id, &name)?);
        }
        Ok(records)
    }

    async fn images(&self, base: &str) -> Result<Vec<Value>, FetchError> {
        let mut image_ids: Vec<String> = Vec::new();
        for record in self.containers(base).await? {
            if let Some(image) = record.get("Image").and_then(Value::as_str) {
                if !image_ids.iter().any(|known| known == image) {
                    image_ids.push(image.to_string());
                }
            }
        }

        let mut records = Vec::new();
        for image in image_ids {
            records.push(self.get_json(format!("{}/images/{}/json", base, image)).await?);
        }
        Ok(records)
    }
}

/// Turn a `top` response (`{"Titles": [...], "Processes": [[...]]}`) into one
/// object per process, tagged with its container.
fn flatten_top(top: &Value, container_id: &str, container_name: &str) -> Result<Vec<Value>, FetchError> {
    let malformed = |reason: &str| FetchError::malformed(ResourceType::Process, reason);

    let titles: Vec<&str> = top
        .get("Titles")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing Titles"))?
        .iter()
        .map(|t| t.as_str().unwrap_or_default())
        .collect();
    let rows = top
        .get("Processes")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing Processes"))?;

    rows.iter()
        .map(|row| {
            let cells = row.as_array().ok_or_else(|| malformed("process row is not an array"))?;
            let mut record: Map<String, Value> = titles
                .iter()
                .zip(cells)
                .map(|(title, cell)| (title.to_string(), cell.clone()))
                .collect();
            record.insert("ContainerId".to_string(), Value::from(container_id));
            record.insert("ContainerName".to_string(), Value::from(container_name));
            Ok(Value::Object(record))
        })
        .collect()
}

#[async_trait]
impl ResourceFetcher for DockerFetcher {
    async fn fetch(&self, kind: ResourceType, scope: Option<&str>) -> Result<Vec<Value>, FetchError> {
        let node = match scope {
            Some(node) if kind.is_node_scoped() => node,
            _ => {
                return Err(FetchError::Unsupported {
                    kind,
                    scope: scope.map(str::to_string),
                })
            }
        };
        let base = self.base_url(node)?;

        match kind {
            ResourceType::Container => self.containers(&base).await,
            ResourceType::Process => self.processes(&base).await,
            _ => self.images(&base).await,
        }
    }
}
