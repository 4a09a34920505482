//! Fetcher for cluster-wide resources from the Kubernetes API server

use super::{list_items, ResourceFetcher};
use crate::error::FetchError;
use crate::models::ResourceType;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Configuration for the Kubernetes API fetcher
#[derive(Debug, Clone)]
pub struct KubeFetcherConfig {
    /// API server base URL
    pub api_url: String,
    /// Service account token, sent as a bearer token when present
    pub token_path: PathBuf,
    /// CA bundle used to verify the API server, when present
    pub ca_cert_path: PathBuf,
    /// Timeout of a single request
    pub timeout: Duration,
}

impl Default for KubeFetcherConfig {
    fn default() -> Self {
        Self {
            api_url: std::env::var("KUBERNETES_SERVICE_HOST")
                .map(|host| {
                    let port =
                        std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".into());
                    format!("https://{}:{}", host, port)
                })
                .unwrap_or_else(|_| "https://kubernetes.default.svc".into()),
            token_path: PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/token"),
            ca_cert_path: PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/ca.crt"),
            timeout: Duration::from_secs(20),
        }
    }
}

/// Lists Nodes, Services, ReplicationControllers and Pods
pub struct KubeApiFetcher {
    client: Client,
    base_url: Url,
    token_path: PathBuf,
}

impl KubeApiFetcher {
    pub fn new(config: KubeFetcherConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(config.timeout);

        if let Ok(pem) = std::fs::read(&config.ca_cert_path) {
            let cert = reqwest::Certificate::from_pem(&pem)
                .with_context(|| format!("Invalid CA certificate {:?}", config.ca_cert_path))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder.build().context("Failed to create HTTP client")?;
        let base_url = Url::parse(&config.api_url)
            .with_context(|| format!("Invalid Kubernetes API URL: {}", config.api_url))?;

        Ok(Self {
            client,
            base_url,
            token_path: config.token_path,
        })
    }

    fn path_for(kind: ResourceType) -> Option<&'static str> {
        match kind {
            ResourceType::Node => Some("api/v1/nodes"),
            ResourceType::Service => Some("api/v1/services"),
            ResourceType::ReplicationController => Some("api/v1/replicationcontrollers"),
            ResourceType::Pod => Some("api/v1/pods"),
            _ => None,
        }
    }

    async fn token(&self) -> Option<String> {
        tokio::fs::read_to_string(&self.token_path)
            .await
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

#[async_trait]
impl ResourceFetcher for KubeApiFetcher {
    async fn fetch(&self, kind: ResourceType, scope: Option<&str>) -> Result<Vec<Value>, FetchError> {
        let path = match (Self::path_for(kind), scope) {
            (Some(path), None) => path,
            _ => {
                return Err(FetchError::Unsupported {
                    kind,
                    scope: scope.map(str::to_string),
                })
            }
        };

        let url = self
            .base_url
            .join(path)
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        debug!(url = %url, "Fetching from Kubernetes API");

        let mut request = self.client.get(url.clone());
        if let Some(token) = self.token().await {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| FetchError::malformed(kind, e.to_string()))?;

        list_items(kind, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_cover_cluster_wide_kinds_only() {
        assert_eq!(KubeApiFetcher::path_for(ResourceType::Pod), Some("api/v1/pods"));
        assert_eq!(
            KubeApiFetcher::path_for(ResourceType::ReplicationController),
            Some("api/v1/replicationcontrollers")
        );
        assert_eq!(KubeApiFetcher::path_for(ResourceType::Container), None);
        assert_eq!(KubeApiFetcher::path_for(ResourceType::Cluster), None);
    }

    #[tokio::test]
    async fn test_rejects_node_scoped_kinds() {
        let fetcher = KubeApiFetcher::new(KubeFetcherConfig {
            api_url: "http://127.0.0.1:1".to_string(),
            token_path: PathBuf::from("/nonexistent/token"),
            ca_cert_path: PathBuf::from("/nonexistent/ca.crt"),
            timeout: Duration::from_millis(100),
        })
        .unwrap();

        let result = fetcher.fetch(ResourceType::Image, Some("node-1")).await;
        assert!(matches!(result, Err(FetchError::Unsupported { .. })));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let result = KubeApiFetcher::new(KubeFetcherConfig {
            api_url: "not a url".to_string(),
            ..Default::default()
        });
        assert!(result.is_err());
    }
}
