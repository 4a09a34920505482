//! Server configuration

use anyhow::{Context, Result};
use graph_lib::fetcher::{
    ClusterFetcher, DockerFetcher, DockerFetcherConfig, FixtureFetcher, KubeApiFetcher,
    KubeFetcherConfig, ResourceFetcher,
};
use graph_lib::state::DEFAULT_CREATED_BY;
use graph_lib::CollectorConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable prefix, e.g. `CONTEXT_GRAPH_PORT`
pub const ENV_PREFIX: &str = "CONTEXT_GRAPH";

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP port for the graph, health and metrics endpoints
    #[serde(default = "default_port")]
    pub port: u16,

    /// Size of the fetch worker pool
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,

    /// Serve recorded fixtures with a single worker
    #[serde(default)]
    pub testing: bool,

    /// Fixture directory used in testing mode
    #[serde(default)]
    pub fixture_dir: Option<PathBuf>,

    #[serde(default = "default_kube_api_url")]
    pub kube_api_url: String,

    #[serde(default = "default_kube_token_path")]
    pub kube_token_path: PathBuf,

    #[serde(default = "default_kube_ca_cert_path")]
    pub kube_ca_cert_path: PathBuf,

    /// Container-runtime API port on every node
    #[serde(default = "default_docker_port")]
    pub docker_port: u16,

    /// Timeout of one upstream request in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Overrides the cluster name derived from node ids
    #[serde(default)]
    pub cluster_name: Option<String>,

    /// Value of the `createdBy` annotation
    #[serde(default = "default_created_by")]
    pub created_by: String,
}

fn default_port() -> u16 {
    5555
}

fn default_num_workers() -> usize {
    8
}

fn default_kube_api_url() -> String {
    KubeFetcherConfig::default().api_url
}

fn default_kube_token_path() -> PathBuf {
    KubeFetcherConfig::default().token_path
}

fn default_kube_ca_cert_path() -> PathBuf {
    KubeFetcherConfig::default().ca_cert_path
}

fn default_docker_port() -> u16 {
    DockerFetcherConfig::default().port
}

fn default_fetch_timeout() -> u64 {
    20
}

fn default_created_by() -> String {
    DEFAULT_CREATED_BY.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            num_workers: default_num_workers(),
            testing: false,
            fixture_dir: None,
            kube_api_url: default_kube_api_url(),
            kube_token_path: default_kube_token_path(),
            kube_ca_cert_path: default_kube_ca_cert_path(),
            docker_port: default_docker_port(),
            fetch_timeout_secs: default_fetch_timeout(),
            cluster_name: None,
            created_by: default_created_by(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let source = config::Config::builder()
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Self::from_source(source)
    }

    pub fn from_source(source: config::Config) -> Result<Self> {
        source
            .try_deserialize()
            .context("Invalid context graph configuration")
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            num_workers: self.num_workers,
            testing: self.testing,
            cluster_name: self.cluster_name.clone().filter(|name| !name.is_empty()),
            created_by: self.created_by.clone(),
        }
    }

    /// Fixtures in testing mode, the live cluster otherwise
    pub fn fetcher(&self) -> Result<Arc<dyn ResourceFetcher>> {
        if self.testing {
            let dir = self
                .fixture_dir
                .clone()
                .ok_or_else(|| anyhow::anyhow!("fixture_dir is required in testing mode"))?;
            return Ok(Arc::new(FixtureFetcher::new(dir)));
        }

        let kube = KubeApiFetcher::new(KubeFetcherConfig {
            api_url: self.kube_api_url.clone(),
            token_path: self.kube_token_path.clone(),
            ca_cert_path: self.kube_ca_cert_path.clone(),
            timeout: self.fetch_timeout(),
        })?;
        let docker = DockerFetcher::new(DockerFetcherConfig {
            port: self.docker_port,
            timeout: self.fetch_timeout(),
        })?;

        Ok(Arc::new(ClusterFetcher::new(Arc::new(kube), Arc::new(docker))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<ServerConfig> {
        let mut builder = config::Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value)?;
        }
        ServerConfig::from_source(builder.build()?)
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.port, 5555);
        assert_eq!(config.num_workers, 8);
        assert!(!config.testing);
        assert_eq!(config.docker_port, 4243);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(20));
        assert_eq!(config.created_by, DEFAULT_CREATED_BY);
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("port", "8080"),
            ("testing", "true"),
            ("fixture_dir", "/tmp/fixtures"),
            ("cluster_name", "prod"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        let collector = config.collector_config();
        assert!(collector.testing);
        assert_eq!(collector.pool_size(), 1);
        assert_eq!(collector.cluster_name.as_deref(), Some("prod"));
        assert!(config.fetcher().is_ok());
    }

    #[test]
    fn test_testing_requires_fixture_dir() {
        let config = ServerConfig {
            testing: true,
            ..Default::default()
        };
        assert!(config.fetcher().is_err());
    }

    #[test]
    fn test_empty_cluster_name_is_ignored() {
        let config = ServerConfig {
            cluster_name: Some(String::new()),
            ..Default::default()
        };
        assert!(config.collector_config().cluster_name.is_none());
    }
}
