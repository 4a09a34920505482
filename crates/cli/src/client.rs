//! API client for the context graph server

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Errors talking to the server
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid server URL {0}: {1}")]
    InvalidUrl(String, url::ParseError),

    #[error("Failed to reach server: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// API client for the context graph server
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(base_url.to_string(), e))?;

        Ok(Self { client, base_url })
    }

    async fn send(&self, path: &str) -> Result<reqwest::Response> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::InvalidUrl(path.to_string(), e))?;

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error_message)
                .unwrap_or(body);
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    /// Make a GET request and parse the JSON body
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        Ok(self.send(path).await?.json().await?)
    }

    /// Make a GET request and return the body as text
    pub async fn get_text(&self, path: &str) -> Result<String> {
        Ok(self.send(path).await?.text().await?)
    }

    pub async fn full_graph(&self) -> Result<Graph> {
        self.get("cluster").await
    }

    pub async fn resources(&self, segment: Option<&str>) -> Result<Graph> {
        match segment {
            Some(segment) => self.get(&format!("cluster/resources/{}", segment)).await,
            None => self.get("cluster/resources").await,
        }
    }

    pub async fn dot(&self) -> Result<String> {
        self.get_text("debug").await
    }

    /// Health is returned with 503 when unhealthy, so the body is read
    /// regardless of status
    pub async fn health(&self) -> Result<HealthReport> {
        let url = self
            .base_url
            .join("healthz")
            .map_err(|e| ClientError::InvalidUrl("healthz".to_string(), e))?;
        Ok(self.client.get(url).send().await?.json().await?)
    }

    pub async fn version(&self) -> Result<VersionInfo> {
        self.get("version").await
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub timestamp: String,
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: String,
    #[serde(default)]
    pub properties: Value,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Resource {
    pub fn label(&self) -> &str {
        self.annotations.get("label").unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub target: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub components: BTreeMap<String, ComponentReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentReport {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub success: bool,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error_message: String,
}
