//! Error types for context graph collection

use crate::models::ResourceType;
use thiserror::Error;

/// Failure of a single fetch task.
///
/// These never abort a snapshot; the collector logs them and records zero
/// resources for the failing (kind, scope) pair.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("malformed {kind} payload: {reason}")]
    Malformed { kind: ResourceType, reason: String },

    #[error("invalid fetch scope: {0}")]
    InvalidScope(#[from] IdentityError),

    #[error("no fetcher for {kind} with scope {scope:?}")]
    Unsupported {
        kind: ResourceType,
        scope: Option<String>,
    },
}

impl FetchError {
    pub fn malformed(kind: ResourceType, reason: impl Into<String>) -> Self {
        FetchError::Malformed {
            kind,
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err.to_string())
    }
}

/// Identifier parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

/// Errors that fail a whole snapshot request.
///
/// Data problems never end up here; only a worker pool that can no longer
/// make progress does.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("worker pool unavailable: {0}")]
    WorkerPool(String),

    #[error("fetch task panicked: {0}")]
    TaskPanicked(String),
}

impl From<tokio::sync::AcquireError> for GraphError {
    fn from(err: tokio::sync::AcquireError) -> Self {
        GraphError::WorkerPool(err.to_string())
    }
}

impl From<tokio::task::JoinError> for GraphError {
    fn from(err: tokio::task::JoinError) -> Self {
        GraphError::TaskPanicked(err.to_string())
    }
}
