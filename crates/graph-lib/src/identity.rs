//! Identity and wrapping utilities
//!
//! Normalizes raw records into the [`WrappedResource`] envelope, computes
//! timestamp-insensitive content hashes and derives stable names from the
//! heterogeneous naming schemes used by Kubernetes and the container runtime.

use crate::error::IdentityError;
use crate::models::{annotation, Annotations, ResourceType, WrappedResource};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Sentinel returned by the best-effort identifier enrichments
pub const UNKNOWN: &str = "_unknown_";

/// Prefix Kubernetes gives to runtime names of pod containers
const K8S_CONTAINER_PREFIX: &str = "k8s_";

/// Name of the per-pod infrastructure container
const POD_INFRA_CONTAINER: &str = "POD";

/// Runtime label carrying the owning pod's name
const POD_NAME_LABEL: &str = "io.kubernetes.pod.name";

/// `[Node:]host[.c.project[.domain...].internal]`
fn node_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:Node:)?([a-z0-9](?:[-a-z0-9]*[a-z0-9])?)(?:\.c\.([a-z0-9](?:[-a-z0-9]*[a-z0-9])?)(?:\.[a-z0-9-]+)*\.internal)?$",
        )
        .expect("node id pattern is valid")
    })
}

/// Host names of the form `k8s-<cluster>-node-<n>` or
/// `gke-<cluster>-<hash>-node-<suffix>`
fn cluster_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:k8s-(.+)-node-[0-9]+|gke-(.+)-[0-9a-f]{8}-node-[0-9a-z]+)$")
            .expect("cluster suffix pattern is valid")
    })
}

/// Field names whose values change without the resource changing
fn volatile_field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:timestamp|time|resourceVersion|Created|[A-Za-z]*Timestamp|[A-Za-z]*Time|[A-Za-z]+At)$",
        )
        .expect("volatile field pattern is valid")
    })
}

/// Build the envelope for a raw record. `fetch_time` becomes the timestamp.
pub fn wrap(raw: Value, kind: ResourceType, id: impl Into<String>, fetch_time: &str) -> WrappedResource {
    WrappedResource {
        id: id.into(),
        kind,
        timestamp: fetch_time.to_string(),
        properties: raw,
        annotations: Annotations::new(),
    }
}

/// Like [`wrap`], with a display label annotation
pub fn wrap_with_label(
    raw: Value,
    kind: ResourceType,
    id: impl Into<String>,
    fetch_time: &str,
    label: impl Into<String>,
) -> WrappedResource {
    let mut wrapped = wrap(raw, kind, id, fetch_time);
    wrapped
        .annotations
        .insert(annotation::LABEL.to_string(), label.into());
    wrapped
}

/// Structural check for a wrapped object.
///
/// Requires non-empty `id`, `type` and `timestamp` strings and a non-empty
/// `properties` value; `type` must equal `kind` when given.
pub fn is_wrapped(value: &Value, kind: Option<ResourceType>) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    let non_empty_str = |key: &str| {
        obj.get(key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty())
    };
    if !(non_empty_str("id") && non_empty_str("type") && non_empty_str("timestamp")) {
        return false;
    }

    let has_properties = match obj.get("properties") {
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    };
    if !has_properties {
        return false;
    }

    match kind {
        Some(kind) => obj.get("type").and_then(Value::as_str) == Some(kind.as_str()),
        None => true,
    }
}

/// True for field names holding timestamps or versions
pub fn is_volatile_field(name: &str) -> bool {
    volatile_field_regex().is_match(name)
}

/// Deep copy of `value` with every volatile field removed
pub fn strip_volatile(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !is_volatile_field(key))
                .map(|(key, v)| (key.clone(), strip_volatile(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_volatile).collect()),
        other => other.clone(),
    }
}

/// SHA-256 (hex) of the canonical JSON form of `value` with volatile fields
/// removed.
///
/// Object keys are serialized in sorted order. Lists hash order-sensitively
/// as the list of individually stripped elements.
pub fn content_hash<T: Serialize + ?Sized>(value: &T) -> String {
    let json = serde_json::to_value(value).unwrap_or(Value::Null);
    let canonical = strip_volatile(&json).to_string();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Bare host name of a node identifier.
///
/// Accepts `host`, `host.c.project[.domain].internal` and either form with
/// a `Node:` prefix.
pub fn node_id_to_host_name(node_id: &str) -> Result<String, IdentityError> {
    node_id_regex()
        .captures(node_id)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| IdentityError::InvalidIdentifier(node_id.to_string()))
}

/// Project id of a fully-qualified node identifier, else [`UNKNOWN`]
pub fn node_id_to_project_id(node_id: &str) -> String {
    node_id_regex()
        .captures(node_id)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Cluster name encoded in the node's host name, else [`UNKNOWN`]
pub fn node_id_to_cluster_name(node_id: &str) -> String {
    let Ok(host) = node_id_to_host_name(node_id) else {
        return UNKNOWN.to_string();
    };

    cluster_suffix_regex()
        .captures(&host)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Fields of a Kubernetes-managed runtime container name:
/// `k8s_<container>[.<hash>]_<pod>_<namespace>[_<uid>_<attempt>]`
fn k8s_name_parts(name: &str) -> Option<Vec<&str>> {
    let rest = name.trim_start_matches('/').strip_prefix(K8S_CONTAINER_PREFIX)?;
    let parts: Vec<&str> = rest.split('_').collect();
    if parts.len() < 3 || parts.iter().take(2).any(|p| p.is_empty()) {
        return None;
    }
    Some(parts)
}

/// Short container name from a Kubernetes runtime name (`php-redis` from
/// `k8s_php-redis.526c9b3e_guestbook-controller-14zj2_default`)
pub fn short_name_from_runtime_name(name: &str) -> Option<String> {
    let parts = k8s_name_parts(name)?;
    parts[0].split('.').next().map(str::to_string)
}

/// True for the pause container Kubernetes starts in every pod
pub fn is_pod_infra_container(name: &str) -> bool {
    short_name_from_runtime_name(name).as_deref() == Some(POD_INFRA_CONTAINER)
}

/// Id of the Pod owning a wrapped Container.
///
/// Uses the runtime naming convention first and falls back to the runtime
/// pod-name label.
pub fn parent_pod_id(container: &WrappedResource) -> Option<String> {
    if let Some(parts) = k8s_name_parts(&container.id) {
        return Some(parts[1].to_string());
    }

    container
        .property_str(&["Config", "Labels", POD_NAME_LABEL])
        .and_then(|name| name.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Declared short name of a container, looked up in its parent Pod's
/// `status.containerStatuses` by runtime id
pub fn short_container_name(container: &WrappedResource, parent_pod: &WrappedResource) -> Option<String> {
    let runtime_id = container.property_str(&["Id"])?;

    parent_pod
        .property(&["status", "containerStatuses"])?
        .as_array()?
        .iter()
        .find(|status| {
            status
                .get("containerID")
                .and_then(Value::as_str)
                .map(strip_runtime_scheme)
                == Some(runtime_id)
        })
        .and_then(|status| status.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// `docker://deadbeef` -> `deadbeef`
pub fn strip_runtime_scheme(container_id: &str) -> &str {
    container_id
        .split_once("://")
        .map(|(_, id)| id)
        .unwrap_or(container_id)
}

/// First 12 characters of a runtime id, without any `sha256:` prefix
pub fn short_runtime_id(id: &str) -> &str {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    id.get(..12).unwrap_or(id)
}
