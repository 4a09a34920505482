//! Matchers of the standard rule set

use super::selector::LabelSelector;
use super::{Edge, ResourceIndex};
use crate::identity::{node_id_to_host_name, parent_pod_id, short_container_name, short_runtime_id};
use crate::models::{ResourceType, WrappedResource};
use serde_json::Value;
use std::collections::HashMap;

fn cluster_contains(index: &ResourceIndex<'_>, kind: ResourceType) -> Vec<Edge> {
    let children = index.of_kind(kind);
    index
        .of_kind(ResourceType::Cluster)
        .iter()
        .flat_map(|cluster| children.iter().map(|child| Edge::new(cluster, child)))
        .collect()
}

pub fn cluster_contains_nodes(index: &ResourceIndex<'_>) -> Vec<Edge> {
    cluster_contains(index, ResourceType::Node)
}

pub fn cluster_contains_services(index: &ResourceIndex<'_>) -> Vec<Edge> {
    cluster_contains(index, ResourceType::Service)
}

pub fn cluster_contains_controllers(index: &ResourceIndex<'_>) -> Vec<Edge> {
    cluster_contains(index, ResourceType::ReplicationController)
}

/// Pod -> Container, labelled with the container's declared name when the
/// pod status lists it
pub fn pod_contains_containers(index: &ResourceIndex<'_>) -> Vec<Edge> {
    index
        .of_kind(ResourceType::Container)
        .iter()
        .filter_map(|container| {
            let pod = index.get(ResourceType::Pod, &parent_pod_id(container)?)?;
            let edge = Edge::new(pod, container);
            Some(match short_container_name(container, pod) {
                Some(name) => edge.with_label(name),
                None => edge,
            })
        })
        .collect()
}

/// Container -> Process, by the container name or runtime id recorded on
/// the process
pub fn container_contains_processes(index: &ResourceIndex<'_>) -> Vec<Edge> {
    let by_runtime_id: HashMap<&str, &WrappedResource> = index
        .of_kind(ResourceType::Container)
        .iter()
        .filter_map(|container| Some((container.property_str(&["Id"])?, *container)))
        .collect();

    index
        .of_kind(ResourceType::Process)
        .iter()
        .filter_map(|process| {
            let by_name = process
                .property_str(&["ContainerName"])
                .and_then(|name| index.get(ResourceType::Container, name.trim_start_matches('/')));
            let container = by_name.or_else(|| {
                process
                    .property_str(&["ContainerId"])
                    .and_then(|id| by_runtime_id.get(id).copied())
            })?;
            Some(Edge::new(container, process))
        })
        .collect()
}

/// Node -> Pod, by the pod's host assignment
pub fn node_runs_pods(index: &ResourceIndex<'_>) -> Vec<Edge> {
    let nodes = index.of_kind(ResourceType::Node);
    let mut edges = Vec::new();
    for node in nodes {
        for pod in index.of_kind(ResourceType::Pod) {
            if pod_runs_on(pod, node) {
                edges.push(Edge::new(node, pod));
            }
        }
    }
    edges
}

/// The scheduler records the node as `spec.nodeName` (`spec.host` in older
/// API versions); unscheduled pods may only report `status.hostIP`.
fn pod_runs_on(pod: &WrappedResource, node: &WrappedResource) -> bool {
    let host = pod
        .property_str(&["spec", "nodeName"])
        .or_else(|| pod.property_str(&["spec", "host"]))
        .filter(|host| !host.is_empty());

    if let Some(host) = host {
        if host == node.id {
            return true;
        }
        return match (node_id_to_host_name(host), node_id_to_host_name(&node.id)) {
            (Ok(pod_host), Ok(node_host)) => pod_host == node_host,
            _ => false,
        };
    }

    let Some(host_ip) = pod.property_str(&["status", "hostIP"]) else {
        return false;
    };
    node.property(&["status", "addresses"])
        .and_then(Value::as_array)
        .is_some_and(|addresses| {
            addresses
                .iter()
                .any(|address| address.get("address").and_then(Value::as_str) == Some(host_ip))
        })
}

fn selector_edges(index: &ResourceIndex<'_>, kind: ResourceType) -> Vec<Edge> {
    let pods = index.of_kind(ResourceType::Pod);
    let mut edges = Vec::new();
    for owner in index.of_kind(kind) {
        let Some(selector) = owner
            .property(&["spec", "selector"])
            .and_then(LabelSelector::from_value)
        else {
            continue;
        };
        for pod in pods {
            let labels = pod
                .property(&["metadata", "labels"])
                .and_then(Value::as_object);
            if selector.matches(labels) {
                edges.push(Edge::new(owner, pod));
            }
        }
    }
    edges
}

pub fn controller_monitors_pods(index: &ResourceIndex<'_>) -> Vec<Edge> {
    selector_edges(index, ResourceType::ReplicationController)
}

pub fn service_load_balances_pods(index: &ResourceIndex<'_>) -> Vec<Edge> {
    selector_edges(index, ResourceType::Service)
}

/// Container -> Image. The container's `Image` is the runtime image id;
/// older runtimes only record the configured reference, which is matched
/// against the image's repository tags.
pub fn container_created_from_image(index: &ResourceIndex<'_>) -> Vec<Edge> {
    let images = index.of_kind(ResourceType::Image);
    index
        .of_kind(ResourceType::Container)
        .iter()
        .filter_map(|container| {
            let image = images.iter().find(|image| image_matches(container, image))?;
            Some(Edge::new(container, image))
        })
        .collect()
}

fn image_matches(container: &WrappedResource, image: &WrappedResource) -> bool {
    if let Some(reference) = container.property_str(&["Image"]) {
        if strip_digest_prefix(reference) == strip_digest_prefix(&image.id) {
            return true;
        }
        // Short ids from `docker ps`
        if reference.len() == 12 && short_runtime_id(&image.id) == reference {
            return true;
        }
    }

    let Some(configured) = container.property_str(&["Config", "Image"]) else {
        return false;
    };
    let configured = with_default_tag(configured);
    image
        .property(&["RepoTags"])
        .and_then(Value::as_array)
        .is_some_and(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .any(|tag| with_default_tag(tag) == configured)
        })
}

fn strip_digest_prefix(id: &str) -> &str {
    id.strip_prefix("sha256:").unwrap_or(id)
}

/// `redis` -> `redis:latest`; registry ports are not tags
fn with_default_tag(reference: &str) -> String {
    let last = reference.rsplit('/').next().unwrap_or(reference);
    if last.contains(':') || last.contains('@') {
        reference.to_string()
    } else {
        format!("{}:latest", reference)
    }
}
