//! Per-kind rules turning raw records into wrapped resources

use crate::error::FetchError;
use crate::identity::{
    is_pod_infra_container, node_id_to_cluster_name, node_id_to_host_name, node_id_to_project_id,
    short_name_from_runtime_name, short_runtime_id, wrap, wrap_with_label, UNKNOWN,
};
use crate::models::{annotation, ResourceType, WrappedResource};
use serde_json::{json, Value};

/// Runtime label carrying the declared container name
const CONTAINER_NAME_LABEL: &str = "io.kubernetes.container.name";

/// Repo tag the runtime reports for untagged images
const UNTAGGED: &str = "<none>:<none>";

/// Wrap every record of one fetch.
///
/// Any record without an identity fails the whole batch. Pod infrastructure
/// containers are dropped.
pub fn wrap_records(
    kind: ResourceType,
    records: Vec<Value>,
    fetch_time: &str,
    created_by: &str,
) -> Result<Vec<WrappedResource>, FetchError> {
    let mut wrapped = Vec::with_capacity(records.len());
    for raw in records {
        if let Some(mut resource) = wrap_record(kind, raw, fetch_time)? {
            resource
                .annotations
                .insert(annotation::CREATED_BY.to_string(), created_by.to_string());
            wrapped.push(resource);
        }
    }
    Ok(wrapped)
}

fn wrap_record(kind: ResourceType, raw: Value, fetch_time: &str) -> Result<Option<WrappedResource>, FetchError> {
    let missing = |what: &str| FetchError::malformed(kind, format!("record without {}", what));

    let resource = match kind {
        ResourceType::Node => {
            let id = str_at(&raw, &["metadata", "name"]).ok_or_else(|| missing("metadata.name"))?;
            let label = node_id_to_host_name(&id).unwrap_or_else(|_| id.clone());
            wrap_with_label(raw, kind, id, fetch_time, label)
        }
        ResourceType::Pod | ResourceType::Service | ResourceType::ReplicationController => {
            let id = str_at(&raw, &["metadata", "name"]).ok_or_else(|| missing("metadata.name"))?;
            wrap_with_label(raw, kind, id.clone(), fetch_time, id)
        }
        ResourceType::Container => {
            let name = str_at(&raw, &["Name"]).ok_or_else(|| missing("Name"))?;
            let id = name.trim_start_matches('/').to_string();
            if is_pod_infra_container(&id) {
                return Ok(None);
            }
            let short_name = short_name_from_runtime_name(&id)
                .or_else(|| str_at(&raw, &["Config", "Labels", CONTAINER_NAME_LABEL]))
                .unwrap_or_else(|| id.clone());
            let label = match str_at(&raw, &["Id"]) {
                Some(runtime_id) => format!("{}/{}", short_name, short_runtime_id(&runtime_id)),
                None => short_name,
            };
            wrap_with_label(raw, kind, id, fetch_time, label)
        }
        ResourceType::Process => {
            let container = str_at(&raw, &["ContainerName"]).ok_or_else(|| missing("ContainerName"))?;
            let pid = str_at(&raw, &["PID"]).ok_or_else(|| missing("PID"))?;
            let label = str_at(&raw, &["COMMAND"])
                .and_then(|command| command.split_whitespace().next().map(str::to_string))
                .unwrap_or_else(|| pid.clone());
            wrap_with_label(raw, kind, format!("{}/{}", container, pid), fetch_time, label)
        }
        ResourceType::Image => {
            let id = str_at(&raw, &["Id"]).ok_or_else(|| missing("Id"))?;
            let short_id = short_runtime_id(&id).to_string();
            let label = raw
                .get("RepoTags")
                .and_then(Value::as_array)
                .and_then(|tags| tags.iter().filter_map(Value::as_str).find(|t| *t != UNTAGGED))
                .map(str::to_string)
                .unwrap_or_else(|| short_id.clone());
            let mut wrapped = wrap_with_label(raw, kind, id, fetch_time, label);
            wrapped
                .annotations
                .insert(annotation::ALTERNATE_LABEL.to_string(), short_id);
            wrapped
        }
        ResourceType::Cluster => {
            return Err(FetchError::Unsupported { kind, scope: None });
        }
    };

    Ok(Some(resource))
}

/// String value at a path, accepting numbers (process ids are sometimes numeric)
fn str_at(raw: &Value, path: &[&str]) -> Option<String> {
    let value = path.iter().try_fold(raw, |value, key| value.get(key))?;
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The synthetic Cluster resource of a snapshot.
///
/// Named after `configured`, else the cluster derived from the first node
/// id, else that node's project, else [`UNKNOWN`].
pub fn cluster_resource(
    configured: Option<&str>,
    nodes: &[WrappedResource],
    fetch_time: &str,
    created_by: &str,
) -> WrappedResource {
    let first_node = nodes.first().map(|node| node.id.as_str()).unwrap_or_default();
    let project_id = node_id_to_project_id(first_node);

    let name = match configured {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            let derived = node_id_to_cluster_name(first_node);
            if derived != UNKNOWN {
                derived
            } else {
                project_id.clone()
            }
        }
    };

    let properties = json!({
        "name": name,
        "projectId": project_id,
        "nodeCount": nodes.len(),
    });
    let mut cluster = wrap(properties, ResourceType::Cluster, name.clone(), fetch_time);
    cluster
        .annotations
        .insert(annotation::LABEL.to_string(), name);
    cluster
        .annotations
        .insert(annotation::CREATED_BY.to_string(), created_by.to_string());
    cluster
}
