//! Core data models for the context graph

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Free-form annotations attached to resources and relations
pub type Annotations = BTreeMap<String, String>;

/// Annotation keys
pub mod annotation {
    pub const LABEL: &str = "label";
    pub const ALTERNATE_LABEL: &str = "alternateLabel";
    pub const CREATED_BY: &str = "createdBy";
}

/// Kind of a cluster resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    Cluster,
    Node,
    Service,
    ReplicationController,
    Pod,
    Container,
    Process,
    Image,
}

impl ResourceType {
    /// All kinds in the order they appear in a served graph
    pub const ALL: [ResourceType; 8] = [
        ResourceType::Cluster,
        ResourceType::Node,
        ResourceType::Service,
        ResourceType::ReplicationController,
        ResourceType::Pod,
        ResourceType::Container,
        ResourceType::Process,
        ResourceType::Image,
    ];

    /// Kinds that are fetched from a source (the Cluster resource is synthesized)
    pub const FETCHED: [ResourceType; 7] = [
        ResourceType::Node,
        ResourceType::Service,
        ResourceType::ReplicationController,
        ResourceType::Pod,
        ResourceType::Container,
        ResourceType::Process,
        ResourceType::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Cluster => "Cluster",
            ResourceType::Node => "Node",
            ResourceType::Service => "Service",
            ResourceType::ReplicationController => "ReplicationController",
            ResourceType::Pod => "Pod",
            ResourceType::Container => "Container",
            ResourceType::Process => "Process",
            ResourceType::Image => "Image",
        }
    }

    /// Node-scoped kinds need one fetch per known Node
    pub fn is_node_scoped(&self) -> bool {
        matches!(
            self,
            ResourceType::Container | ResourceType::Process | ResourceType::Image
        )
    }

    /// Path segment used by the HTTP surface (`/cluster/resources/<segment>`)
    pub fn path_segment(&self) -> &'static str {
        match self {
            ResourceType::Cluster => "cluster",
            ResourceType::Node => "nodes",
            ResourceType::Service => "services",
            ResourceType::ReplicationController => "rcontrollers",
            ResourceType::Pod => "pods",
            ResourceType::Container => "containers",
            ResourceType::Process => "processes",
            ResourceType::Image => "images",
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<Self> {
        ResourceType::ALL
            .into_iter()
            .find(|kind| kind.path_segment() == segment)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s) || kind.path_segment() == s)
            .ok_or_else(|| format!("unknown resource type: {}", s))
    }
}

/// Kind of a relation edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationType {
    Contains,
    CreatedFrom,
    LoadBalances,
    Monitors,
    Runs,
}

impl RelationType {
    pub const ALL: [RelationType; 5] = [
        RelationType::Contains,
        RelationType::CreatedFrom,
        RelationType::LoadBalances,
        RelationType::Monitors,
        RelationType::Runs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Contains => "contains",
            RelationType::CreatedFrom => "createdFrom",
            RelationType::LoadBalances => "loadBalances",
            RelationType::Monitors => "monitors",
            RelationType::Runs => "runs",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown relation type: {}", s))
    }
}

/// A raw cluster record enriched with a stable id, a type tag and the time
/// it was fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrappedResource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ResourceType,
    pub timestamp: String,
    pub properties: Value,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

impl WrappedResource {
    /// Display label, falling back to the id
    pub fn label(&self) -> &str {
        self.annotations
            .get(annotation::LABEL)
            .map(String::as_str)
            .unwrap_or(&self.id)
    }

    /// Look up a nested property by path, e.g. `["metadata", "labels"]`
    pub fn property(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.properties, |value, key| value.get(key))
    }

    /// String property by path
    pub fn property_str(&self, path: &[&str]) -> Option<&str> {
        self.property(path).and_then(Value::as_str)
    }
}

/// A directed, typed edge between two resource ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    #[serde(rename = "type")]
    pub kind: RelationType,
    pub source: String,
    pub target: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Annotations::is_empty")]
    pub annotations: Annotations,
}

/// A point-in-time view of the cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextGraph {
    pub timestamp: String,
    pub resources: Vec<WrappedResource>,
    pub relations: Vec<Relation>,
}

impl ContextGraph {
    /// Number of resources of the given kind
    pub fn count_resources(&self, kind: ResourceType) -> usize {
        self.resources.iter().filter(|r| r.kind == kind).count()
    }

    /// Number of relations of the given kind
    pub fn count_relations(&self, kind: RelationType) -> usize {
        self.relations.iter().filter(|r| r.kind == kind).count()
    }

    /// Render the graph in Graphviz DOT format.
    ///
    /// Node ids are qualified by kind since ids are only unique per kind (a
    /// Service and a Pod may share a name). Edge endpoints take their kinds
    /// from the rule that can produce the relation.
    pub fn to_dot(&self) -> String {
        let present: HashSet<(ResourceType, &str)> = self
            .resources
            .iter()
            .map(|r| (r.kind, r.id.as_str()))
            .collect();
        let rules = crate::relations::default_rules();

        let mut out = String::from("digraph context_graph {\n");
        out.push_str(&format!("  label={:?};\n", self.timestamp));
        for resource in &self.resources {
            out.push_str(&format!(
                "  {:?} [label={:?}, shape=box, group={:?}];\n",
                dot_id(resource.kind, &resource.id),
                format!("{}:{}", resource.kind, resource.label()),
                resource.kind.as_str(),
            ));
        }
        for relation in &self.relations {
            let candidates = || rules.iter().filter(|rule| rule.relation == relation.kind);
            let endpoints = candidates()
                .find(|rule| {
                    present.contains(&(rule.source, relation.source.as_str()))
                        && present.contains(&(rule.target, relation.target.as_str()))
                })
                .or_else(|| candidates().next());
            let Some(rule) = endpoints else { continue };
            out.push_str(&format!(
                "  {:?} -> {:?} [label={:?}];\n",
                dot_id(rule.source, &relation.source),
                dot_id(rule.target, &relation.target),
                relation.kind.as_str(),
            ));
        }
        out.push_str("}\n");
        out
    }
}

fn dot_id(kind: ResourceType, id: &str) -> String {
    format!("{}:{}", kind, id)
}
