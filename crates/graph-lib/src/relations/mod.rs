//! Relation inference
//!
//! Relations are derived from a merged resource set by a fixed list of
//! rules, one per (relation, source type, target type). Rules only look at
//! the resources they are given. Every inferred edge is unique per
//! (relation, source, target).

mod rules;
mod selector;

pub use selector::{LabelSelector, Operator, Requirement};

use crate::models::{annotation, Annotations, Relation, RelationType, ResourceType, WrappedResource};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Lookup structure over one resource set
pub struct ResourceIndex<'a> {
    by_kind: BTreeMap<ResourceType, Vec<&'a WrappedResource>>,
    by_id: HashMap<(ResourceType, &'a str), &'a WrappedResource>,
}

impl<'a> ResourceIndex<'a> {
    pub fn new(resources: &'a [WrappedResource]) -> Self {
        let mut by_kind: BTreeMap<ResourceType, Vec<&'a WrappedResource>> = BTreeMap::new();
        let mut by_id = HashMap::new();
        for resource in resources {
            if by_id.insert((resource.kind, resource.id.as_str()), resource).is_none() {
                by_kind.entry(resource.kind).or_default().push(resource);
            }
        }
        Self { by_kind, by_id }
    }

    /// Resources of one type, in input order
    pub fn of_kind(&self, kind: ResourceType) -> &[&'a WrappedResource] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn get(&self, kind: ResourceType, id: &str) -> Option<&'a WrappedResource> {
        self.by_id.get(&(kind, id)).copied()
    }
}

/// An edge produced by a rule, before it becomes a [`Relation`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub annotations: Annotations,
}

impl Edge {
    pub fn new(source: &WrappedResource, target: &WrappedResource) -> Self {
        Self {
            source: source.id.clone(),
            target: target.id.clone(),
            annotations: Annotations::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.annotations.insert(annotation::LABEL.to_string(), label.into());
        self
    }
}

/// Matcher of one rule
pub type Matcher = fn(&ResourceIndex<'_>) -> Vec<Edge>;

/// One inference rule
#[derive(Clone, Copy)]
pub struct Rule {
    pub relation: RelationType,
    pub source: ResourceType,
    pub target: ResourceType,
    pub matcher: Matcher,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("relation", &self.relation)
            .field("source", &self.source)
            .field("target", &self.target)
            .finish()
    }
}

/// The standard rule set, in evaluation order
pub fn default_rules() -> Vec<Rule> {
    use RelationType::*;
    use ResourceType::*;

    let rule = |relation, source, target, matcher: Matcher| Rule {
        relation,
        source,
        target,
        matcher,
    };

    vec![
        rule(Contains, Cluster, Node, rules::cluster_contains_nodes),
        rule(Contains, Cluster, Service, rules::cluster_contains_services),
        rule(Contains, Cluster, ReplicationController, rules::cluster_contains_controllers),
        rule(Contains, Pod, Container, rules::pod_contains_containers),
        rule(Contains, Container, Process, rules::container_contains_processes),
        rule(Runs, Node, Pod, rules::node_runs_pods),
        rule(Monitors, ReplicationController, Pod, rules::controller_monitors_pods),
        rule(LoadBalances, Service, Pod, rules::service_load_balances_pods),
        rule(CreatedFrom, Container, Image, rules::container_created_from_image),
    ]
}

/// Applies the rule set to resource snapshots
#[derive(Debug, Clone)]
pub struct RelationEngine {
    rules: Vec<Rule>,
    created_by: String,
}

impl RelationEngine {
    pub fn new(created_by: impl Into<String>) -> Self {
        Self::with_rules(default_rules(), created_by)
    }

    pub fn with_rules(rules: Vec<Rule>, created_by: impl Into<String>) -> Self {
        Self {
            rules,
            created_by: created_by.into(),
        }
    }

    /// Infer all relations between `resources`, stamped with `timestamp`
    pub fn infer(&self, resources: &[WrappedResource], timestamp: &str) -> Vec<Relation> {
        let index = ResourceIndex::new(resources);
        let mut seen: HashSet<(RelationType, String, String)> = HashSet::new();
        let mut relations = Vec::new();

        for rule in &self.rules {
            if index.of_kind(rule.source).is_empty() || index.of_kind(rule.target).is_empty() {
                continue;
            }

            let mut added = 0;
            for edge in (rule.matcher)(&index) {
                if !seen.insert((rule.relation, edge.source.clone(), edge.target.clone())) {
                    continue;
                }
                let mut annotations = edge.annotations;
                annotations.insert(annotation::CREATED_BY.to_string(), self.created_by.clone());
                relations.push(Relation {
                    kind: rule.relation,
                    source: edge.source,
                    target: edge.target,
                    timestamp: timestamp.to_string(),
                    annotations,
                });
                added += 1;
            }

            debug!(
                relation = %rule.relation,
                source = %rule.source,
                target = %rule.target,
                added,
                "Applied relation rule"
            );
        }

        relations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::wrap;
    use serde_json::json;

    const TS: &str = "2015-05-29T18:42:52.217499Z";

    fn resource(kind: ResourceType, id: &str, properties: serde_json::Value) -> WrappedResource {
        wrap(properties, kind, id, TS)
    }

    fn count(relations: &[Relation], kind: RelationType) -> usize {
        relations.iter().filter(|r| r.kind == kind).count()
    }

    #[test]
    fn test_default_rules_cover_every_relation() {
        let rules = default_rules();
        for relation in RelationType::ALL {
            assert!(rules.iter().any(|r| r.relation == relation), "{} has no rule", relation);
        }
    }

    #[test]
    fn test_index_skips_duplicate_ids() {
        let resources = vec![
            resource(ResourceType::Pod, "a", json!({})),
            resource(ResourceType::Pod, "a", json!({"x": 1})),
            resource(ResourceType::Service, "a", json!({})),
        ];
        let index = ResourceIndex::new(&resources);
        assert_eq!(index.of_kind(ResourceType::Pod).len(), 1);
        assert_eq!(index.of_kind(ResourceType::Service).len(), 1);
        assert!(index.of_kind(ResourceType::Node).is_empty());
        assert!(index.get(ResourceType::Service, "a").is_some());
    }

    #[test]
    fn test_infer_stamps_and_annotates() {
        let resources = vec![
            resource(ResourceType::Cluster, "c", json!({})),
            resource(ResourceType::Node, "n1", json!({})),
            resource(ResourceType::Node, "n2", json!({})),
        ];
        let relations = RelationEngine::new("tester").infer(&resources, TS);

        assert_eq!(relations.len(), 2);
        for relation in &relations {
            assert_eq!(relation.kind, RelationType::Contains);
            assert_eq!(relation.source, "c");
            assert_eq!(relation.timestamp, TS);
            assert_eq!(relation.annotations[annotation::CREATED_BY], "tester");
        }
    }

    #[test]
    fn test_duplicate_edges_are_suppressed() {
        let resources = vec![
            resource(ResourceType::Cluster, "c", json!({})),
            resource(ResourceType::Node, "n1", json!({})),
        ];
        let mut rules = default_rules();
        rules.extend(default_rules());
        let relations = RelationEngine::with_rules(rules, "tester").infer(&resources, TS);
        assert_eq!(relations.len(), 1);
    }

    #[test]
    fn test_no_resources_no_relations() {
        assert!(RelationEngine::new("tester").infer(&[], TS).is_empty());
    }

    #[test]
    fn test_selector_relations() {
        let resources = vec![
            resource(ResourceType::Service, "web", json!({"spec": {"selector": {"app": "web"}}})),
            resource(ResourceType::Service, "headless", json!({"spec": {}})),
            resource(
                ResourceType::ReplicationController,
                "web-rc",
                json!({"spec": {"selector": {"app": "web"}}}),
            ),
            resource(ResourceType::Pod, "web-1", json!({"metadata": {"labels": {"app": "web"}}})),
            resource(ResourceType::Pod, "web-2", json!({"metadata": {"labels": {"app": "web"}}})),
            resource(ResourceType::Pod, "db-1", json!({"metadata": {"labels": {"app": "db"}}})),
        ];
        let relations = RelationEngine::new("tester").infer(&resources, TS);

        assert_eq!(count(&relations, RelationType::LoadBalances), 2);
        assert_eq!(count(&relations, RelationType::Monitors), 2);
        assert!(relations
            .iter()
            .all(|r| r.target != "db-1" && r.source != "headless"));
    }
}
