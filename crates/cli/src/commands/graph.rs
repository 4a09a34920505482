//! Graph query commands

use anyhow::{bail, Result};
use colored::Colorize;
use std::collections::BTreeMap;
use tabled::Tabled;

use crate::client::{ApiClient, Graph, Relation, Resource};
use crate::output::{format_timestamp, print_info, print_json, print_table, truncate, OutputFormat};

const ID_WIDTH: usize = 48;

/// Resource types and the server path segment listing them
const KINDS: &[(&str, &str)] = &[
    ("cluster", "cluster"),
    ("node", "nodes"),
    ("service", "services"),
    ("replicationcontroller", "rcontrollers"),
    ("rc", "rcontrollers"),
    ("pod", "pods"),
    ("container", "containers"),
    ("process", "processes"),
    ("image", "images"),
];

const RELATIONS: &[&str] = &["contains", "createdFrom", "loadBalances", "monitors", "runs"];

/// Row for resources table
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Fetched")]
    timestamp: String,
}

impl From<&Resource> for ResourceRow {
    fn from(resource: &Resource) -> Self {
        Self {
            kind: resource.kind.clone(),
            id: truncate(&resource.id, ID_WIDTH),
            label: resource.label().to_string(),
            timestamp: format_timestamp(&resource.timestamp),
        }
    }
}

/// Row for relations table
#[derive(Tabled)]
struct RelationRow {
    #[tabled(rename = "Relation")]
    kind: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Label")]
    label: String,
}

impl From<&Relation> for RelationRow {
    fn from(relation: &Relation) -> Self {
        Self {
            kind: relation.kind.clone(),
            source: truncate(&relation.source, ID_WIDTH),
            target: truncate(&relation.target, ID_WIDTH),
            label: relation.annotations.get("label").cloned().unwrap_or_default(),
        }
    }
}

/// Server path segment for a user-supplied type name (`pods`, `Pod`, `rc`, ...)
pub fn kind_segment(kind: &str) -> Option<&'static str> {
    let wanted = kind.to_lowercase();
    KINDS
        .iter()
        .find(|(name, segment)| {
            wanted == *name
                || wanted == *segment
                || wanted.strip_suffix('s') == Some(*name)
                || wanted.strip_suffix("es") == Some(*name)
        })
        .map(|(_, segment)| *segment)
}

/// Canonical relation name, case-insensitive
pub fn relation_name(relation: &str) -> Option<&'static str> {
    RELATIONS
        .iter()
        .find(|name| name.eq_ignore_ascii_case(relation))
        .copied()
}

fn print_summary(graph: &Graph) {
    let mut resources: BTreeMap<&str, usize> = BTreeMap::new();
    for resource in &graph.resources {
        *resources.entry(resource.kind.as_str()).or_default() += 1;
    }
    let summary: Vec<String> = resources
        .iter()
        .map(|(kind, count)| format!("{} {}", count, kind))
        .collect();

    println!("{}", "Context Graph".bold());
    println!("{}", "=".repeat(50));
    println!("Snapshot:   {}", format_timestamp(&graph.timestamp).cyan());
    println!("Resources:  {}", summary.join(", "));

    if !graph.relations.is_empty() {
        let mut relations: BTreeMap<&str, usize> = BTreeMap::new();
        for relation in &graph.relations {
            *relations.entry(relation.kind.as_str()).or_default() += 1;
        }
        let summary: Vec<String> = relations
            .iter()
            .map(|(kind, count)| format!("{} {}", count, kind))
            .collect();
        println!("Relations:  {}", summary.join(", "));
    }
    println!();
}

/// List resources, optionally of one type
pub async fn show_resources(client: &ApiClient, kind: Option<String>, format: OutputFormat) -> Result<()> {
    let segment = match kind.as_deref() {
        Some(kind) => match kind_segment(kind) {
            Some(segment) => Some(segment),
            None => bail!("Unknown resource type: {}", kind),
        },
        None => None,
    };

    let graph = client.resources(segment).await?;

    match format {
        OutputFormat::Json => print_json(&graph)?,
        OutputFormat::Table => {
            print_summary(&graph);
            let rows: Vec<ResourceRow> = graph.resources.iter().map(ResourceRow::from).collect();
            print_table(&rows);
        }
    }

    Ok(())
}

/// Show the full graph, or its Graphviz rendering
pub async fn show_graph(client: &ApiClient, dot: bool, format: OutputFormat) -> Result<()> {
    if dot {
        print!("{}", client.dot().await?);
        return Ok(());
    }

    let graph = client.full_graph().await?;

    match format {
        OutputFormat::Json => print_json(&graph)?,
        OutputFormat::Table => {
            print_summary(&graph);
            let rows: Vec<RelationRow> = graph.relations.iter().map(RelationRow::from).collect();
            print_table(&rows);
        }
    }

    Ok(())
}

/// List relations, optionally of one type
pub async fn show_relations(client: &ApiClient, relation: Option<String>, format: OutputFormat) -> Result<()> {
    let wanted = match relation.as_deref() {
        Some(relation) => match relation_name(relation) {
            Some(name) => Some(name),
            None => bail!(
                "Unknown relation type: {} (expected one of {})",
                relation,
                RELATIONS.join(", ")
            ),
        },
        None => None,
    };

    let graph = client.full_graph().await?;
    let relations: Vec<&Relation> = graph
        .relations
        .iter()
        .filter(|r| wanted.map_or(true, |name| r.kind == name))
        .collect();

    match format {
        OutputFormat::Json => print_json(&relations)?,
        OutputFormat::Table => {
            if let Some(name) = wanted {
                print_info(&format!("{} {} relations", relations.len(), name));
            }
            let rows: Vec<RelationRow> = relations.into_iter().map(RelationRow::from).collect();
            print_table(&rows);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_segment() {
        assert_eq!(kind_segment("pods"), Some("pods"));
        assert_eq!(kind_segment("Pod"), Some("pods"));
        assert_eq!(kind_segment("processes"), Some("processes"));
        assert_eq!(kind_segment("ReplicationController"), Some("rcontrollers"));
        assert_eq!(kind_segment("rc"), Some("rcontrollers"));
        assert_eq!(kind_segment("images"), Some("images"));
        assert_eq!(kind_segment("volumes"), None);
    }

    #[test]
    fn test_relation_name() {
        assert_eq!(relation_name("loadbalances"), Some("loadBalances"));
        assert_eq!(relation_name("runs"), Some("runs"));
        assert_eq!(relation_name("owns"), None);
    }
}
