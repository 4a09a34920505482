//! Graph assembly
//!
//! Serves the two views of the cluster: resources only, and resources with
//! their inferred relations. Each call collects a fresh snapshot.

use crate::collector::{Collector, Snapshot};
use crate::error::GraphError;
use crate::models::{ContextGraph, RelationType, ResourceType};
use crate::relations::RelationEngine;
use crate::state::GraphState;
use std::sync::Arc;
use tokio::time::Instant;

pub const VIEW_RESOURCES: &str = "resources";
pub const VIEW_FULL: &str = "full";

/// Entry point for graph queries
#[derive(Clone)]
pub struct GraphService {
    state: Arc<GraphState>,
    collector: Collector,
    engine: Arc<RelationEngine>,
}

impl GraphService {
    pub fn new(state: Arc<GraphState>) -> Self {
        let engine = RelationEngine::new(state.config.created_by.clone());
        Self {
            collector: Collector::new(state.clone()),
            state,
            engine: Arc::new(engine),
        }
    }

    pub fn state(&self) -> &Arc<GraphState> {
        &self.state
    }

    /// All resources, no relations
    pub async fn get_resources(&self) -> Result<ContextGraph, GraphError> {
        let started = Instant::now();
        let snapshot = self.collector.collect_all().await?;
        Ok(self.assemble(VIEW_RESOURCES, snapshot, false, started))
    }

    /// Resources of a single type, no relations
    pub async fn get_resources_of(&self, kind: ResourceType) -> Result<ContextGraph, GraphError> {
        let started = Instant::now();
        let snapshot = self.collector.collect(&[kind]).await?;
        Ok(self.assemble(kind.path_segment(), snapshot, false, started))
    }

    /// All resources and every relation between them
    pub async fn get_full_graph(&self) -> Result<ContextGraph, GraphError> {
        let started = Instant::now();
        let snapshot = self.collector.collect_all().await?;
        Ok(self.assemble(VIEW_FULL, snapshot, true, started))
    }

    fn assemble(&self, view: &str, snapshot: Snapshot, with_relations: bool, started: Instant) -> ContextGraph {
        let Snapshot {
            collection_start,
            collection_end,
            resources,
            failures,
        } = snapshot;

        let relations = if with_relations {
            self.engine.infer(&resources, &collection_end)
        } else {
            Vec::new()
        };

        let graph = ContextGraph {
            timestamp: collection_end.clone(),
            resources,
            relations,
        };

        let metrics = &self.state.metrics;
        metrics.observe_snapshot(view, started.elapsed().as_secs_f64());
        for kind in ResourceType::ALL {
            metrics.set_resource_count(kind, graph.count_resources(kind));
        }
        if with_relations {
            for kind in RelationType::ALL {
                metrics.set_relation_count(kind, graph.count_relations(kind));
            }
        }

        self.state.logger.log_snapshot(
            view,
            graph.resources.len(),
            graph.relations.len(),
            failures.len(),
            (&collection_start, &collection_end),
        );

        graph
    }
}
