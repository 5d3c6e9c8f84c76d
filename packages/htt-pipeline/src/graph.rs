//! Assembled pipeline graph
//!
//! Stages are stored in template order. The petgraph view is built from the
//! stage-to-stage bindings and is used for cycle detection and dependency
//! queries:
//! - An edge A → B means B reads one of A's outputs
//! - Bindings to stages absent from the graph add no edge (the validator
//!   reports them)

use crate::error::{PipelineError, PipelineResult};
use crate::params::{Component, FieldReader};
use crate::services::ServiceDescriptor;
use crate::stage::{Binding, PipelineStage, StageId};
use htt_config::Tag;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;
use std::collections::HashMap;

/// Top-level switches of the processing algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOptions {
    pub do_tracking: bool,
    pub write_output_data: bool,
    pub output_hit_txt: bool,
    pub do_missing_hits_checks: bool,
    pub hit_filtering: bool,
    pub hough_monitor: bool,
    pub llp_hough_monitor: bool,
    pub description: String,
}

impl RunOptions {
    pub fn read(algo: &Tag, description: String) -> PipelineResult<Self> {
        let r = FieldReader::algo(Component::RunOptions, algo);
        let lrt = r.bool("lrt")?;
        Ok(Self {
            do_tracking: r.bool("doTracking")?,
            write_output_data: r.bool("writeOutputData")?,
            output_hit_txt: r.bool("outputHitTxt")?,
            do_missing_hits_checks: r.bool("DoMissingHitsChecks")?,
            hit_filtering: r.bool("HitFiltering")?,
            hough_monitor: r.bool("hough")? && !lrt,
            llp_hough_monitor: r.bool("houghplotJMS")? || lrt,
            description,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageEdge {
    pub from: StageId,
    pub to: StageId,
    pub port: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineGraph {
    stages: Vec<PipelineStage>,
    edges: Vec<StageEdge>,
    services: Vec<ServiceDescriptor>,
    run_options: RunOptions,

    #[serde(skip)]
    graph: DiGraph<StageId, ()>,
    #[serde(skip)]
    stage_to_node: HashMap<StageId, NodeIndex>,
}

impl PipelineGraph {
    pub fn new(
        stages: Vec<PipelineStage>,
        services: Vec<ServiceDescriptor>,
        run_options: RunOptions,
    ) -> PipelineResult<Self> {
        let mut graph = DiGraph::new();
        let mut stage_to_node = HashMap::new();
        for stage in &stages {
            stage_to_node.insert(stage.id, graph.add_node(stage.id));
        }

        let mut edges = Vec::new();
        for stage in &stages {
            for input in &stage.inputs {
                let Binding::Stage { stage: from, port } = &input.binding else {
                    continue;
                };
                if let (Some(&from_idx), Some(&to_idx)) =
                    (stage_to_node.get(from), stage_to_node.get(&stage.id))
                {
                    if graph.find_edge(from_idx, to_idx).is_none() {
                        graph.add_edge(from_idx, to_idx, ());
                    }
                    edges.push(StageEdge {
                        from: *from,
                        to: stage.id,
                        port: port.clone(),
                    });
                }
            }
        }

        toposort(&graph, None)
            .map_err(|cycle| PipelineError::Cycle(graph[cycle.node_id()].name().to_string()))?;

        Ok(Self {
            stages,
            edges,
            services,
            run_options,
            graph,
            stage_to_node,
        })
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    pub fn stage(&self, id: StageId) -> Option<&PipelineStage> {
        self.stages.iter().find(|stage| stage.id == id)
    }

    pub fn contains(&self, id: StageId) -> bool {
        self.stage_to_node.contains_key(&id)
    }

    /// Stage ids in execution order
    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.iter().map(|stage| stage.id).collect()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(PipelineStage::name).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn edges(&self) -> &[StageEdge] {
        &self.edges
    }

    /// Stages whose outputs `id` reads
    pub fn dependencies(&self, id: StageId) -> Vec<StageId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Stages that read an output of `id`
    pub fn dependents(&self, id: StageId) -> Vec<StageId> {
        self.neighbors(id, Direction::Outgoing)
    }

    fn neighbors(&self, id: StageId, direction: Direction) -> Vec<StageId> {
        let Some(&idx) = self.stage_to_node.get(&id) else {
            return Vec::new();
        };
        let mut ids: Vec<StageId> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n])
            .collect();
        ids.sort();
        ids
    }

    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|service| service.name == name)
    }

    pub fn run_options(&self) -> &RunOptions {
        &self.run_options
    }

    /// JSON document for the execution host
    pub fn to_json(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
