//! One-call facade: resolve, expand, assemble and validate

use crate::assembler::PipelineAssembler;
use crate::error::PipelineResult;
use crate::graph::PipelineGraph;
use crate::services::ServiceContainer;
use crate::validator::ConsistencyValidator;
use htt_config::{OverrideSet, PathTemplateExpander, ResolvedConfig, Stage, TagRegistry, TagResolver};
use tracing::info;

/// A validated pipeline and the expanded config it was built from
#[derive(Debug, Clone)]
pub struct BuiltPipeline {
    pub config: ResolvedConfig,
    pub graph: PipelineGraph,
}

impl BuiltPipeline {
    /// Register the graph's services with the caller's container
    pub fn install(&self, container: &mut ServiceContainer) -> PipelineResult<()> {
        container.install(self.graph.services())
    }
}

pub struct PipelineBuilder<'r> {
    resolver: TagResolver<'r>,
    assembler: PipelineAssembler,
    validator: ConsistencyValidator,
}

impl PipelineBuilder<'static> {
    /// Builder over the built-in tag catalog
    pub fn builtin() -> Self {
        Self::new(TagRegistry::builtin())
    }
}

impl<'r> PipelineBuilder<'r> {
    pub fn new(registry: &'r TagRegistry) -> Self {
        Self {
            resolver: TagResolver::new(registry),
            assembler: PipelineAssembler::new(),
            validator: ConsistencyValidator::with_defaults(),
        }
    }

    pub fn with_assembler(mut self, assembler: PipelineAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn with_validator(mut self, validator: ConsistencyValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn build(&self, overrides: &OverrideSet) -> PipelineResult<BuiltPipeline> {
        let resolved = self.resolver.resolve(Stage::Algo, overrides)?;
        let config = PathTemplateExpander::expand_config(&resolved)?;
        let graph = self.assembler.assemble(&config)?;
        self.validator.validate(&graph, &config)?.into_result()?;
        info!(stages = ?graph.stage_names(), "Pipeline ready");
        Ok(BuiltPipeline { config, graph })
    }
}
