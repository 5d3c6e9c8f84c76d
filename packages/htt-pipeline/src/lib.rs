//! HTT pipeline assembly
//!
//! Turns a resolved tag configuration into a graph of processing stages with
//! explicit bindings, the services those stages need, and a consistency
//! report.
//!
//! # Usage
//!
//! ```no_run
//! use htt_config::OverrideSet;
//! use htt_pipeline::PipelineBuilder;
//!
//! let overrides = OverrideSet::new()
//!     .set("algoTag", "hough")
//!     .set("secondStage", true);
//! let built = PipelineBuilder::builtin().build(&overrides)?;
//! println!("{}", built.graph.to_json()?);
//! # Ok::<(), htt_pipeline::PipelineError>(())
//! ```

pub mod assembler;
pub mod builder;
pub mod error;
pub mod graph;
pub mod monitoring;
pub mod params;
pub mod services;
pub mod stage;
pub mod telemetry;
pub mod validator;

pub use assembler::PipelineAssembler;
pub use builder::{BuiltPipeline, PipelineBuilder};
pub use error::{PipelineError, PipelineResult};
pub use graph::{PipelineGraph, RunOptions, StageEdge};
pub use monitoring::{select_chi2_cuts, Chi2Cuts};
pub use params::{Component, FieldReader, StageParams};
pub use services::{ServiceContainer, ServiceDescriptor, ServiceKind};
pub use stage::{Binding, Enablement, PipelineStage, RootInput, StageId, StageInput};
pub use telemetry::init_tracing;
pub use validator::{ConsistencyValidator, ValidationReport, ValidationRule, Violation};
