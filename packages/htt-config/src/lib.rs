//! HTT tag configuration
//!
//! Resolves hierarchical named configuration tags (map / bank / algo) into a
//! complete, internally consistent parameter set.
//!
//! # Usage
//!
//! ```no_run
//! use htt_config::{OverrideSet, PathTemplateExpander, Stage, TagResolver};
//!
//! let overrides = OverrideSet::new()
//!     .set("algoTag", "hough")
//!     .set("secondStage", true)
//!     .set("region", "1");
//! let resolved = TagResolver::builtin().resolve(Stage::Algo, &overrides)?;
//! let expanded = PathTemplateExpander::expand_config(&resolved)?;
//! println!("{}", expanded.bank().map(|b| b.name()).unwrap_or_default());
//! # Ok::<(), htt_config::ConfigError>(())
//! ```

pub mod catalog;
pub mod describe;
pub mod error;
pub mod expander;
pub mod features;
pub mod namespace;
pub mod overrides;
pub mod provenance;
pub mod region;
pub mod registry;
pub mod resolver;
pub mod schema;
pub mod tag;
pub mod value;

pub use describe::{default_histogram_filename, describe, describe_filename};
pub use error::{ConfigError, ConfigResult};
pub use expander::{PathTemplateExpander, TemplateContext};
pub use features::{
    FeatureGroup, FeatureSelection, GroupViolation, InputSource, LrtHitFilter, LrtRoadFinder,
    LrtSelection, RoadFinderVariant,
};
pub use namespace::{Namespace, Stage};
pub use overrides::{OverrideSet, OverrideValue};
pub use provenance::{ConfigProvenance, ConfigSource};
pub use region::RegionSelection;
pub use registry::{TagRecord, TagRegistry, TagRegistryBuilder};
pub use resolver::{ResolvedConfig, TagResolver};
pub use schema::{template, FieldSpec, Template};
pub use tag::Tag;
pub use value::{TagValue, ValueKind};
