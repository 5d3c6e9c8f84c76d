//! Pipeline stages, their bindings and enablement predicates

use crate::error::{PipelineError, PipelineResult};
use crate::params::StageParams;
use htt_config::{FeatureGroup, Namespace, Tag, TagValue};
use serde::Serialize;
use std::fmt;

/// Pipeline stage identifier
///
/// Variants are declared in template order, which is also a valid
/// topological order of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    // ═══════════════════════════════════════════════════════════════
    // Nominal front end
    // ═══════════════════════════════════════════════════════════════
    Input,
    HitProcessing,
    EtaPatternFilter,
    PhiRoadFilter,
    RoadFinder,
    NnTrackClassifier,
    HoughRootOutput,

    // ═══════════════════════════════════════════════════════════════
    // LRT front end (replaces filters and road finder)
    // ═══════════════════════════════════════════════════════════════
    LrtHitFilter,
    LrtRoadFinder,

    // ═══════════════════════════════════════════════════════════════
    // Fitting
    // ═══════════════════════════════════════════════════════════════
    #[serde(rename = "track_fit_1st")]
    TrackFit1st,
    #[serde(rename = "overlap_removal_1st")]
    OverlapRemoval1st,
    Extrapolation,
    #[serde(rename = "track_fit_2nd")]
    TrackFit2nd,
    #[serde(rename = "overlap_removal_2nd")]
    OverlapRemoval2nd,

    Monitoring,
}

impl StageId {
    pub const TEMPLATE: [StageId; 15] = [
        StageId::Input,
        StageId::HitProcessing,
        StageId::EtaPatternFilter,
        StageId::PhiRoadFilter,
        StageId::RoadFinder,
        StageId::NnTrackClassifier,
        StageId::HoughRootOutput,
        StageId::LrtHitFilter,
        StageId::LrtRoadFinder,
        StageId::TrackFit1st,
        StageId::OverlapRemoval1st,
        StageId::Extrapolation,
        StageId::TrackFit2nd,
        StageId::OverlapRemoval2nd,
        StageId::Monitoring,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::HitProcessing => "hit_processing",
            Self::EtaPatternFilter => "eta_pattern_filter",
            Self::PhiRoadFilter => "phi_road_filter",
            Self::RoadFinder => "road_finder",
            Self::NnTrackClassifier => "nn_track_classifier",
            Self::HoughRootOutput => "hough_root_output",
            Self::LrtHitFilter => "lrt_hit_filter",
            Self::LrtRoadFinder => "lrt_road_finder",
            Self::TrackFit1st => "track_fit_1st",
            Self::OverlapRemoval1st => "overlap_removal_1st",
            Self::Extrapolation => "extrapolation",
            Self::TrackFit2nd => "track_fit_2nd",
            Self::OverlapRemoval2nd => "overlap_removal_2nd",
            Self::Monitoring => "monitoring",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Input => "Read or generate raw hits",
            Self::HitProcessing => "Convert raw hits to logical hits, cluster and form space points",
            Self::EtaPatternFilter => "Drop road candidates outside the eta pattern",
            Self::PhiRoadFilter => "Drop road candidates outside the phi window",
            Self::RoadFinder => "Group hits into roads",
            Self::NnTrackClassifier => "Score Hough roads with a neural network",
            Self::HoughRootOutput => "Write Hough roads to a side-channel tree",
            Self::LrtHitFilter => "Select hits for long-lived particle tracking",
            Self::LrtRoadFinder => "Find large-impact-parameter roads",
            Self::TrackFit1st => "Fit first-stage tracks",
            Self::OverlapRemoval1st => "Remove duplicate first-stage tracks",
            Self::Extrapolation => "Extrapolate first-stage tracks to the outer layers",
            Self::TrackFit2nd => "Fit second-stage tracks",
            Self::OverlapRemoval2nd => "Remove duplicate second-stage tracks",
            Self::Monitoring => "Fill performance histograms from fitted tracks",
        }
    }

    /// Enablement predicate for this position of the template
    pub fn enablement(&self) -> Enablement {
        use Enablement::*;
        let nominal = || Not(Box::new(Flag("lrt".into())));
        let hough = || Selected {
            group: FeatureGroup::RoadFinder,
            member: "hough".into(),
        };
        match self {
            Self::Input | Self::HitProcessing | Self::TrackFit1st | Self::OverlapRemoval1st => Always,
            Self::Monitoring => Always,
            Self::EtaPatternFilter => All(vec![nominal(), NonEmpty("EtaPatternRoadFilter".into())]),
            Self::PhiRoadFilter => All(vec![nominal(), NonEmpty("PhiRoadFilter".into())]),
            Self::RoadFinder => nominal(),
            Self::NnTrackClassifier => All(vec![nominal(), hough(), Flag("TrackNNAnalysis".into())]),
            Self::HoughRootOutput => All(vec![nominal(), hough(), Flag("hough_rootoutput".into())]),
            Self::LrtHitFilter => All(vec![Flag("lrt".into()), any_selected(FeatureGroup::LrtHitFilter)]),
            Self::LrtRoadFinder => All(vec![Flag("lrt".into()), any_selected(FeatureGroup::LrtRoadFinder)]),
            Self::Extrapolation | Self::TrackFit2nd | Self::OverlapRemoval2nd => Flag("secondStage".into()),
        }
    }
}

fn any_selected(group: FeatureGroup) -> Enablement {
    Enablement::Any(
        group
            .members()
            .iter()
            .map(|member| Enablement::Selected {
                group,
                member: member.to_string(),
            })
            .collect(),
    )
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Always-available inputs supplied by the execution host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootInput {
    EventFile,
    OverlayFile,
}

/// Where a stage input comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Binding {
    Root { input: RootInput },
    Stage { stage: StageId, port: String },
    Config { namespace: Namespace, key: String },
    Service { name: String },
}

impl Binding {
    pub fn root(input: RootInput) -> Self {
        Self::Root { input }
    }

    pub fn stage(stage: StageId, port: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            port: port.into(),
        }
    }

    pub fn config(namespace: Namespace, key: impl Into<String>) -> Self {
        Self::Config {
            namespace,
            key: key.into(),
        }
    }

    pub fn service(name: impl Into<String>) -> Self {
        Self::Service { name: name.into() }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root { input } => write!(f, "root:{:?}", input),
            Self::Stage { stage, port } => write!(f, "{}.{}", stage, port),
            Self::Config { namespace, key } => write!(f, "config:{}.{}", namespace, key),
            Self::Service { name } => write!(f, "service:{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageInput {
    pub name: String,
    pub binding: Binding,
}

impl StageInput {
    pub fn new(name: impl Into<String>, binding: Binding) -> Self {
        Self {
            name: name.into(),
            binding,
        }
    }
}

/// Predicate over the algo tag deciding whether a stage exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enablement {
    Always,
    /// Boolean field is true
    Flag(String),
    /// String or list field is non-empty
    NonEmpty(String),
    /// `member` is the priority pick among the group's active members
    Selected { group: FeatureGroup, member: String },
    Not(Box<Enablement>),
    All(Vec<Enablement>),
    Any(Vec<Enablement>),
}

impl Enablement {
    /// Evaluate against the algo tag; any referenced field that is missing
    /// or of the wrong kind fails the whole stage.
    pub fn evaluate(&self, algo: &Tag, stage: StageId) -> PipelineResult<bool> {
        match self {
            Self::Always => Ok(true),
            Self::Flag(key) => flag(algo, key, stage),
            Self::NonEmpty(key) => match algo.get(key) {
                Some(value @ (TagValue::Str(_) | TagValue::List(_))) => Ok(!value.is_empty()),
                Some(other) => Err(PipelineError::assembly(
                    stage.name(),
                    format!("field '{}' is a {}, expected a string or list", key, other.kind_name()),
                )),
                None => Err(missing(algo, key, stage)),
            },
            Self::Selected { group, member } => {
                let mut first_active = None;
                for candidate in group.members() {
                    if flag(algo, candidate, stage)? && first_active.is_none() {
                        first_active = Some(*candidate);
                    }
                }
                Ok(first_active == Some(member.as_str()))
            }
            Self::Not(inner) => Ok(!inner.evaluate(algo, stage)?),
            Self::All(parts) => {
                // Evaluate every part so a missing flag is never masked by a short circuit
                let mut result = true;
                for part in parts {
                    result &= part.evaluate(algo, stage)?;
                }
                Ok(result)
            }
            Self::Any(parts) => {
                let mut result = false;
                for part in parts {
                    result |= part.evaluate(algo, stage)?;
                }
                Ok(result)
            }
        }
    }
}

fn flag(algo: &Tag, key: &str, stage: StageId) -> PipelineResult<bool> {
    match algo.get(key) {
        Some(TagValue::Bool(value)) => Ok(*value),
        Some(other) => Err(PipelineError::assembly(
            stage.name(),
            format!("flag '{}' is a {}, expected a bool", key, other.kind_name()),
        )),
        None => Err(missing(algo, key, stage)),
    }
}

fn missing(algo: &Tag, key: &str, stage: StageId) -> PipelineError {
    PipelineError::assembly(
        stage.name(),
        format!("flag '{}' is missing from algo tag '{}'", key, algo.name()),
    )
}

/// One processing unit of the assembled graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStage {
    pub id: StageId,
    /// Concrete component variant, e.g. `hough` for the road finder
    pub component: String,
    pub inputs: Vec<StageInput>,
    pub outputs: Vec<String>,
    pub params: StageParams,
    /// Observers read other stages' outputs and never feed the pipeline
    pub observer: bool,
}

impl PipelineStage {
    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    pub fn produces(&self, port: &str) -> bool {
        self.outputs.iter().any(|output| output == port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use htt_config::template;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn algo(flags: &[&str]) -> Tag {
        flags.iter().fold(template(Namespace::Algo).defaults(), |tag, flag| {
            tag.with(*flag, true.into())
        })
    }

    #[test]
    fn test_template_order_matches_declaration() {
        let mut sorted = StageId::TEMPLATE;
        sorted.sort();
        assert_eq!(sorted, StageId::TEMPLATE);
    }

    #[test]
    fn test_stage_metadata() {
        for stage in StageId::TEMPLATE {
            assert!(!stage.name().is_empty());
            assert!(!stage.description().is_empty());
        }
        assert_eq!(StageId::TrackFit1st.to_string(), "track_fit_1st");
    }

    #[test]
    fn test_default_enablement() {
        let tag = algo(&[]);
        let enabled: Vec<StageId> = StageId::TEMPLATE
            .into_iter()
            .filter(|stage| stage.enablement().evaluate(&tag, *stage).unwrap())
            .collect();
        assert_eq!(
            enabled,
            vec![
                StageId::Input,
                StageId::HitProcessing,
                StageId::RoadFinder,
                StageId::TrackFit1st,
                StageId::OverlapRemoval1st,
                StageId::Monitoring,
            ]
        );
    }

    #[test]
    fn test_nn_requires_selected_hough() {
        let stage = StageId::NnTrackClassifier;
        assert!(stage
            .enablement()
            .evaluate(&algo(&["hough", "TrackNNAnalysis"]), stage)
            .unwrap());
        // sectorsAsPatterns outranks hough
        assert!(!stage
            .enablement()
            .evaluate(&algo(&["sectorsAsPatterns", "hough", "TrackNNAnalysis"]), stage)
            .unwrap());
    }

    #[test]
    fn test_lrt_replaces_road_finder() {
        let tag = algo(&["lrt", "lrt_use_basicHitFilter", "lrt_use_doubletHT"]);
        let finder = StageId::RoadFinder;
        assert!(!finder.enablement().evaluate(&tag, finder).unwrap());
        let lrt = StageId::LrtRoadFinder;
        assert!(lrt.enablement().evaluate(&tag, lrt).unwrap());
    }

    #[test]
    fn test_filter_enabled_by_non_empty_field() {
        let tag = algo(&[]).with("EtaPatternRoadFilter", "eta_patterns.root".into());
        let stage = StageId::EtaPatternFilter;
        assert!(stage.enablement().evaluate(&tag, stage).unwrap());

        let tag = algo(&[]).with("PhiRoadFilter", vec![0.01, 0.02].into());
        let stage = StageId::PhiRoadFilter;
        assert!(stage.enablement().evaluate(&tag, stage).unwrap());
    }

    #[test]
    fn test_missing_flag_is_assembly_error() {
        let mut fields: BTreeMap<String, TagValue> = algo(&[]).fields().clone();
        fields.remove("secondStage");
        let tag = Tag::from_fields(Namespace::Algo, fields);

        let stage = StageId::Extrapolation;
        match stage.enablement().evaluate(&tag, stage).unwrap_err() {
            PipelineError::Assembly { stage, reason } => {
                assert_eq!(stage, "extrapolation");
                assert!(reason.contains("secondStage"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_bool_flag_rejected() {
        let tag = algo(&[]).with("lrt", "yes".into());
        let stage = StageId::RoadFinder;
        assert!(matches!(
            stage.enablement().evaluate(&tag, stage),
            Err(PipelineError::Assembly { .. })
        ));
    }

    #[test]
    fn test_binding_display() {
        assert_eq!(
            Binding::stage(StageId::HitProcessing, "logical_hits").to_string(),
            "hit_processing.logical_hits"
        );
        assert_eq!(
            Binding::config(Namespace::Bank, "constants_1st").to_string(),
            "config:bank.constants_1st"
        );
    }
}
