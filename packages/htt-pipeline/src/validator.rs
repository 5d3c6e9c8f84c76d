//! Consistency checks across a resolved config and its assembled graph
//!
//! The validator runs every registered [`ValidationRule`] and collects all
//! violations into a [`ValidationReport`]; it never stops at the first one
//! and never repairs anything. Rule order is preserved in the report.

use crate::error::{PipelineError, PipelineResult};
use crate::graph::PipelineGraph;
use crate::stage::{Binding, StageId};
use htt_config::{template, FeatureGroup, ResolvedConfig, Tag, TagValue};
use serde::Serialize;
use std::fmt;
use tracing::warn;

// ─── Report ─────────────────────────────────────────────────────────────────

/// One broken invariant: the offending group and the values that conflict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub rule: String,
    pub group: String,
    pub values: Vec<String>,
}

impl Violation {
    pub fn new(rule: impl Into<String>, group: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            rule: rule.into(),
            group: group.into(),
            values,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: [{}]", self.rule, self.group, self.values.join(", "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter()
    }

    /// Violations raised by one rule
    pub fn by_rule<'a>(&'a self, rule: &'a str) -> impl Iterator<Item = &'a Violation> + 'a {
        self.violations.iter().filter(move |v| v.rule == rule)
    }

    pub fn into_result(self) -> PipelineResult<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(PipelineError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for violation in &self.violations {
            writeln!(f, "  {}", violation)?;
        }
        Ok(())
    }
}

// ─── Rule trait ─────────────────────────────────────────────────────────────

pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, graph: &PipelineGraph, config: &ResolvedConfig) -> PipelineResult<Vec<Violation>>;
}

// ─── Validator ──────────────────────────────────────────────────────────────

pub struct ConsistencyValidator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl ConsistencyValidator {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_defaults() -> Self {
        let mut validator = Self::new();
        validator.add_rule(Box::new(InputSourceRule));
        validator.add_rule(Box::new(RoadFinderRule));
        validator.add_rule(Box::new(FilterThresholdRule));
        validator.add_rule(Box::new(LrtExclusivityRule));
        validator.add_rule(Box::new(FilePathsRule));
        validator.add_rule(Box::new(BindingsRule));
        validator
    }

    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn validate(&self, graph: &PipelineGraph, config: &ResolvedConfig) -> PipelineResult<ValidationReport> {
        let mut report = ValidationReport::default();
        for rule in &self.rules {
            for violation in rule.validate(graph, config)? {
                warn!(rule = %violation.rule, group = %violation.group, values = ?violation.values, "Validation violation");
                report.violations.push(violation);
            }
        }
        Ok(report)
    }
}

impl Default for ConsistencyValidator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Concrete rules
// ═══════════════════════════════════════════════════════════════════════════

fn group_violations(rule: &str, groups: &[FeatureGroup], algo: &Tag) -> PipelineResult<Vec<Violation>> {
    let mut out = Vec::new();
    for group in groups {
        if let Some(violation) = group.check(algo)? {
            out.push(Violation::new(rule, violation.group.name(), violation.active));
        }
    }
    Ok(out)
}

// ─── input source exclusivity ───────────────────────────────────────────────

struct InputSourceRule;

impl ValidationRule for InputSourceRule {
    fn name(&self) -> &str {
        "input_source"
    }

    fn validate(&self, _graph: &PipelineGraph, config: &ResolvedConfig) -> PipelineResult<Vec<Violation>> {
        match config.algo() {
            Some(algo) => group_violations(self.name(), &[FeatureGroup::InputSource], algo),
            None => Ok(Vec::new()),
        }
    }
}

// ─── road finder exclusivity (nominal branch only) ──────────────────────────

struct RoadFinderRule;

impl ValidationRule for RoadFinderRule {
    fn name(&self) -> &str {
        "road_finder"
    }

    fn validate(&self, _graph: &PipelineGraph, config: &ResolvedConfig) -> PipelineResult<Vec<Violation>> {
        match config.algo() {
            Some(algo) if !algo.bool("lrt")? => group_violations(self.name(), &[FeatureGroup::RoadFinder], algo),
            _ => Ok(Vec::new()),
        }
    }
}

// ─── single-value thresholds ────────────────────────────────────────────────

struct FilterThresholdRule;

impl ValidationRule for FilterThresholdRule {
    fn name(&self) -> &str {
        "filter_threshold"
    }

    fn validate(&self, graph: &PipelineGraph, config: &ResolvedConfig) -> PipelineResult<Vec<Violation>> {
        let Some(algo) = config.algo() else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for filter in [StageId::EtaPatternFilter, StageId::PhiRoadFilter] {
            if !graph.contains(filter) {
                continue;
            }
            let threshold = algo.int_list("threshold")?;
            if threshold.len() != 1 {
                out.push(Violation::new(
                    self.name(),
                    filter.name(),
                    threshold.iter().map(i64::to_string).collect(),
                ));
            }
        }
        Ok(out)
    }
}

// ─── LRT exclusivity ────────────────────────────────────────────────────────

struct LrtExclusivityRule;

impl ValidationRule for LrtExclusivityRule {
    fn name(&self) -> &str {
        "lrt_exclusivity"
    }

    fn validate(&self, _graph: &PipelineGraph, config: &ResolvedConfig) -> PipelineResult<Vec<Violation>> {
        match config.algo() {
            Some(algo) => group_violations(
                self.name(),
                &[FeatureGroup::LrtHitFilter, FeatureGroup::LrtRoadFinder],
                algo,
            ),
            None => Ok(Vec::new()),
        }
    }
}

// ─── file paths of enabled stages ───────────────────────────────────────────

struct FilePathsRule;

fn has_empty_path(value: &TagValue) -> bool {
    match value {
        TagValue::List(items) => items.is_empty() || items.iter().any(has_empty_path),
        other => other.is_empty(),
    }
}

impl FilePathsRule {
    fn check(&self, owner: &str, binding: &Binding, config: &ResolvedConfig) -> Option<Violation> {
        let Binding::Config { namespace, key } = binding else {
            return None;
        };
        let is_path = template(*namespace).field(key).map(|spec| spec.path).unwrap_or(false);
        if !is_path {
            return None;
        }
        // Absent tags or keys are reported by the bindings rule
        let value = config.tag(*namespace).and_then(|tag| tag.get(key))?;
        has_empty_path(value).then(|| Violation::new(self.name(), owner, vec![format!("{}.{}", namespace, key)]))
    }
}

impl ValidationRule for FilePathsRule {
    fn name(&self) -> &str {
        "file_paths"
    }

    fn validate(&self, graph: &PipelineGraph, config: &ResolvedConfig) -> PipelineResult<Vec<Violation>> {
        let mut bindings: Vec<(&str, &Binding)> = Vec::new();
        for stage in graph.stages() {
            for input in &stage.inputs {
                bindings.push((stage.name(), &input.binding));
            }
        }
        for service in graph.services() {
            for binding in &service.path_inputs {
                bindings.push((service.name.as_str(), binding));
            }
        }

        Ok(bindings
            .into_iter()
            .filter_map(|(owner, binding)| self.check(owner, binding, config))
            .collect())
    }
}

// ─── bindings ───────────────────────────────────────────────────────────────

struct BindingsRule;

impl ValidationRule for BindingsRule {
    fn name(&self) -> &str {
        "bindings"
    }

    fn validate(&self, graph: &PipelineGraph, config: &ResolvedConfig) -> PipelineResult<Vec<Violation>> {
        let mut out = Vec::new();
        for stage in graph.stages() {
            for input in &stage.inputs {
                let resolved = match &input.binding {
                    Binding::Root { .. } => true,
                    Binding::Stage { stage: upstream, port } => graph
                        .stage(*upstream)
                        .map(|s| s.produces(port))
                        .unwrap_or(false),
                    Binding::Config { namespace, key } => config
                        .tag(*namespace)
                        .map(|tag| tag.contains(key))
                        .unwrap_or(false),
                    Binding::Service { name } => graph.service(name).is_some(),
                };
                if !resolved {
                    out.push(Violation::new(
                        self.name(),
                        stage.name(),
                        vec![format!("{} <- {}", input.name, input.binding)],
                    ));
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::PipelineAssembler;
    use htt_config::{OverrideSet, PathTemplateExpander, Stage, TagResolver};
    use pretty_assertions::assert_eq;

    fn build(overrides: OverrideSet) -> (PipelineGraph, ResolvedConfig) {
        let config = TagResolver::builtin().resolve(Stage::Algo, &overrides).unwrap();
        let config = PathTemplateExpander::expand_config(&config).unwrap();
        let graph = PipelineAssembler::new().assemble(&config).unwrap();
        (graph, config)
    }

    #[test]
    fn test_default_rule_order() {
        assert_eq!(
            ConsistencyValidator::with_defaults().rule_names(),
            vec![
                "input_source",
                "road_finder",
                "filter_threshold",
                "lrt_exclusivity",
                "file_paths",
                "bindings"
            ]
        );
    }

    #[test]
    fn test_builtin_presets_are_valid() {
        for algo in ["default", "sectors", "hough", "hough_1d", "lrt_doublet", "lrt_straight"] {
            let (graph, config) = build(OverrideSet::new().set("algoTag", algo).set("secondStage", true));
            let report = ConsistencyValidator::with_defaults().validate(&graph, &config).unwrap();
            assert!(report.is_ok(), "{}: {}", algo, report);
        }
    }

    #[test]
    fn test_road_finder_conflict_reported() {
        let (graph, config) = build(OverrideSet::new().set("hough", true).set("hough_1d", true));
        let report = ConsistencyValidator::with_defaults().validate(&graph, &config).unwrap();
        assert_eq!(
            report.violations,
            vec![Violation::new(
                "road_finder",
                "road finder",
                vec!["hough".to_string(), "hough_1d".to_string()]
            )]
        );
    }

    #[test]
    fn test_empty_path_reported() {
        let (graph, config) = build(OverrideSet::new().set("bank.sectorSlices", ""));
        let report = ConsistencyValidator::with_defaults().validate(&graph, &config).unwrap();
        assert_eq!(
            report.violations,
            vec![Violation::new("file_paths", "road_finder", vec!["bank.sectorSlices".to_string()])]
        );
    }

    #[test]
    fn test_empty_hough_1d_file_reported() {
        let (graph, config) = build(OverrideSet::new().set("algoTag", "hough_1d").set("hough1d_radiiFile", ""));
        let report = ConsistencyValidator::with_defaults().validate(&graph, &config).unwrap();
        assert_eq!(
            report.violations,
            vec![Violation::new("file_paths", "road_finder", vec!["algo.hough1d_radiiFile".to_string()])]
        );
    }

    #[test]
    fn test_empty_slices_reported_for_lrt_event_selection() {
        let (graph, config) = build(OverrideSet::new().set("algoTag", "lrt_doublet").set("map.slices", ""));
        let report = ConsistencyValidator::with_defaults().validate(&graph, &config).unwrap();
        assert_eq!(
            report.violations,
            vec![Violation::new("file_paths", "EvtSelLRTSvc", vec!["map.slices".to_string()])]
        );

        // Without LRT nothing reads the slices file
        let (graph, config) = build(OverrideSet::new().set("map.slices", ""));
        let report = ConsistencyValidator::with_defaults().validate(&graph, &config).unwrap();
        assert!(report.is_ok(), "{}", report);
    }

    #[test]
    fn test_missing_bank_reported_as_bindings() {
        let (graph, config) = build(OverrideSet::new());
        let without_bank = config.with_tags(config.map().clone(), None, config.algo().cloned());
        let report = ConsistencyValidator::with_defaults()
            .validate(&graph, &without_bank)
            .unwrap();
        assert!(report.by_rule("bindings").count() > 0);
        assert!(report
            .by_rule("bindings")
            .any(|v| v.group == "track_fit_1st" && v.values == vec!["constants <- config:bank.constants_1st"]));
    }

    #[test]
    fn test_report_into_result() {
        assert!(ValidationReport::default().into_result().is_ok());
        let report = ValidationReport {
            violations: vec![Violation::new("bindings", "monitoring", vec!["x".to_string()])],
        };
        let err = report.into_result().unwrap_err();
        assert!(err.to_string().contains("[bindings] monitoring: [x]"));
    }
}
