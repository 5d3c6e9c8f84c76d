//! End-to-end assembly scenarios: resolve → expand → assemble → validate

use htt_config::*;
use htt_pipeline::params::{EtaPatternFilterParams, MonitoringParams, OverlapRemovalParams};
use htt_pipeline::services::{HISTOGRAM_SERVICE, HOUGH_OUTPUT_STREAM, LRT_EVENT_SELECTION_SERVICE};
use htt_pipeline::*;
use pretty_assertions::assert_eq;

// ============================================================================
// Fixtures
// ============================================================================

fn test_registry() -> TagRegistry {
    TagRegistry::builtin()
        .extend()
        .register(
            Namespace::Map,
            TagRecord::from_template(Namespace::Map)
                .set("name", "T1")
                .set("release", "21.9.16")
                .set("geoTag", "ATLAS-P2-ITK-22-02-00")
                .set("regionNames", vec!["R0", "R1", "R2"])
                .set("mapDir", "/maps/{regionName}/")
                .set("formatted", true)
                .set("pmap_1st", "ITk_8L.pmap")
                .set("pmap_2nd", "ITk_13L.pmap")
                .set("rmap", "ITk_reg{region}.rmap")
                .set("subrmap", "ITk_reg{region}_sub.rmap")
                .set("modulemap", "ITk.moduleidmap")
                .set("slices", "slices.txt"),
        )
        .unwrap()
        .register(
            Namespace::Bank,
            TagRecord::from_template(Namespace::Bank)
                .set("name", "B1")
                .set("mapTag", "T1")
                .set("bankDir", "/banks/{regionName}/")
                .set("formatted", true)
                .set("constants_1st", "const_8L_reg{region}.gcon")
                .set("constants_2nd", "const_13L_reg{region}.gcon")
                .set("sectorBank_1st", "sectors_8L.patt")
                .set("sectorBank_2nd", "sectors_13L.patt")
                .set("sectorSlices", "slices_8L.root")
                .set("patternBank", "patterns.root"),
        )
        .unwrap()
        .register(
            Namespace::Algo,
            TagRecord::inherit("default")
                .set("name", "A-hough")
                .set("threshold", vec![7])
                .set("localMaxWindowSize", 3),
        )
        .unwrap()
        .build()
        .unwrap()
}

fn e2e_overrides() -> OverrideSet {
    OverrideSet::new()
        .set("mapTag", "T1")
        .set("bankTag", "B1")
        .set("algoTag", "A-hough")
        .set("hough", true)
        .set("secondStage", true)
}

fn assemble(overrides: &OverrideSet) -> PipelineResult<(PipelineGraph, ResolvedConfig)> {
    let config = TagResolver::builtin().resolve(Stage::Algo, overrides)?;
    let config = PathTemplateExpander::expand_config(&config)?;
    let graph = PipelineAssembler::new().assemble(&config)?;
    Ok((graph, config))
}

fn monitoring(graph: &PipelineGraph) -> &MonitoringParams {
    match &graph.stage(StageId::Monitoring).unwrap().params {
        StageParams::Monitoring(params) => params,
        other => panic!("unexpected params: {other:?}"),
    }
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn hough_two_stage_pipeline() {
    let registry = test_registry();
    let built = PipelineBuilder::new(&registry).build(&e2e_overrides()).unwrap();

    assert_eq!(
        built.graph.stage_ids(),
        vec![
            StageId::Input,
            StageId::HitProcessing,
            StageId::RoadFinder,
            StageId::TrackFit1st,
            StageId::OverlapRemoval1st,
            StageId::Extrapolation,
            StageId::TrackFit2nd,
            StageId::OverlapRemoval2nd,
            StageId::Monitoring,
        ]
    );
    assert_eq!(built.graph.stage(StageId::RoadFinder).unwrap().component, "hough");
    assert!(!built.graph.contains(StageId::LrtHitFilter));
    assert!(!built.graph.contains(StageId::LrtRoadFinder));
    assert!(built.graph.service(LRT_EVENT_SELECTION_SERVICE).is_none());

    // Expanded paths flow into the services
    let bank = built.graph.service("bank").unwrap();
    assert_eq!(
        bank.property("constants_1st"),
        Some(&TagValue::from("/banks/R0/const_8L_reg0.gcon"))
    );
}

#[test]
fn hough_two_stage_wiring() {
    let registry = test_registry();
    let built = PipelineBuilder::new(&registry).build(&e2e_overrides()).unwrap();
    let graph = &built.graph;

    assert_eq!(graph.dependencies(StageId::RoadFinder), vec![StageId::HitProcessing]);
    assert_eq!(graph.dependencies(StageId::TrackFit2nd), vec![StageId::Extrapolation]);
    assert_eq!(
        graph.dependencies(StageId::Monitoring),
        vec![
            StageId::TrackFit1st,
            StageId::OverlapRemoval1st,
            StageId::TrackFit2nd,
            StageId::OverlapRemoval2nd,
        ]
    );
    assert!(graph.dependents(StageId::Monitoring).is_empty());
    assert!(graph.stage(StageId::Monitoring).unwrap().observer);
}

#[test]
fn hough_geometry_copied_to_overlap_removal() {
    let registry = test_registry();
    let built = PipelineBuilder::new(&registry).build(&e2e_overrides()).unwrap();
    match &built.graph.stage(StageId::OverlapRemoval1st).unwrap().params {
        StageParams::OverlapRemoval(OverlapRemovalParams {
            hough_grouping: Some(grouping),
            min_chi2,
            ..
        }) => {
            assert_eq!(grouping.n_bins_x, 228);
            assert_eq!(grouping.n_bins_y, 220);
            assert_eq!(grouping.local_max_window_size, 3);
            assert_eq!(*min_chi2, Some(40.0));
        }
        other => panic!("unexpected params: {other:?}"),
    }
    match &built.graph.stage(StageId::OverlapRemoval2nd).unwrap().params {
        StageParams::OverlapRemoval(params) => {
            assert!(params.hough_grouping.is_none());
            assert!(params.min_chi2.is_none());
        }
        other => panic!("unexpected params: {other:?}"),
    }
}

#[test]
fn oversized_hough_buffer_is_reported_not_panicked() {
    let err = assemble(
        &OverrideSet::new()
            .set("algoTag", "hough")
            .set("xBufferBins", i64::MAX),
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::Assembly { ref stage, .. } if stage == "overlap_removal_1st"));
}

// ============================================================================
// Exclusivity
// ============================================================================

#[test]
fn conflicting_input_sources_report_one_violation() {
    let (graph, config) = assemble(
        &OverrideSet::new()
            .set("randomRawHits", true)
            .set("realAndRandomHits", true)
            .set("realHitsOverlay", true),
    )
    .unwrap();
    let report = ConsistencyValidator::with_defaults().validate(&graph, &config).unwrap();

    assert_eq!(report.len(), 1);
    assert_eq!(
        report.violations[0],
        Violation::new(
            "input_source",
            "input source",
            vec![
                "randomRawHits".to_string(),
                "realAndRandomHits".to_string(),
                "realHitsOverlay".to_string()
            ]
        )
    );
    // Highest priority member still drives assembly
    assert_eq!(graph.stage(StageId::Input).unwrap().component, "random_hits");
}

#[test]
fn lrt_conflict_fails_resolution() {
    let err = assemble(
        &OverrideSet::new()
            .set("algoTag", "lrt_doublet")
            .set("lrt_use_straightTrackHT", true),
    )
    .unwrap_err();
    match err {
        PipelineError::Config(ConfigError::InconsistentTag { group, values }) => {
            assert_eq!(group, "LRT road finder");
            assert_eq!(values, vec!["lrt_use_doubletHT", "lrt_use_straightTrackHT"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Threshold cardinality
// ============================================================================

#[test]
fn eta_filter_rejects_two_thresholds() {
    let err = assemble(
        &OverrideSet::new()
            .set("EtaPatternRoadFilter", "eta_patterns.root")
            .set("threshold", "5,6"),
    )
    .unwrap_err();
    match err {
        PipelineError::Config(ConfigError::MultiValueThresholdUnsupported { filter, values }) => {
            assert_eq!(filter, "eta_pattern_filter");
            assert_eq!(values, vec![5, 6]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn eta_filter_binds_single_threshold() {
    let (graph, _) = assemble(
        &OverrideSet::new()
            .set("EtaPatternRoadFilter", "eta_patterns.root")
            .set("threshold", "5"),
    )
    .unwrap();
    match &graph.stage(StageId::EtaPatternFilter).unwrap().params {
        StageParams::EtaPatternFilter(EtaPatternFilterParams { threshold, patterns }) => {
            assert_eq!(*threshold, 5);
            assert_eq!(patterns, "eta_patterns.root");
        }
        other => panic!("unexpected params: {other:?}"),
    }
}

// ============================================================================
// Monitoring cuts
// ============================================================================

#[test]
fn monitoring_chi2_cut_selection() {
    let cut = |fit_type: i64, delta: bool| {
        let (graph, _) = assemble(
            &OverrideSet::new()
                .set("IdealCoordFitType", fit_type)
                .set("DoDeltaGPhis", delta),
        )
        .unwrap();
        monitoring(&graph).chi2_ndof_cut
    };

    assert_eq!(cut(2, true), 50.0);
    assert_eq!(cut(2, false), 2.0);
    assert_eq!(cut(0, true), 40.0);
    assert_eq!(cut(0, false), 40.0);
}

// ============================================================================
// LRT
// ============================================================================

#[test]
fn lrt_replaces_filters_and_road_finder() {
    let (graph, config) = assemble(
        &OverrideSet::new()
            .set("algoTag", "lrt_straight")
            .set("EtaPatternRoadFilter", "eta_patterns.root"),
    )
    .unwrap();

    assert_eq!(
        graph.stage_ids(),
        vec![
            StageId::Input,
            StageId::HitProcessing,
            StageId::LrtHitFilter,
            StageId::LrtRoadFinder,
            StageId::TrackFit1st,
            StageId::OverlapRemoval1st,
            StageId::Monitoring,
        ]
    );
    assert_eq!(graph.stage(StageId::LrtHitFilter).unwrap().component, "ml");
    assert_eq!(
        graph.stage(StageId::LrtRoadFinder).unwrap().component,
        "straight_track_hough"
    );
    assert_eq!(graph.dependencies(StageId::TrackFit1st), vec![StageId::LrtRoadFinder]);

    let selection = graph.service(LRT_EVENT_SELECTION_SERVICE).unwrap();
    assert_eq!(selection.property("minLRTpT"), Some(&TagValue::Float(5.0)));
    assert_eq!(selection.property("doLRT"), Some(&TagValue::Bool(true)));

    let lrt = monitoring(&graph).lrt.as_ref().unwrap();
    assert_eq!(lrt.d0_range, vec![-100.0, 100.0]);

    assert!(graph.run_options().llp_hough_monitor);
    assert!(!graph.run_options().hough_monitor);

    let report = ConsistencyValidator::with_defaults().validate(&graph, &config).unwrap();
    assert!(report.is_ok(), "{}", report);
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn graph_exports_json() {
    let (graph, _) = assemble(
        &OverrideSet::new()
            .set("algoTag", "hough")
            .set("hough_rootoutput", true),
    )
    .unwrap();
    let json: serde_json::Value = serde_json::from_str(&graph.to_json().unwrap()).unwrap();

    let names: Vec<&str> = json["stages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|stage| stage["id"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"hough_root_output"));
    assert_eq!(json["stages"][0]["outputs"][0], "raw_hits");
    assert_eq!(json["run_options"]["do_tracking"], true);
    assert_eq!(json["run_options"]["hough_monitor"], true);
    assert_eq!(json["run_options"]["llp_hough_monitor"], false);

    let histograms = graph.service(HISTOGRAM_SERVICE).unwrap();
    assert!(histograms.property(HOUGH_OUTPUT_STREAM).is_some());
}

#[test]
fn resolved_config_round_trips_through_yaml() {
    let (_, config) = assemble(&OverrideSet::new().set("algoTag", "hough_1d")).unwrap();
    let restored = ResolvedConfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
    assert_eq!(restored, config);

    let original = PipelineAssembler::new().assemble(&config).unwrap();
    let rebuilt = PipelineAssembler::new().assemble(&restored).unwrap();
    assert_eq!(original.stages(), rebuilt.stages());
}
