//! Pipeline assembly from a resolved configuration
//!
//! Every stage of the fixed template is checked for enablement before any
//! stage is built, so a stage whose predicate cannot be evaluated fails the
//! whole assembly and no partial graph is returned.

use crate::error::{PipelineError, PipelineResult};
use crate::graph::{PipelineGraph, RunOptions};
use crate::monitoring::{select_chi2_cuts, Chi2Cuts};
use crate::params::{
    DoubletHoughParams, EtaPatternFilterParams, ExtrapolationParams, HitProcessingParams,
    HoughRootOutputParams, InputParams, LrtHitFilterParams, LrtRoadFinderParams,
    MonitoringParams, OverlapRemovalParams, PhiRoadFilterParams, RoadFinderParams, StageParams,
    StraightTrackHoughParams, TrackFitParams,
};
use crate::services::{
    ServiceDescriptor, ServiceKind, BANK_SERVICE, HISTOGRAM_SERVICE, HOUGH_OUTPUT_STREAM,
    LRT_EVENT_SELECTION_SERVICE, MAPPING_SERVICE,
};
use crate::stage::{Binding, PipelineStage, RootInput, StageId, StageInput};
use htt_config::{
    default_histogram_filename, describe, ConfigError, FeatureGroup, InputSource, LrtHitFilter,
    LrtRoadFinder, Namespace, ResolvedConfig, RoadFinderVariant, Tag,
};
use tracing::{debug, info};

/// Builds [`PipelineGraph`]s from resolved configurations
#[derive(Debug, Clone, Default)]
pub struct PipelineAssembler {
    histogram_file: Option<String>,
}

impl PipelineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the monitoring histogram file name
    pub fn with_histogram_file(mut self, file: impl Into<String>) -> Self {
        self.histogram_file = Some(file.into());
        self
    }

    pub fn assemble(&self, config: &ResolvedConfig) -> PipelineResult<PipelineGraph> {
        let algo = config.algo().ok_or_else(|| {
            PipelineError::assembly(
                StageId::Input.name(),
                format!("a {} stage configuration has no algo tag", config.stage()),
            )
        })?;

        let mut enabled = Vec::new();
        for id in StageId::TEMPLATE {
            if id.enablement().evaluate(algo, id)? {
                enabled.push(id);
            }
        }

        let histogram_file = match &self.histogram_file {
            Some(file) => file.clone(),
            None => default_histogram_filename(config)?,
        };
        let context = AssemblyContext::new(config, algo, enabled, histogram_file)?;

        let mut stages = Vec::with_capacity(context.enabled.len());
        for &id in &context.enabled {
            let stage = context.build(id).map_err(within(id))?;
            debug!(stage = %id, component = %stage.component, inputs = stage.inputs.len(), "Emitted stage");
            stages.push(stage);
        }

        let services = context.services()?;
        let run_options = RunOptions::read(algo, describe(config)?)?;
        let graph = PipelineGraph::new(stages, services, run_options)?;
        info!(
            algo = %algo.name(),
            stages = graph.len(),
            services = graph.services().len(),
            "Assembled pipeline"
        );
        Ok(graph)
    }
}

/// Attribute missing or mistyped fields to the stage being built
fn within<E: Into<PipelineError>>(id: StageId) -> impl FnOnce(E) -> PipelineError {
    move |err| match err.into() {
        PipelineError::Config(
            inner @ (ConfigError::MissingField { .. } | ConfigError::TypeMismatch { .. }),
        ) => PipelineError::assembly(id.name(), inner),
        other => other,
    }
}

struct AssemblyContext<'a> {
    config: &'a ResolvedConfig,
    algo: &'a Tag,
    enabled: Vec<StageId>,
    input: InputSource,
    road_finder: RoadFinderVariant,
    lrt: bool,
    second_stage: bool,
    cuts: Chi2Cuts,
    histogram_file: String,
}

impl<'a> AssemblyContext<'a> {
    fn new(
        config: &'a ResolvedConfig,
        algo: &'a Tag,
        enabled: Vec<StageId>,
        histogram_file: String,
    ) -> PipelineResult<Self> {
        let road_finder = RoadFinderVariant::from_algo(algo).map_err(within(StageId::RoadFinder))?;
        let cuts = select_chi2_cuts(
            algo.int("IdealCoordFitType")?,
            algo.bool("DoDeltaGPhis")?,
            road_finder == RoadFinderVariant::Hough,
        );
        debug!(monitor = cuts.monitor, overlap_removal_min = ?cuts.overlap_removal_min, "Selected chi2 cuts");
        Ok(Self {
            config,
            algo,
            input: InputSource::from_algo(algo).map_err(within(StageId::Input))?,
            road_finder,
            lrt: algo.bool("lrt")?,
            second_stage: enabled.contains(&StageId::Extrapolation),
            enabled,
            cuts,
            histogram_file,
        })
    }

    fn map(&self) -> &'a Tag {
        self.config.map()
    }

    fn is_enabled(&self, id: StageId) -> bool {
        self.enabled.contains(&id)
    }

    /// Hits feeding the road finder: the last enabled pre-filter, else logical hits
    fn road_finder_hits(&self) -> Binding {
        if self.is_enabled(StageId::PhiRoadFilter) {
            Binding::stage(StageId::PhiRoadFilter, "filtered_hits")
        } else if self.is_enabled(StageId::EtaPatternFilter) {
            Binding::stage(StageId::EtaPatternFilter, "filtered_hits")
        } else {
            logical_hits()
        }
    }

    /// Roads feeding the first-stage fit
    fn fit_roads(&self) -> Binding {
        if self.lrt {
            Binding::stage(StageId::LrtRoadFinder, "roads")
        } else {
            Binding::stage(StageId::RoadFinder, "roads")
        }
    }

    fn build(&self, id: StageId) -> PipelineResult<PipelineStage> {
        let algo = self.algo;
        let map = self.map();
        let stage = match id {
            StageId::Input => {
                let mut inputs = Vec::new();
                if self.input != InputSource::RandomHits {
                    inputs.push(StageInput::new("events", Binding::root(RootInput::EventFile)));
                }
                match self.input {
                    InputSource::RandomHits | InputSource::FileWithRandomHits => {
                        inputs.push(StageInput::new("bank", Binding::service(BANK_SERVICE)))
                    }
                    InputSource::FileWithOverlay => {
                        inputs.push(StageInput::new("overlay", Binding::root(RootInput::OverlayFile)))
                    }
                    InputSource::FileReplay => {}
                }
                new_stage(id, self.input.name(), inputs, &["raw_hits"])
                    .params(StageParams::Input(InputParams::read(algo, self.input)?))
            }
            StageId::HitProcessing => {
                let params = HitProcessingParams::read(algo, map)?;
                let mut outputs = vec!["logical_hits"];
                if params.space_points {
                    outputs.push("space_points");
                }
                new_stage(
                    id,
                    id.name(),
                    vec![
                        StageInput::new("raw_hits", Binding::stage(StageId::Input, "raw_hits")),
                        map_file("pmap", "pmap_1st"),
                        map_file("rmap", "rmap"),
                        map_file("modulemap", "modulemap"),
                        StageInput::new("mapping", Binding::service(MAPPING_SERVICE)),
                    ],
                    &outputs,
                )
                .params(StageParams::HitProcessing(params))
            }
            StageId::EtaPatternFilter => new_stage(
                id,
                id.name(),
                vec![StageInput::new("hits", logical_hits())],
                &["filtered_hits"],
            )
            .params(StageParams::EtaPatternFilter(EtaPatternFilterParams::read(algo)?)),
            StageId::PhiRoadFilter => {
                let upstream = if self.is_enabled(StageId::EtaPatternFilter) {
                    Binding::stage(StageId::EtaPatternFilter, "filtered_hits")
                } else {
                    logical_hits()
                };
                new_stage(id, id.name(), vec![StageInput::new("hits", upstream)], &["filtered_hits"])
                    .params(StageParams::PhiRoadFilter(PhiRoadFilterParams::read(algo)?))
            }
            StageId::RoadFinder => {
                let mut inputs = vec![StageInput::new("hits", self.road_finder_hits())];
                match self.road_finder {
                    RoadFinderVariant::PatternMatch => {
                        inputs.push(bank_file("patterns", "patternBank"));
                        inputs.push(bank_file("sectors", "sectorBank_1st"));
                        inputs.push(bank_file("sector_slices", "sectorSlices"));
                        inputs.push(StageInput::new("bank", Binding::service(BANK_SERVICE)));
                    }
                    RoadFinderVariant::SectorsAsPatterns => {
                        inputs.push(bank_file("sectors", "sectorBank_1st"));
                        inputs.push(StageInput::new("bank", Binding::service(BANK_SERVICE)));
                    }
                    RoadFinderVariant::Hough => {
                        inputs.push(map_file("subrmap", "subrmap"));
                    }
                    RoadFinderVariant::Hough1D => {
                        inputs.push(map_file("subrmap", "subrmap"));
                        inputs.push(algo_file("bit_shifts", "hough1d_bitShiftPath"));
                        inputs.push(algo_file("radii", "hough1d_radiiFile"));
                    }
                }
                new_stage(id, self.road_finder.name(), inputs, &["roads"]).params(StageParams::RoadFinder(
                    RoadFinderParams::read(self.road_finder, algo, map)?,
                ))
            }
            StageId::NnTrackClassifier => new_stage(
                id,
                id.name(),
                vec![StageInput::new("roads", Binding::stage(StageId::RoadFinder, "roads"))],
                &["road_scores"],
            )
            .params(StageParams::NnTrackClassifier),
            StageId::HoughRootOutput => new_stage(
                id,
                id.name(),
                vec![
                    StageInput::new("roads", Binding::stage(StageId::RoadFinder, "roads")),
                    StageInput::new("histograms", Binding::service(HISTOGRAM_SERVICE)),
                ],
                &[],
            )
            .observer()
            .params(StageParams::HoughRootOutput(HoughRootOutputParams {
                stream: HOUGH_OUTPUT_STREAM.to_string(),
            })),
            StageId::LrtHitFilter => {
                let variant = self.lrt_member(FeatureGroup::LrtHitFilter, id)?;
                let variant = LrtHitFilter::from_member(variant).ok_or_else(|| unknown_member(id, variant))?;
                new_stage(
                    id,
                    variant.name(),
                    vec![
                        StageInput::new("hits", logical_hits()),
                        StageInput::new("event_selection", Binding::service(LRT_EVENT_SELECTION_SERVICE)),
                    ],
                    &["lrt_hits"],
                )
                .params(StageParams::LrtHitFilter(LrtHitFilterParams { variant }))
            }
            StageId::LrtRoadFinder => {
                let member = self.lrt_member(FeatureGroup::LrtRoadFinder, id)?;
                let variant = LrtRoadFinder::from_member(member).ok_or_else(|| unknown_member(id, member))?;
                let params = match variant {
                    LrtRoadFinder::DoubletHough => LrtRoadFinderParams::DoubletHough(DoubletHoughParams::read(algo)?),
                    LrtRoadFinder::StraightTrackHough => {
                        LrtRoadFinderParams::StraightTrackHough(StraightTrackHoughParams::read(algo, map)?)
                    }
                };
                let hits = if self.is_enabled(StageId::LrtHitFilter) {
                    Binding::stage(StageId::LrtHitFilter, "lrt_hits")
                } else {
                    logical_hits()
                };
                new_stage(
                    id,
                    variant.name(),
                    vec![
                        StageInput::new("hits", hits),
                        StageInput::new("event_selection", Binding::service(LRT_EVENT_SELECTION_SERVICE)),
                    ],
                    &["roads"],
                )
                .params(StageParams::LrtRoadFinder(params))
            }
            StageId::TrackFit1st => {
                let params = TrackFitParams::read(algo, false)?;
                let mut inputs = vec![
                    StageInput::new("roads", self.fit_roads()),
                    bank_file("constants", "constants_1st"),
                    bank_file("sectors", "sectorBank_1st"),
                ];
                if !params.guess_hits {
                    inputs.push(bank_file("no_guess_constants", "constantsNoGuess_1st"));
                }
                inputs.push(StageInput::new("bank", Binding::service(BANK_SERVICE)));
                new_stage(id, "track_fitter", inputs, &["tracks_1st"]).params(StageParams::TrackFit(params))
            }
            StageId::OverlapRemoval1st => new_stage(
                id,
                "overlap_removal",
                vec![StageInput::new("tracks", Binding::stage(StageId::TrackFit1st, "tracks_1st"))],
                &["tracks_1st_or"],
            )
            .params(StageParams::OverlapRemoval(OverlapRemovalParams::read(
                algo,
                false,
                self.road_finder == RoadFinderVariant::Hough,
                &self.cuts,
            )?)),
            StageId::Extrapolation => new_stage(
                id,
                "extrapolator",
                vec![
                    StageInput::new("tracks", Binding::stage(StageId::OverlapRemoval1st, "tracks_1st_or")),
                    StageInput::new("hits", logical_hits()),
                    StageInput::new("bank", Binding::service(BANK_SERVICE)),
                ],
                &["roads_2nd"],
            )
            .params(StageParams::Extrapolation(ExtrapolationParams::read(algo)?)),
            StageId::TrackFit2nd => {
                let params = TrackFitParams::read(algo, true)?;
                let mut inputs = vec![
                    StageInput::new("roads", Binding::stage(StageId::Extrapolation, "roads_2nd")),
                    bank_file("constants", "constants_2nd"),
                    bank_file("sectors", "sectorBank_2nd"),
                    map_file("pmap", "pmap_2nd"),
                ];
                if !params.guess_hits {
                    inputs.push(bank_file("no_guess_constants", "constantsNoGuess_2nd"));
                }
                inputs.push(StageInput::new("bank", Binding::service(BANK_SERVICE)));
                new_stage(id, "track_fitter", inputs, &["tracks_2nd"]).params(StageParams::TrackFit(params))
            }
            StageId::OverlapRemoval2nd => new_stage(
                id,
                "overlap_removal",
                vec![StageInput::new("tracks", Binding::stage(StageId::TrackFit2nd, "tracks_2nd"))],
                &["tracks_2nd_or"],
            )
            .params(StageParams::OverlapRemoval(OverlapRemovalParams::read(
                algo, true, false, &self.cuts,
            )?)),
            StageId::Monitoring => {
                let mut inputs = vec![
                    StageInput::new("tracks_1st", Binding::stage(StageId::TrackFit1st, "tracks_1st")),
                    StageInput::new("tracks_1st_or", Binding::stage(StageId::OverlapRemoval1st, "tracks_1st_or")),
                ];
                if self.second_stage {
                    inputs.push(StageInput::new("tracks_2nd", Binding::stage(StageId::TrackFit2nd, "tracks_2nd")));
                    inputs.push(StageInput::new(
                        "tracks_2nd_or",
                        Binding::stage(StageId::OverlapRemoval2nd, "tracks_2nd_or"),
                    ));
                }
                inputs.push(StageInput::new("histograms", Binding::service(HISTOGRAM_SERVICE)));
                if self.lrt {
                    inputs.push(StageInput::new(
                        "event_selection",
                        Binding::service(LRT_EVENT_SELECTION_SERVICE),
                    ));
                }
                new_stage(id, id.name(), inputs, &[])
                    .observer()
                    .params(StageParams::Monitoring(MonitoringParams::read(
                        algo,
                        &self.cuts,
                        self.histogram_file.clone(),
                    )?))
            }
        };
        Ok(stage)
    }

    /// Priority pick of an LRT group; enablement guarantees one is active
    fn lrt_member(&self, group: FeatureGroup, id: StageId) -> PipelineResult<&'static str> {
        group
            .priority_member(self.algo)?
            .ok_or_else(|| PipelineError::assembly(id.name(), format!("no {} selected", group)))
    }

    fn services(&self) -> PipelineResult<Vec<ServiceDescriptor>> {
        let region = self.config.region();
        let mut services = vec![ServiceDescriptor::mapping(self.map(), region.index, &region.name)];
        if let Some(bank) = self.config.bank() {
            services.push(ServiceDescriptor::bank(bank));
        }
        services.push(ServiceDescriptor::histograms(
            &self.histogram_file,
            self.is_enabled(StageId::HoughRootOutput),
        ));
        if self.lrt {
            let map = self.map();
            let mut selection = ServiceDescriptor::new(LRT_EVENT_SELECTION_SERVICE, ServiceKind::EventSelection)
                .with("regionID", region.index as i64)
                .with("sampleType", map.str("sampleType")?)
                .with("withPU", map.bool("withPU")?)
                .with("doLRT", true)
                .with("minLRTpT", self.algo.float("lrt_ptmin")?)
                .reads_path(Namespace::Map, "slices");
            if let Some(slices) = map.get("slices") {
                selection.properties.insert("regions".to_string(), slices.clone());
            }
            services.push(selection);
        }
        Ok(services)
    }
}

fn logical_hits() -> Binding {
    Binding::stage(StageId::HitProcessing, "logical_hits")
}

fn map_file(name: &str, key: &str) -> StageInput {
    StageInput::new(name, Binding::config(Namespace::Map, key))
}

fn algo_file(name: &str, key: &str) -> StageInput {
    StageInput::new(name, Binding::config(Namespace::Algo, key))
}

fn bank_file(name: &str, key: &str) -> StageInput {
    StageInput::new(name, Binding::config(Namespace::Bank, key))
}

fn unknown_member(id: StageId, member: &str) -> PipelineError {
    PipelineError::assembly(id.name(), format!("unknown selector '{}'", member))
}

/// Stage under construction; params are always set before it is returned
struct StageDraft {
    id: StageId,
    component: String,
    inputs: Vec<StageInput>,
    outputs: Vec<String>,
    observer: bool,
}

fn new_stage(id: StageId, component: &str, inputs: Vec<StageInput>, outputs: &[&str]) -> StageDraft {
    StageDraft {
        id,
        component: component.to_string(),
        inputs,
        outputs: outputs.iter().map(|s| s.to_string()).collect(),
        observer: false,
    }
}

impl StageDraft {
    fn observer(mut self) -> Self {
        self.observer = true;
        self
    }

    fn params(self, params: StageParams) -> PipelineStage {
        PipelineStage {
            id: self.id,
            component: self.component,
            inputs: self.inputs,
            outputs: self.outputs,
            params,
            observer: self.observer,
        }
    }
}
