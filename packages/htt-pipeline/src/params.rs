//! Typed per-stage parameters
//!
//! Every component reads its parameters through a [`FieldReader`] bound to
//! the component's recognized-field table, so a component can only see the
//! tag fields it declares. The tables are checked against the namespace
//! templates in the tests below.

use crate::error::{PipelineError, PipelineResult};
use crate::monitoring::Chi2Cuts;
use crate::stage::StageId;
use htt_config::{
    ConfigError, InputSource, LrtHitFilter, RoadFinderVariant, Tag,
};
use serde::Serialize;

/// Concrete component variants a stage can instantiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Input,
    HitProcessing,
    EtaPatternFilter,
    PhiRoadFilter,
    PatternMatch,
    SectorMatch,
    Hough,
    #[serde(rename = "hough_1d")]
    Hough1D,
    NnTrackClassifier,
    HoughRootOutput,
    LrtHitFilter,
    LrtDoubletHough,
    LrtStraightTrackHough,
    TrackFitter,
    OverlapRemoval,
    Extrapolator,
    Monitoring,
    RunOptions,
}

/// Fields a component may read, per namespace
#[derive(Debug, Clone, Copy)]
pub struct RecognizedFields {
    pub algo: &'static [&'static str],
    pub map: &'static [&'static str],
}

const TRACE_HITS: &[&str] = &["withPU", "sampleType"];

impl Component {
    pub const ALL: [Component; 18] = [
        Component::Input,
        Component::HitProcessing,
        Component::EtaPatternFilter,
        Component::PhiRoadFilter,
        Component::PatternMatch,
        Component::SectorMatch,
        Component::Hough,
        Component::Hough1D,
        Component::NnTrackClassifier,
        Component::HoughRootOutput,
        Component::LrtHitFilter,
        Component::LrtDoubletHough,
        Component::LrtStraightTrackHough,
        Component::TrackFitter,
        Component::OverlapRemoval,
        Component::Extrapolator,
        Component::Monitoring,
        Component::RunOptions,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::HitProcessing => "hit_processing",
            Self::EtaPatternFilter => "eta_pattern_filter",
            Self::PhiRoadFilter => "phi_road_filter",
            Self::PatternMatch => RoadFinderVariant::PatternMatch.name(),
            Self::SectorMatch => RoadFinderVariant::SectorsAsPatterns.name(),
            Self::Hough => RoadFinderVariant::Hough.name(),
            Self::Hough1D => RoadFinderVariant::Hough1D.name(),
            Self::NnTrackClassifier => "nn_track_classifier",
            Self::HoughRootOutput => "hough_root_output",
            Self::LrtHitFilter => "lrt_hit_filter",
            Self::LrtDoubletHough => "lrt_doublet_hough",
            Self::LrtStraightTrackHough => "lrt_straight_track_hough",
            Self::TrackFitter => "track_fitter",
            Self::OverlapRemoval => "overlap_removal",
            Self::Extrapolator => "extrapolator",
            Self::Monitoring => "monitoring",
            Self::RunOptions => "run_options",
        }
    }

    pub fn road_finder(variant: RoadFinderVariant) -> Self {
        match variant {
            RoadFinderVariant::PatternMatch => Self::PatternMatch,
            RoadFinderVariant::SectorsAsPatterns => Self::SectorMatch,
            RoadFinderVariant::Hough => Self::Hough,
            RoadFinderVariant::Hough1D => Self::Hough1D,
        }
    }

    pub fn recognized_fields(&self) -> RecognizedFields {
        let (algo, map): (&'static [&'static str], &'static [&'static str]) = match self {
            Self::Input => (
                &[
                    "randomRawHits",
                    "realAndRandomHits",
                    "realHitsOverlay",
                    "FirstInputToolN",
                    "randomHitsNTracks",
                ],
                &[],
            ),
            Self::HitProcessing => (
                &["Clustering", "SpacePoints", "SpacePointFiltering", "HitFiltering"],
                &["sampleType"],
            ),
            Self::EtaPatternFilter => (&["EtaPatternRoadFilter", "threshold"], &[]),
            Self::PhiRoadFilter => (&["PhiRoadFilter", "threshold"], &[]),
            Self::PatternMatch | Self::SectorMatch => (&["max_misses"], &[]),
            Self::Hough => (
                &[
                    "xVar",
                    "yVar",
                    "phi_min",
                    "phi_max",
                    "qpt_min",
                    "qpt_max",
                    "d0_min",
                    "d0_max",
                    "xBins",
                    "yBins",
                    "xBufferBins",
                    "yBufferBins",
                    "threshold",
                    "slicing",
                    "localMaxWindowSize",
                    "fieldCorrection",
                    "IdealGeoRoads",
                    "combine_layers",
                    "scale",
                    "convolution",
                    "convSize_x",
                    "convSize_y",
                    "hitExtend_x",
                ],
                TRACE_HITS,
            ),
            Self::Hough1D => (
                &[
                    "hough1d_phiMin",
                    "hough1d_phiMax",
                    "hough1d_qptMin",
                    "hough1d_qptMax",
                    "hough1d_phiBins",
                    "threshold",
                    "hough1d_iterStep",
                    "hough1d_iterLayer",
                    "hough1d_useDiff",
                    "hough1d_variableExtend",
                    "hough1d_phiRangeCut",
                    "hough1d_d0spread",
                    "hough1d_hitExtend",
                    "hough1d_bitShiftPath",
                    "hough1d_radiiFile",
                    "IdealGeoRoads",
                    "fieldCorrection",
                ],
                TRACE_HITS,
            ),
            Self::NnTrackClassifier => (&["TrackNNAnalysis"], &[]),
            Self::HoughRootOutput => (&["hough_rootoutput"], &[]),
            Self::LrtHitFilter => (&["lrt_use_basicHitFilter", "lrt_use_mlHitFilter"], &[]),
            Self::LrtDoubletHough => (
                &[
                    "lrt_doublet_d0_range",
                    "lrt_doublet_qpt_range",
                    "lrt_doublet_d0_bins",
                    "lrt_doublet_qpt_bins",
                    "lrt_doublet_threshold50",
                    "lrt_doublet_threshold",
                    "lrt_doublet_triplet",
                ],
                &[],
            ),
            Self::LrtStraightTrackHough => (
                &[
                    "lrt_straighttrack_xVar",
                    "lrt_straighttrack_yVar",
                    "lrt_straighttrack_phi_min",
                    "lrt_straighttrack_phi_max",
                    "lrt_straighttrack_d0_min",
                    "lrt_straighttrack_d0_max",
                    "lrt_straighttrack_xBins",
                    "lrt_straighttrack_yBins",
                    "lrt_straighttrack_threshold",
                ],
                TRACE_HITS,
            ),
            Self::TrackFitter => (
                &[
                    "IdealCoordFitType",
                    "DoDeltaGPhis",
                    "GuessHits",
                    "chi2DofRecoveryMin",
                    "chi2DofRecoveryMax",
                    "doMajority",
                    "maxHitsPerPlane",
                    "nHits_noRecovery",
                    "DoMissingHitsChecks",
                ],
                &[],
            ),
            Self::OverlapRemoval => (
                &[
                    "doFastOR",
                    "roadSliceOR",
                    "xBins",
                    "yBins",
                    "xBufferBins",
                    "yBufferBins",
                    "localMaxWindowSize",
                ],
                &[],
            ),
            Self::Extrapolator => (&["extrapolatorNCombinations"], &[]),
            Self::Monitoring => (
                &[
                    "fastMon",
                    "secondStage",
                    "barcodeFracMatch",
                    "canExtendHistRanges",
                    "lrt",
                    "lrt_ptmin",
                    "lrt_mon_d0Range",
                    "lrt_mon_z0Range",
                ],
                &[],
            ),
            Self::RunOptions => (
                &[
                    "doTracking",
                    "writeOutputData",
                    "outputHitTxt",
                    "DoMissingHitsChecks",
                    "HitFiltering",
                    "hough",
                    "houghplotJMS",
                    "lrt",
                ],
                &[],
            ),
        };
        RecognizedFields { algo, map }
    }
}

/// Reads tag fields on behalf of one component, refusing undeclared keys
pub struct FieldReader<'a> {
    component: Component,
    tag: &'a Tag,
    allowed: &'static [&'static str],
}

impl<'a> FieldReader<'a> {
    pub fn algo(component: Component, tag: &'a Tag) -> Self {
        Self {
            component,
            tag,
            allowed: component.recognized_fields().algo,
        }
    }

    pub fn map(component: Component, tag: &'a Tag) -> Self {
        Self {
            component,
            tag,
            allowed: component.recognized_fields().map,
        }
    }

    fn check(&self, key: &str) -> PipelineResult<()> {
        if self.allowed.contains(&key) {
            Ok(())
        } else {
            Err(PipelineError::unrecognized(self.component.name(), key))
        }
    }

    pub fn bool(&self, key: &str) -> PipelineResult<bool> {
        self.check(key)?;
        Ok(self.tag.bool(key)?)
    }

    pub fn int(&self, key: &str) -> PipelineResult<i64> {
        self.check(key)?;
        Ok(self.tag.int(key)?)
    }

    pub fn float(&self, key: &str) -> PipelineResult<f64> {
        self.check(key)?;
        Ok(self.tag.float(key)?)
    }

    pub fn string(&self, key: &str) -> PipelineResult<String> {
        self.check(key)?;
        Ok(self.tag.str(key)?.to_string())
    }

    pub fn int_list(&self, key: &str) -> PipelineResult<Vec<i64>> {
        self.check(key)?;
        Ok(self.tag.int_list(key)?)
    }

    pub fn float_list(&self, key: &str) -> PipelineResult<Vec<f64>> {
        self.check(key)?;
        Ok(self.tag.float_list(key)?)
    }

    pub fn nested_int_list(&self, key: &str) -> PipelineResult<Vec<Vec<i64>>> {
        self.check(key)?;
        Ok(self.tag.nested_int_list(key)?)
    }

    /// The one threshold of a single-value filter
    pub fn single_threshold(&self) -> PipelineResult<i64> {
        let values = self.int_list("threshold")?;
        match values.as_slice() {
            [value] => Ok(*value),
            _ => Err(ConfigError::MultiValueThresholdUnsupported {
                filter: self.component.name().to_string(),
                values,
            }
            .into()),
        }
    }
}

/// Hit tracing follows pile-up and long-lived-particle samples
pub fn trace_hits(component: Component, map: &Tag) -> PipelineResult<bool> {
    let reader = FieldReader::map(component, map);
    Ok(reader.bool("withPU")? || reader.string("sampleType")? == "LLPs")
}

// ═══════════════════════════════════════════════════════════════
// Front end
// ═══════════════════════════════════════════════════════════════

/// Generator settings when random hits are part of the input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RandomHitsParams {
    pub n_tracks: i64,
    pub n_max_wildcards: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputParams {
    pub source: InputSource,
    pub first_input_tool_n: i64,
    pub random_hits: Option<RandomHitsParams>,
}

impl InputParams {
    pub fn read(algo: &Tag, source: InputSource) -> PipelineResult<Self> {
        let reader = FieldReader::algo(Component::Input, algo);
        let random_hits = match source {
            InputSource::RandomHits | InputSource::FileWithRandomHits => Some(RandomHitsParams {
                n_tracks: reader.int("randomHitsNTracks")?,
                n_max_wildcards: 2,
            }),
            InputSource::FileReplay | InputSource::FileWithOverlay => None,
        };
        Ok(Self {
            source,
            first_input_tool_n: reader.int("FirstInputToolN")?,
            random_hits,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitProcessingParams {
    pub clustering: bool,
    pub space_points: bool,
    pub space_point_filtering: bool,
    pub hit_filtering: bool,
    /// Truth payload kept on output: 1 drops truth, 2 keeps it
    pub save_optional: i64,
}

impl HitProcessingParams {
    pub fn read(algo: &Tag, map: &Tag) -> PipelineResult<Self> {
        let reader = FieldReader::algo(Component::HitProcessing, algo);
        let map_reader = FieldReader::map(Component::HitProcessing, map);
        let space_points = reader.bool("SpacePoints")?;
        Ok(Self {
            clustering: reader.bool("Clustering")?,
            space_points,
            space_point_filtering: space_points && reader.bool("SpacePointFiltering")?,
            hit_filtering: reader.bool("HitFiltering")?,
            save_optional: if map_reader.string("sampleType")? == "skipTruth" { 1 } else { 2 },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EtaPatternFilterParams {
    pub patterns: String,
    pub threshold: i64,
}

impl EtaPatternFilterParams {
    pub fn read(algo: &Tag) -> PipelineResult<Self> {
        let reader = FieldReader::algo(Component::EtaPatternFilter, algo);
        Ok(Self {
            patterns: reader.string("EtaPatternRoadFilter")?,
            threshold: reader.single_threshold()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhiRoadFilterParams {
    pub window: Vec<f64>,
    pub threshold: i64,
}

impl PhiRoadFilterParams {
    pub fn read(algo: &Tag) -> PipelineResult<Self> {
        let reader = FieldReader::algo(Component::PhiRoadFilter, algo);
        Ok(Self {
            window: reader.float_list("PhiRoadFilter")?,
            threshold: reader.single_threshold()?,
        })
    }
}

// ═══════════════════════════════════════════════════════════════
// Road finding
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoughParams {
    pub x_var: String,
    pub y_var: String,
    pub phi_min: f64,
    pub phi_max: f64,
    pub qpt_min: f64,
    pub qpt_max: f64,
    pub d0_min: f64,
    pub d0_max: f64,
    pub x_bins: i64,
    pub y_bins: i64,
    pub x_buffer_bins: i64,
    pub y_buffer_bins: i64,
    pub threshold: Vec<i64>,
    pub slicing: bool,
    pub local_max_window_size: i64,
    pub field_correction: bool,
    pub ideal_geo_roads: bool,
    pub combine_layers: Vec<Vec<i64>>,
    pub scale: Vec<i64>,
    pub convolution: Vec<i64>,
    pub conv_size_x: i64,
    pub conv_size_y: i64,
    pub hit_extend_x: Vec<i64>,
    pub trace_hits: bool,
}

impl HoughParams {
    pub fn read(algo: &Tag, map: &Tag) -> PipelineResult<Self> {
        let r = FieldReader::algo(Component::Hough, algo);
        Ok(Self {
            x_var: r.string("xVar")?,
            y_var: r.string("yVar")?,
            phi_min: r.float("phi_min")?,
            phi_max: r.float("phi_max")?,
            qpt_min: r.float("qpt_min")?,
            qpt_max: r.float("qpt_max")?,
            d0_min: r.float("d0_min")?,
            d0_max: r.float("d0_max")?,
            x_bins: r.int("xBins")?,
            y_bins: r.int("yBins")?,
            x_buffer_bins: r.int("xBufferBins")?,
            y_buffer_bins: r.int("yBufferBins")?,
            threshold: r.int_list("threshold")?,
            slicing: r.bool("slicing")?,
            local_max_window_size: r.int("localMaxWindowSize")?,
            field_correction: r.bool("fieldCorrection")?,
            ideal_geo_roads: r.bool("IdealGeoRoads")?,
            combine_layers: r.nested_int_list("combine_layers")?,
            scale: r.int_list("scale")?,
            convolution: r.int_list("convolution")?,
            conv_size_x: r.int("convSize_x")?,
            conv_size_y: r.int("convSize_y")?,
            hit_extend_x: r.int_list("hitExtend_x")?,
            trace_hits: trace_hits(Component::Hough, map)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hough1DParams {
    pub phi_min: f64,
    pub phi_max: f64,
    pub qpt_min: f64,
    pub qpt_max: f64,
    pub phi_bins: i64,
    pub threshold: Vec<i64>,
    pub iter_step: i64,
    pub iter_layer: i64,
    pub use_diff: bool,
    pub variable_extend: bool,
    pub phi_range_cut: bool,
    pub d0_spread: f64,
    pub hit_extend: Vec<i64>,
    pub bit_shift_path: String,
    pub radii_file: String,
    pub ideal_geo_roads: bool,
    pub field_correction: bool,
    pub trace_hits: bool,
}

impl Hough1DParams {
    pub fn read(algo: &Tag, map: &Tag) -> PipelineResult<Self> {
        let r = FieldReader::algo(Component::Hough1D, algo);
        Ok(Self {
            phi_min: r.float("hough1d_phiMin")?,
            phi_max: r.float("hough1d_phiMax")?,
            qpt_min: r.float("hough1d_qptMin")?,
            qpt_max: r.float("hough1d_qptMax")?,
            phi_bins: r.int("hough1d_phiBins")?,
            threshold: r.int_list("threshold")?,
            iter_step: r.int("hough1d_iterStep")?,
            iter_layer: r.int("hough1d_iterLayer")?,
            use_diff: r.bool("hough1d_useDiff")?,
            variable_extend: r.bool("hough1d_variableExtend")?,
            phi_range_cut: r.bool("hough1d_phiRangeCut")?,
            d0_spread: r.float("hough1d_d0spread")?,
            hit_extend: r.int_list("hough1d_hitExtend")?,
            bit_shift_path: r.string("hough1d_bitShiftPath")?,
            radii_file: r.string("hough1d_radiiFile")?,
            ideal_geo_roads: r.bool("IdealGeoRoads")?,
            field_correction: r.bool("fieldCorrection")?,
            trace_hits: trace_hits(Component::Hough1D, map)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum RoadFinderParams {
    PatternMatch { max_misses: i64 },
    SectorMatch { max_misses: i64 },
    Hough(HoughParams),
    #[serde(rename = "hough_1d")]
    Hough1D(Hough1DParams),
}

impl RoadFinderParams {
    pub fn read(variant: RoadFinderVariant, algo: &Tag, map: &Tag) -> PipelineResult<Self> {
        Ok(match variant {
            RoadFinderVariant::PatternMatch => Self::PatternMatch {
                max_misses: FieldReader::algo(Component::PatternMatch, algo).int("max_misses")?,
            },
            RoadFinderVariant::SectorsAsPatterns => Self::SectorMatch {
                max_misses: FieldReader::algo(Component::SectorMatch, algo).int("max_misses")?,
            },
            RoadFinderVariant::Hough => Self::Hough(HoughParams::read(algo, map)?),
            RoadFinderVariant::Hough1D => Self::Hough1D(Hough1DParams::read(algo, map)?),
        })
    }
}

/// Hough side-channel tree output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoughRootOutputParams {
    pub stream: String,
}

// ═══════════════════════════════════════════════════════════════
// LRT
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LrtHitFilterParams {
    pub variant: LrtHitFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoubletHoughParams {
    pub d0_range: f64,
    pub qpt_range: f64,
    pub d0_bins: i64,
    pub qpt_bins: i64,
    pub threshold50: i64,
    pub threshold: i64,
    pub triplet: bool,
}

impl DoubletHoughParams {
    pub fn read(algo: &Tag) -> PipelineResult<Self> {
        let r = FieldReader::algo(Component::LrtDoubletHough, algo);
        Ok(Self {
            d0_range: r.float("lrt_doublet_d0_range")?,
            qpt_range: r.float("lrt_doublet_qpt_range")?,
            d0_bins: r.int("lrt_doublet_d0_bins")?,
            qpt_bins: r.int("lrt_doublet_qpt_bins")?,
            threshold50: r.int("lrt_doublet_threshold50")?,
            threshold: r.int("lrt_doublet_threshold")?,
            triplet: r.bool("lrt_doublet_triplet")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StraightTrackHoughParams {
    pub x_var: String,
    pub y_var: String,
    pub phi_min: f64,
    pub phi_max: f64,
    pub d0_min: f64,
    pub d0_max: f64,
    pub x_bins: i64,
    pub y_bins: i64,
    pub threshold: Vec<i64>,
    pub trace_hits: bool,
}

impl StraightTrackHoughParams {
    pub fn read(algo: &Tag, map: &Tag) -> PipelineResult<Self> {
        let r = FieldReader::algo(Component::LrtStraightTrackHough, algo);
        Ok(Self {
            x_var: r.string("lrt_straighttrack_xVar")?,
            y_var: r.string("lrt_straighttrack_yVar")?,
            phi_min: r.float("lrt_straighttrack_phi_min")?,
            phi_max: r.float("lrt_straighttrack_phi_max")?,
            d0_min: r.float("lrt_straighttrack_d0_min")?,
            d0_max: r.float("lrt_straighttrack_d0_max")?,
            x_bins: r.int("lrt_straighttrack_xBins")?,
            y_bins: r.int("lrt_straighttrack_yBins")?,
            threshold: r.int_list("lrt_straighttrack_threshold")?,
            trace_hits: trace_hits(Component::LrtStraightTrackHough, map)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum LrtRoadFinderParams {
    DoubletHough(DoubletHoughParams),
    StraightTrackHough(StraightTrackHoughParams),
}

// ═══════════════════════════════════════════════════════════════
// Fitting
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackFitParams {
    pub second_stage: bool,
    pub ideal_coord_fit_type: i64,
    pub do_delta_gphis: bool,
    pub guess_hits: bool,
    pub chi2_dof_recovery_min: f64,
    pub chi2_dof_recovery_max: f64,
    pub do_majority: i64,
    pub max_hits_per_plane: i64,
    pub n_hits_no_recovery: i64,
    pub do_missing_hits_checks: bool,
}

impl TrackFitParams {
    pub fn read(algo: &Tag, second_stage: bool) -> PipelineResult<Self> {
        let r = FieldReader::algo(Component::TrackFitter, algo);
        Ok(Self {
            second_stage,
            ideal_coord_fit_type: r.int("IdealCoordFitType")?,
            do_delta_gphis: r.bool("DoDeltaGPhis")?,
            guess_hits: r.bool("GuessHits")?,
            chi2_dof_recovery_min: r.float("chi2DofRecoveryMin")?,
            chi2_dof_recovery_max: r.float("chi2DofRecoveryMax")?,
            do_majority: r.int("doMajority")?,
            max_hits_per_plane: r.int("maxHitsPerPlane")?,
            n_hits_no_recovery: r.int("nHits_noRecovery")?,
            do_missing_hits_checks: r.bool("DoMissingHitsChecks")?,
        })
    }
}

/// Hough accumulator geometry copied onto first-stage overlap removal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoughGrouping {
    pub n_bins_x: i64,
    pub n_bins_y: i64,
    pub local_max_window_size: i64,
    pub road_slice_or: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlapRemovalParams {
    pub second_stage: bool,
    pub algorithm: String,
    pub hits_per_grouping: i64,
    pub do_fast_or: bool,
    pub hough_grouping: Option<HoughGrouping>,
    pub min_chi2: Option<f64>,
}

impl OverlapRemovalParams {
    pub fn read(
        algo: &Tag,
        second_stage: bool,
        hough_active: bool,
        cuts: &Chi2Cuts,
    ) -> PipelineResult<Self> {
        let r = FieldReader::algo(Component::OverlapRemoval, algo);
        let hough_grouping = if hough_active && !second_stage {
            Some(HoughGrouping {
                n_bins_x: padded_bins(&r, "xBins", "xBufferBins")?,
                n_bins_y: padded_bins(&r, "yBins", "yBufferBins")?,
                local_max_window_size: r.int("localMaxWindowSize")?,
                road_slice_or: r.bool("roadSliceOR")?,
            })
        } else {
            None
        };
        Ok(Self {
            second_stage,
            algorithm: "Normal".to_string(),
            hits_per_grouping: 5,
            do_fast_or: r.bool("doFastOR")?,
            hough_grouping,
            min_chi2: if second_stage { None } else { cuts.overlap_removal_min },
        })
    }
}

/// Accumulator bins plus the buffer on both sides
fn padded_bins(r: &FieldReader<'_>, bins: &str, buffer: &str) -> PipelineResult<i64> {
    let (n, pad) = (r.int(bins)?, r.int(buffer)?);
    pad.checked_mul(2)
        .and_then(|both| n.checked_add(both))
        .ok_or_else(|| {
            PipelineError::assembly(
                StageId::OverlapRemoval1st.name(),
                format!("{} = {} with {} = {} overflows the accumulator size", bins, n, buffer, pad),
            )
        })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtrapolationParams {
    pub n_combinations: i64,
}

impl ExtrapolationParams {
    pub fn read(algo: &Tag) -> PipelineResult<Self> {
        let r = FieldReader::algo(Component::Extrapolator, algo);
        Ok(Self {
            n_combinations: r.int("extrapolatorNCombinations")?,
        })
    }
}

// ═══════════════════════════════════════════════════════════════
// Monitoring
// ═══════════════════════════════════════════════════════════════

/// Event selection shared by LRT monitoring
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LrtMonitoringParams {
    pub min_pt: f64,
    pub d0_range: Vec<f64>,
    pub z0_range: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringParams {
    pub fast_mon: bool,
    pub run_second_stage: bool,
    pub barcode_frac_cut: f64,
    pub can_extend_hist_ranges: bool,
    pub chi2_ndof_cut: f64,
    pub histogram_file: String,
    pub lrt: Option<LrtMonitoringParams>,
}

impl MonitoringParams {
    pub fn read(algo: &Tag, cuts: &Chi2Cuts, histogram_file: String) -> PipelineResult<Self> {
        let r = FieldReader::algo(Component::Monitoring, algo);
        let lrt = if r.bool("lrt")? {
            Some(LrtMonitoringParams {
                min_pt: r.float("lrt_ptmin")?,
                d0_range: r.float_list("lrt_mon_d0Range")?,
                z0_range: r.float_list("lrt_mon_z0Range")?,
            })
        } else {
            None
        };
        Ok(Self {
            fast_mon: r.bool("fastMon")?,
            run_second_stage: r.bool("secondStage")?,
            barcode_frac_cut: r.float("barcodeFracMatch")?,
            can_extend_hist_ranges: r.bool("canExtendHistRanges")?,
            chi2_ndof_cut: cuts.monitor,
            histogram_file,
            lrt,
        })
    }
}

/// Parameters of one stage, by component family
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageParams {
    Input(InputParams),
    HitProcessing(HitProcessingParams),
    EtaPatternFilter(EtaPatternFilterParams),
    PhiRoadFilter(PhiRoadFilterParams),
    RoadFinder(RoadFinderParams),
    NnTrackClassifier,
    HoughRootOutput(HoughRootOutputParams),
    LrtHitFilter(LrtHitFilterParams),
    LrtRoadFinder(LrtRoadFinderParams),
    TrackFit(TrackFitParams),
    OverlapRemoval(OverlapRemovalParams),
    Extrapolation(ExtrapolationParams),
    Monitoring(MonitoringParams),
}
