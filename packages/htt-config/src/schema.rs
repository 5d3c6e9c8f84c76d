//! Namespace templates
//!
//! Every namespace has one template: the full key set with a declared kind
//! and default for each key. Registered tags must cover their template
//! exactly, and overrides are coerced to the template kind.

use crate::namespace::Namespace;
use crate::tag::Tag;
use crate::value::{TagValue, ValueKind};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// One template field
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: ValueKind,
    pub default: TagValue,
    /// Filename (or list of filenames) relative to the namespace directory field
    pub path: bool,
}

/// The "empty tag" of a namespace
#[derive(Debug)]
pub struct Template {
    namespace: Namespace,
    dir_field: Option<&'static str>,
    fields: Vec<FieldSpec>,
}

impl Template {
    fn new(namespace: Namespace, dir_field: Option<&'static str>, fields: Vec<FieldSpec>) -> Self {
        Self {
            namespace,
            dir_field,
            fields,
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Directory prefixed onto every path field
    pub fn dir_field(&self) -> Option<&'static str> {
        self.dir_field
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.key)
    }

    pub fn path_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.path)
    }

    /// All-defaults record
    pub fn defaults(&self) -> Tag {
        let fields: BTreeMap<String, TagValue> = self
            .fields
            .iter()
            .map(|f| (f.key.to_string(), f.default.clone()))
            .collect();
        Tag::from_fields(self.namespace, fields)
    }
}

/// Template for a namespace
pub fn template(namespace: Namespace) -> &'static Template {
    match namespace {
        Namespace::Map => &MAP_TEMPLATE,
        Namespace::Bank => &BANK_TEMPLATE,
        Namespace::Algo => &ALGO_TEMPLATE,
    }
}

/// Every key known to any template, used for suggestions
pub fn all_keys() -> Vec<String> {
    let mut keys: Vec<String> = Namespace::ALL
        .iter()
        .flat_map(|ns| template(*ns).keys())
        .map(str::to_string)
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

fn field(key: &'static str, kind: ValueKind, default: impl Into<TagValue>) -> FieldSpec {
    FieldSpec {
        key,
        kind,
        default: default.into(),
        path: false,
    }
}

fn path(key: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        kind: ValueKind::Str,
        default: TagValue::Str(String::new()),
        path: true,
    }
}

fn path_list(key: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        kind: ValueKind::list_of(ValueKind::Str),
        default: TagValue::List(Vec::new()),
        path: true,
    }
}

fn empty_list() -> TagValue {
    TagValue::List(Vec::new())
}

fn ints() -> ValueKind {
    ValueKind::list_of(ValueKind::Int)
}

fn floats() -> ValueKind {
    ValueKind::list_of(ValueKind::Float)
}

use ValueKind::{Bool, Float, Int, Str};

static MAP_TEMPLATE: Lazy<Template> = Lazy::new(|| {
    Template::new(
        Namespace::Map,
        Some("mapDir"),
        vec![
            field("name", Str, ""),
            field("package", Str, "map"),
            field("release", Str, ""),
            field("geoTag", Str, ""),
            field("region", Str, "0"),
            field("regionNames", ValueKind::list_of(Str), empty_list()),
            field("sampleType", Str, "singleMuons"),
            field("withPU", Bool, false),
            field("mapDir", Str, ""),
            field("formatted", Bool, false),
            path("pmap_1st"),
            path("pmap_2nd"),
            path("rmap"),
            path("subrmap"),
            path("modulemap"),
            path("slices"),
        ],
    )
});

static BANK_TEMPLATE: Lazy<Template> = Lazy::new(|| {
    Template::new(
        Namespace::Bank,
        Some("bankDir"),
        vec![
            field("name", Str, ""),
            field("package", Str, "bank"),
            field("mapTag", Str, ""),
            // Files
            field("bankDir", Str, ""),
            field("formatted", Bool, false),
            path("constants_1st"),
            path("constants_2nd"),
            path_list("constantsNoGuess_1st"),
            path_list("constantsNoGuess_2nd"),
            path("sectorBank_1st"),
            path("sectorBank_2nd"),
            path("sectorSlices"),
            path("patternBank"),
            // Matrix generation
            field("WCmax", Int, 0),
            // Constant generation
            field("missHitsConsts", Bool, false),
            // Pattern generation
            field("beamspot", floats(), empty_list()),
            field("d0alpha", Float, 0.0),
            field("WCplanes", ValueKind::list_of(Bool), empty_list()),
            field("rndStreamName", Str, ""),
            field("seed", Int, 0),
            field("seed2", Int, 0),
            // DC generation
            field("maxPatts", Int, 0),
            field("nDCMax", Int, 0),
            field("nDC", ints(), empty_list()),
        ],
    )
});

static ALGO_TEMPLATE: Lazy<Template> = Lazy::new(|| {
    Template::new(
        Namespace::Algo,
        Some("algoDir"),
        vec![
            field("name", Str, ""),
            field("package", Str, "algo"),
            field("mapTag", Str, ""),
            field("bankTag", Str, ""),
            field("algoDir", Str, ""),
            // Input source
            field("randomRawHits", Bool, false),
            field("realAndRandomHits", Bool, false),
            field("realHitsOverlay", Bool, false),
            field("FirstInputToolN", Int, 1),
            field("randomHitsNTracks", Int, 8),
            // Hit processing
            field("Clustering", Bool, true),
            field("SpacePoints", Bool, false),
            field("SpacePointFiltering", Bool, false),
            field("HitFiltering", Bool, false),
            // Road pre-filters
            field("EtaPatternRoadFilter", Str, ""),
            field("PhiRoadFilter", floats(), empty_list()),
            field("threshold", ints(), vec![7]),
            // Road finder selection
            field("sectorsAsPatterns", Bool, false),
            field("hough", Bool, false),
            field("hough_1d", Bool, false),
            field("max_misses", Int, 1),
            // Hough transform geometry
            field("xVar", Str, "phi"),
            field("yVar", Str, "q/pt"),
            field("phi_min", Float, 0.3),
            field("phi_max", Float, 0.5),
            field("qpt_min", Float, -1.0),
            field("qpt_max", Float, 1.0),
            field("d0_min", Float, 0.0),
            field("d0_max", Float, 0.0),
            field("xBins", Int, 216),
            field("yBins", Int, 216),
            field("xBufferBins", Int, 6),
            field("yBufferBins", Int, 2),
            field("slicing", Bool, true),
            field("localMaxWindowSize", Int, 0),
            field("fieldCorrection", Bool, true),
            field("IdealGeoRoads", Bool, false),
            field("combine_layers", ValueKind::list_of(ints()), empty_list()),
            field("scale", ints(), empty_list()),
            field("convolution", ints(), empty_list()),
            field("convSize_x", Int, 0),
            field("convSize_y", Int, 0),
            field("hitExtend_x", ints(), empty_list()),
            // Hough sub-stages
            field("TrackNNAnalysis", Bool, false),
            field("hough_rootoutput", Bool, false),
            // 1-D Hough shift transform
            field("hough1d_phiMin", Float, 0.3),
            field("hough1d_phiMax", Float, 0.5),
            field("hough1d_qptMin", Float, -1.0),
            field("hough1d_qptMax", Float, 1.0),
            field("hough1d_phiBins", Int, 200),
            field("hough1d_iterStep", Int, 0),
            field("hough1d_iterLayer", Int, 7),
            field("hough1d_useDiff", Bool, false),
            field("hough1d_variableExtend", Bool, false),
            field("hough1d_phiRangeCut", Bool, false),
            field("hough1d_d0spread", Float, -1.0),
            field("hough1d_hitExtend", ints(), empty_list()),
            path("hough1d_bitShiftPath"),
            path("hough1d_radiiFile"),
            // Track fitting
            field("IdealCoordFitType", Int, 0),
            field("DoDeltaGPhis", Bool, false),
            field("GuessHits", Bool, true),
            field("chi2DofRecoveryMin", Float, 40.0),
            field("chi2DofRecoveryMax", Float, 100000.0),
            field("doMajority", Int, 1),
            field("maxHitsPerPlane", Int, -1),
            field("nHits_noRecovery", Int, -1),
            // Overlap removal
            field("doFastOR", Bool, false),
            field("roadSliceOR", Bool, true),
            // Second stage
            field("secondStage", Bool, false),
            field("extrapolatorNCombinations", Int, 16),
            // Long-lived particles
            field("lrt", Bool, false),
            field("lrt_use_basicHitFilter", Bool, false),
            field("lrt_use_mlHitFilter", Bool, false),
            field("lrt_use_doubletHT", Bool, false),
            field("lrt_use_straightTrackHT", Bool, false),
            field("lrt_ptmin", Float, 5.0),
            field("lrt_doublet_d0_range", Float, 120.0),
            field("lrt_doublet_qpt_range", Float, 0.02),
            field("lrt_doublet_d0_bins", Int, 216),
            field("lrt_doublet_qpt_bins", Int, 216),
            field("lrt_doublet_threshold50", Int, 8),
            field("lrt_doublet_threshold", Int, 7),
            field("lrt_doublet_triplet", Bool, false),
            field("lrt_straighttrack_xVar", Str, "phi"),
            field("lrt_straighttrack_yVar", Str, "d0"),
            field("lrt_straighttrack_phi_min", Float, 0.3),
            field("lrt_straighttrack_phi_max", Float, 0.5),
            field("lrt_straighttrack_d0_min", Float, -300.0),
            field("lrt_straighttrack_d0_max", Float, 300.0),
            field("lrt_straighttrack_xBins", Int, 216),
            field("lrt_straighttrack_yBins", Int, 216),
            field("lrt_straighttrack_threshold", ints(), vec![7]),
            field("lrt_mon_d0Range", floats(), vec![-100.0, 100.0]),
            field("lrt_mon_z0Range", floats(), vec![-300.0, 300.0]),
            // Monitoring
            field("fastMon", Bool, false),
            field("canExtendHistRanges", Bool, false),
            field("barcodeFracMatch", Float, 0.5),
            // Run options
            field("doTracking", Bool, true),
            field("writeOutputData", Bool, false),
            field("outputHitTxt", Bool, false),
            field("DoMissingHitsChecks", Bool, false),
            field("houghplotJMS", Bool, false),
        ],
    )
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_templates_have_unique_keys() {
        for ns in Namespace::ALL {
            let keys: Vec<_> = template(ns).keys().collect();
            let unique: HashSet<_> = keys.iter().collect();
            assert_eq!(keys.len(), unique.len(), "duplicate key in {} template", ns);
        }
    }

    #[test]
    fn test_defaults_conform_to_kinds() {
        for ns in Namespace::ALL {
            for spec in template(ns).fields() {
                assert!(
                    spec.kind.conform(spec.key, spec.default.clone()).is_ok(),
                    "{}.{} default does not match {}",
                    ns,
                    spec.key,
                    spec.kind
                );
            }
        }
    }

    #[test]
    fn test_dir_fields_exist() {
        for ns in Namespace::ALL {
            let tmpl = template(ns);
            let dir = tmpl.dir_field().unwrap();
            assert_eq!(tmpl.field(dir).unwrap().kind, ValueKind::Str);
            assert!(!tmpl.field(dir).unwrap().path);
        }
    }

    #[test]
    fn test_bank_path_fields() {
        let paths: Vec<_> = template(Namespace::Bank).path_fields().map(|f| f.key).collect();
        assert_eq!(paths.len(), 8);
        assert!(paths.contains(&"constantsNoGuess_2nd"));
        assert!(paths.contains(&"patternBank"));
    }

    #[test]
    fn test_every_template_identifies_itself() {
        for ns in Namespace::ALL {
            let defaults = template(ns).defaults();
            assert_eq!(defaults.get("package").and_then(TagValue::as_str), Some(ns.as_str()));
            assert!(defaults.get("name").is_some());
        }
    }

    #[test]
    fn test_all_keys_sorted_and_deduplicated() {
        let keys = all_keys();
        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(keys, sorted);
        assert!(keys.contains(&"mapTag".to_string()));
    }
}
