//! Built-in tag catalog
//!
//! Listed with most recent first. Tags should not be edited after creation;
//! add a new tag instead so earlier results stay reproducible.

use crate::error::ConfigResult;
use crate::namespace::Namespace;
use crate::registry::{TagRecord, TagRegistry};

pub const DEFAULT_MAP_TAG: &str = "EF_TaskForce_dev22";
pub const DEFAULT_BANK_TAG: &str = "EF_TaskForce_dev22";
pub const DEFAULT_ALGO_TAG: &str = "default";

const EOS_ROOT: &str = "/eos/atlas/atlascerngroupdisk/det-htt/HTTsim";

const ITK_REGIONS: [&str; 8] = [
    "eta0103phi0305",
    "eta0709phi0305",
    "eta1214phi0305",
    "eta2022phi0305",
    "eta3234phi0305",
    "eta0103phi1113",
    "eta0103phi1921",
    "eta0103phi3436",
];

/// Registry holding every built-in tag
pub fn builtin_registry() -> ConfigResult<TagRegistry> {
    let mut builder = TagRegistry::builder();
    for record in map_tags() {
        builder = builder.register(Namespace::Map, record)?;
    }
    for record in bank_tags() {
        builder = builder.register(Namespace::Bank, record)?;
    }
    for record in algo_tags() {
        builder = builder.register(Namespace::Algo, record)?;
    }
    builder
        .default_tag(Namespace::Map, DEFAULT_MAP_TAG)
        .default_tag(Namespace::Bank, DEFAULT_BANK_TAG)
        .default_tag(Namespace::Algo, DEFAULT_ALGO_TAG)
        .build()
}

fn map_tag(name: &str, geo_tag: &str, release: &str) -> TagRecord {
    TagRecord::from_template(Namespace::Map)
        .set("name", name)
        .set("release", release)
        .set("geoTag", geo_tag)
        .set("region", "0")
        .set("regionNames", ITK_REGIONS.to_vec())
        .set("sampleType", "singleMuons")
        .set("withPU", false)
        .set("mapDir", format!("{}/{}/{}/{{regionName}}/maps/", EOS_ROOT, geo_tag, release))
        .set("formatted", true)
        .set("pmap_1st", "ITk_8L.pmap")
        .set("pmap_2nd", "ITk_13L.pmap")
        .set("rmap", "ITk_reg{region}.rmap")
        .set("subrmap", "ITk_reg{region}_subregions.rmap")
        .set("modulemap", "ITk.moduleidmap")
        .set("slices", "slices_v01.txt")
}

fn map_tags() -> Vec<TagRecord> {
    vec![
        map_tag("EF_TaskForce_dev22", "ATLAS-P2-ITK-22-02-00", "21.9.16"),
        map_tag("EF_TaskForce_dev23", "ATLAS-P2-ITK-23-00-01", "21.9.15"),
        map_tag("TDRConf-v1", "ATLAS-P2-ITK-17-06-00", "21.9.2"),
    ]
}

fn skip_planes(prefix: &str) -> Vec<String> {
    (0..8)
        .map(|plane| format!("{}_skipPlane{}.gcon", prefix, plane))
        .collect()
}

/// Bank generation settings shared by every built-in bank tag
fn bank_generation(record: TagRecord) -> TagRecord {
    record
        .set("WCmax", 2)
        .set("missHitsConsts", false)
        .set("WCplanes", vec![true; 8])
        .set("beamspot", vec![0.0, 0.0])
        .set("d0alpha", 0.0)
        .set("rndStreamName", "RANDOM")
        .set("seed", 42)
        .set("seed2", 1337)
        .set("maxPatts", 3_750_000)
        .set("nDCMax", 4)
        .set("nDC", vec![2, 1, 1, 1, 1, 1, 2, 2])
}

fn formatted_bank(name: &str, map_tag: &str, dir: &str, second_stage: &str, pattern_bank: &str) -> TagRecord {
    bank_generation(
        TagRecord::from_template(Namespace::Bank)
            .set("name", name)
            .set("mapTag", map_tag)
            .set("bankDir", dir)
            .set("formatted", true)
            .set("constants_1st", "SectorBanks/corrgen_raw_8L.gcon")
            .set("constants_2nd", format!("SectorBanks/corrgen_raw_{}.gcon", second_stage))
            .set("sectorBank_1st", "SectorBanks/sectorsHW_raw_8L.patt")
            .set("sectorBank_2nd", format!("SectorBanks/sectorsHW_raw_{}.patt", second_stage))
            .set("sectorSlices", "SectorBanks/slices_8L.root")
            .set("patternBank", pattern_bank)
            .set("constantsNoGuess_1st", skip_planes("SectorBanks/corrgen_raw_8L"))
            .set("constantsNoGuess_2nd", skip_planes("SectorBanks/corrgen_raw_13L")),
    )
}

fn bank_tags() -> Vec<TagRecord> {
    vec![
        formatted_bank(
            "EF_TaskForce_dev22",
            "EF_TaskForce_dev22",
            &format!("{}/ATLAS-P2-ITK-22-02-00/21.9.16/{{regionName}}/", EOS_ROOT),
            "13L_reg0_checkGood1",
            "PatternBanks/ccache.T_dc_21111122_max4_3.75M.root",
        ),
        formatted_bank(
            "EF_TaskForce_dev23",
            "EF_TaskForce_dev23",
            &format!("{}/ATLAS-P2-ITK-23-00-01/21.9.15/{{regionName}}/", EOS_ROOT),
            "13L",
            "PatternBanks/ccache.patterns.root",
        ),
        formatted_bank(
            "21.9.2",
            "TDRConf-v1",
            &format!("{}/ATLAS-P2-ITK-17-06-00/21.9.2/{{regionName}}/", EOS_ROOT),
            "13L",
            "PatternBanks/ccache.patterns.root",
        ),
        bank_generation(
            TagRecord::from_template(Namespace::Bank)
                .set("name", "jahreda_20-07-20")
                .set("mapTag", "TDRConf-v1")
                .set(
                    "bankDir",
                    format!(
                        "{}/ATLAS-P2-ITK-17-06-00/21.9.2/eta0103phi0305/SectorBanks/20-07-20-jahreda/",
                        EOS_ROOT
                    ),
                )
                .set("formatted", false)
                .set("constants_1st", "corrgen_raw_8L_reg0_checkGood1.gcon")
                .set("constants_2nd", "corrgen_raw_13L_reg0_checkGood1.gcon")
                .set("sectorBank_1st", "sectorsHW_raw_8L_reg0_checkGood1.patt")
                .set("sectorBank_2nd", "sectorsHW_raw_13L_reg0_checkGood1.patt")
                .set("sectorSlices", "slices_8L_reg0.root")
                .set("patternBank", "ccache.T_dc_21111122_max4_3.75M.root")
                .set("constantsNoGuess_1st", skip_planes("corrgen_raw_8L_reg0_checkGood1"))
                .set("constantsNoGuess_2nd", skip_planes("corrgen_raw_13L_reg0_checkGood1")),
        ),
    ]
}

fn algo_tags() -> Vec<TagRecord> {
    vec![
        TagRecord::from_template(Namespace::Algo).set("name", DEFAULT_ALGO_TAG),
        TagRecord::inherit(DEFAULT_ALGO_TAG)
            .set("name", "sectors")
            .set("sectorsAsPatterns", true),
        TagRecord::inherit(DEFAULT_ALGO_TAG)
            .set("name", "hough")
            .set("hough", true)
            .set("threshold", vec![7])
            .set("localMaxWindowSize", 3)
            .set("combine_layers", vec![vec![0], vec![1], vec![2], vec![3], vec![4], vec![5], vec![6], vec![7]])
            .set("scale", vec![1, 1, 1, 1, 1, 1, 1, 1])
            .set("hitExtend_x", vec![2, 1, 0, 0, 0, 0, 0, 0])
            .set("IdealCoordFitType", 2)
            .set("DoDeltaGPhis", true),
        TagRecord::inherit(DEFAULT_ALGO_TAG)
            .set("name", "hough_1d")
            .set("hough_1d", true)
            .set("threshold", vec![7])
            .set("hough1d_hitExtend", vec![1, 1, 1, 1, 1, 1, 1, 1])
            .set("hough1d_bitShiftPath", "bitshifts.txt")
            .set("hough1d_radiiFile", "radii.txt")
            .set("algoDir", format!("{}/HoughConfig/", EOS_ROOT)),
        TagRecord::inherit("hough")
            .set("name", "lrt_doublet")
            .set("lrt", true)
            .set("lrt_use_basicHitFilter", true)
            .set("lrt_use_doubletHT", true),
        TagRecord::inherit("hough")
            .set("name", "lrt_straight")
            .set("lrt", true)
            .set("lrt_use_mlHitFilter", true)
            .set("lrt_use_straightTrackHT", true),
    ]
}
