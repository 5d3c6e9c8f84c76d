//! Mutually-exclusive feature groups
//!
//! The algo tag stores each decision as independent boolean flags. A
//! [`FeatureGroup`] names one decision and its member flags; a
//! [`FeatureSelection`] is the typed result of reading every group.

use crate::error::{ConfigError, ConfigResult};
use crate::tag::Tag;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// A named set of mutually-exclusive flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureGroup {
    InputSource,
    RoadFinder,
    LrtHitFilter,
    LrtRoadFinder,
}

impl FeatureGroup {
    pub const ALL: [FeatureGroup; 4] = [
        FeatureGroup::InputSource,
        FeatureGroup::RoadFinder,
        FeatureGroup::LrtHitFilter,
        FeatureGroup::LrtRoadFinder,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::InputSource => "input source",
            Self::RoadFinder => "road finder",
            Self::LrtHitFilter => "LRT hit filter",
            Self::LrtRoadFinder => "LRT road finder",
        }
    }

    /// Member flags in priority order
    pub fn members(&self) -> &'static [&'static str] {
        match self {
            Self::InputSource => &["randomRawHits", "realAndRandomHits", "realHitsOverlay"],
            Self::RoadFinder => &["sectorsAsPatterns", "hough", "hough_1d"],
            Self::LrtHitFilter => &["lrt_use_basicHitFilter", "lrt_use_mlHitFilter"],
            Self::LrtRoadFinder => &["lrt_use_doubletHT", "lrt_use_straightTrackHT"],
        }
    }

    /// Flag that must be on for the group to apply
    pub fn governing_flag(&self) -> Option<&'static str> {
        match self {
            Self::LrtHitFilter | Self::LrtRoadFinder => Some("lrt"),
            Self::InputSource | Self::RoadFinder => None,
        }
    }

    /// Whether no active member is legal (a default member applies)
    pub fn allows_none(&self) -> bool {
        matches!(self, Self::InputSource | Self::RoadFinder)
    }

    /// Whether the group applies to this algo tag
    pub fn is_governed(&self, algo: &Tag) -> ConfigResult<bool> {
        match self.governing_flag() {
            Some(flag) => algo.bool(flag),
            None => Ok(true),
        }
    }

    /// Member flags set to true
    pub fn active_members(&self, algo: &Tag) -> ConfigResult<Vec<&'static str>> {
        let mut active = Vec::new();
        for member in self.members() {
            if algo.bool(member)? {
                active.push(*member);
            }
        }
        Ok(active)
    }

    /// Highest-priority active member, warning when several are on
    pub fn priority_member(&self, algo: &Tag) -> ConfigResult<Option<&'static str>> {
        let active = self.active_members(algo)?;
        if active.len() > 1 {
            warn!(group = %self, active = ?active, chosen = active[0], "Conflicting flags, using highest priority");
        }
        Ok(active.first().copied())
    }

    /// Violation, if the group applies and its active member count is illegal
    pub fn check(&self, algo: &Tag) -> ConfigResult<Option<GroupViolation>> {
        if !self.is_governed(algo)? {
            return Ok(None);
        }
        let active = self.active_members(algo)?;
        let legal = match active.len() {
            0 => self.allows_none(),
            1 => true,
            _ => false,
        };
        Ok((!legal).then(|| GroupViolation {
            group: *self,
            active: active.into_iter().map(str::to_string).collect(),
        }))
    }
}

impl fmt::Display for FeatureGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Group with zero or several active members where that is illegal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupViolation {
    pub group: FeatureGroup,
    pub active: Vec<String>,
}

impl From<GroupViolation> for ConfigError {
    fn from(v: GroupViolation) -> Self {
        ConfigError::inconsistent(v.group.name(), v.active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    FileReplay,
    RandomHits,
    FileWithRandomHits,
    FileWithOverlay,
}

impl InputSource {
    /// Priority pick; no active flag means plain file replay
    pub fn from_algo(algo: &Tag) -> ConfigResult<Self> {
        Ok(match FeatureGroup::InputSource.priority_member(algo)? {
            Some("randomRawHits") => Self::RandomHits,
            Some("realAndRandomHits") => Self::FileWithRandomHits,
            Some(_) => Self::FileWithOverlay,
            None => Self::FileReplay,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::FileReplay => "file_replay",
            Self::RandomHits => "random_hits",
            Self::FileWithRandomHits => "file_with_random_hits",
            Self::FileWithOverlay => "file_with_overlay",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadFinderVariant {
    PatternMatch,
    SectorsAsPatterns,
    Hough,
    #[serde(rename = "hough_1d")]
    Hough1D,
}

impl RoadFinderVariant {
    /// Priority pick; no active flag means pattern matching
    pub fn from_algo(algo: &Tag) -> ConfigResult<Self> {
        Ok(match FeatureGroup::RoadFinder.priority_member(algo)? {
            Some("sectorsAsPatterns") => Self::SectorsAsPatterns,
            Some("hough") => Self::Hough,
            Some(_) => Self::Hough1D,
            None => Self::PatternMatch,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PatternMatch => "pattern_match",
            Self::SectorsAsPatterns => "sector_match",
            Self::Hough => "hough",
            Self::Hough1D => "hough_1d",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LrtHitFilter {
    Basic,
    Ml,
}

impl LrtHitFilter {
    pub fn from_member(member: &str) -> Option<Self> {
        match member {
            "lrt_use_basicHitFilter" => Some(Self::Basic),
            "lrt_use_mlHitFilter" => Some(Self::Ml),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Ml => "ml",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LrtRoadFinder {
    DoubletHough,
    StraightTrackHough,
}

impl LrtRoadFinder {
    pub fn from_member(member: &str) -> Option<Self> {
        match member {
            "lrt_use_doubletHT" => Some(Self::DoubletHough),
            "lrt_use_straightTrackHT" => Some(Self::StraightTrackHough),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DoubletHough => "doublet_hough",
            Self::StraightTrackHough => "straight_track_hough",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LrtSelection {
    pub hit_filter: LrtHitFilter,
    pub road_finder: LrtRoadFinder,
}

/// One selected member per group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSelection {
    pub input: InputSource,
    pub road_finder: RoadFinderVariant,
    pub lrt: Option<LrtSelection>,
}

impl FeatureSelection {
    /// Read the selection from an algo tag.
    ///
    /// Conflicting input-source or road-finder flags are settled by member
    /// priority and left for the validator to report. LRT groups must have
    /// exactly one member when `lrt` is on.
    pub fn from_algo(algo: &Tag) -> ConfigResult<Self> {
        let lrt = if algo.bool("lrt")? {
            let hit_filter = exactly_one(FeatureGroup::LrtHitFilter, algo)?;
            let road_finder = exactly_one(FeatureGroup::LrtRoadFinder, algo)?;
            Some(LrtSelection {
                hit_filter: LrtHitFilter::from_member(hit_filter).ok_or_else(|| {
                    ConfigError::inconsistent(FeatureGroup::LrtHitFilter.name(), vec![hit_filter.to_string()])
                })?,
                road_finder: LrtRoadFinder::from_member(road_finder).ok_or_else(|| {
                    ConfigError::inconsistent(FeatureGroup::LrtRoadFinder.name(), vec![road_finder.to_string()])
                })?,
            })
        } else {
            None
        };

        Ok(Self {
            input: InputSource::from_algo(algo)?,
            road_finder: RoadFinderVariant::from_algo(algo)?,
            lrt,
        })
    }
}

fn exactly_one(group: FeatureGroup, algo: &Tag) -> ConfigResult<&'static str> {
    if let Some(violation) = group.check(algo)? {
        return Err(violation.into());
    }
    let active = group.active_members(algo)?;
    active
        .first()
        .copied()
        .ok_or_else(|| ConfigError::inconsistent(group.name(), Vec::new()))
}
