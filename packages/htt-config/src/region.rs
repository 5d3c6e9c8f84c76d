//! Detector region selection

use crate::error::{ConfigError, ConfigResult};
use crate::expander::TemplateContext;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A region resolved against a map tag's `regionNames`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSelection {
    pub index: usize,
    pub name: String,
}

impl RegionSelection {
    /// Resolve `value` as an index into `region_names`, or else as a name.
    ///
    /// An integer-like value that is out of range as an index is still
    /// tried as a name.
    pub fn resolve(value: &str, region_names: &[String]) -> ConfigResult<Self> {
        let trimmed = value.trim();
        let invalid = || ConfigError::InvalidRegion {
            value: value.to_string(),
            region_names: region_names.to_vec(),
        };

        let by_index = trimmed
            .parse::<usize>()
            .ok()
            .and_then(|index| region_names.get(index).map(|name| (index, name)));
        let by_name = || {
            region_names
                .iter()
                .enumerate()
                .find(|(_, name)| name.as_str() == trimmed)
        };

        by_index
            .or_else(by_name)
            .map(|(index, name)| Self {
                index,
                name: name.clone(),
            })
            .ok_or_else(invalid)
    }

    /// Path template context: `region` (index) and `regionName`
    pub fn context(&self) -> TemplateContext {
        TemplateContext::new()
            .with("region", self.index.to_string())
            .with("regionName", self.name.clone())
    }
}

impl fmt::Display for RegionSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.index, self.name)
    }
}
