//! Tag namespaces and resolution stages

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three tag namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Map,
    Bank,
    Algo,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Map, Namespace::Bank, Namespace::Algo];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::Bank => "bank",
            Self::Algo => "algo",
        }
    }

    /// Override key that selects the tag name for this namespace
    pub fn selector_key(&self) -> &'static str {
        match self {
            Self::Map => "mapTag",
            Self::Bank => "bankTag",
            Self::Algo => "algoTag",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s {
            "map" => Ok(Self::Map),
            "bank" => Ok(Self::Bank),
            "algo" => Ok(Self::Algo),
            other => Err(ConfigError::unknown_override_key(
                other,
                &Namespace::ALL.map(|ns| ns.to_string()),
            )),
        }
    }
}

/// Resolution stage: which tag triple a request needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Map,
    Bank,
    Algo,
}

impl Stage {
    /// Namespaces resolved for this stage, in dependency order
    pub fn namespaces(&self) -> &'static [Namespace] {
        match self {
            Self::Map => &[Namespace::Map],
            Self::Bank => &[Namespace::Map, Namespace::Bank],
            Self::Algo => &[Namespace::Map, Namespace::Bank, Namespace::Algo],
        }
    }

    pub fn includes(&self, namespace: Namespace) -> bool {
        self.namespaces().contains(&namespace)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Map => "map",
            Self::Bank => "bank",
            Self::Algo => "algo",
        };
        f.write_str(s)
    }
}

impl FromStr for Stage {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        Ok(match Namespace::from_str(s)? {
            Namespace::Map => Self::Map,
            Namespace::Bank => Self::Bank,
            Namespace::Algo => Self::Algo,
        })
    }
}
