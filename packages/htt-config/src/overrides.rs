//! Override sets
//!
//! Overrides are key → value pairs applied on top of the catalog tags at
//! resolution time. They can come from the builder API, a YAML document or
//! environment-style pairs; each entry remembers its source.
//!
//! YAML schema:
//! ```yaml
//! version: 1
//! overrides:
//!   algoTag: hough
//!   secondStage: true
//!   threshold: [5]
//!   bank.bankDir: /data/banks/{regionName}/
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::namespace::Namespace;
use crate::provenance::ConfigSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Supported override document versions
pub const SUPPORTED_VERSIONS: &[u32] = &[1];

/// Environment variable prefix for [`OverrideSet::from_env`]
pub const ENV_PREFIX: &str = "HTT_";

/// Raw override input, before coercion to the template kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OverrideValue {
    Scalar(String),
    List(Vec<String>),
}

impl OverrideValue {
    /// Scalar text, if this is a scalar
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::List(_) => None,
        }
    }
}

impl From<&str> for OverrideValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for OverrideValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<bool> for OverrideValue {
    fn from(value: bool) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<i64> for OverrideValue {
    fn from(value: i64) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<f64> for OverrideValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<Vec<&str>> for OverrideValue {
    fn from(values: Vec<&str>) -> Self {
        Self::List(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for OverrideValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

impl From<Vec<i64>> for OverrideValue {
    fn from(values: Vec<i64>) -> Self {
        Self::List(values.iter().map(i64::to_string).collect())
    }
}

/// Parsed override key: flat (`hough`) or namespace-qualified (`bank.bankDir`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideKey {
    pub namespace: Option<Namespace>,
    pub field: String,
}

impl OverrideKey {
    pub fn parse(key: &str) -> ConfigResult<Self> {
        match key.split_once('.') {
            Some((prefix, field)) => Ok(Self {
                namespace: Some(prefix.parse()?),
                field: field.to_string(),
            }),
            None => Ok(Self {
                namespace: None,
                field: key.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct OverrideEntry {
    value: OverrideValue,
    source: ConfigSource,
}

/// Ordered set of overrides with per-key source tracking
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideSet {
    entries: BTreeMap<String, OverrideEntry>,
}

#[derive(Debug, Deserialize)]
struct OverrideDocument {
    version: u32,
    #[serde(default)]
    overrides: BTreeMap<String, serde_yaml::Value>,
}

impl OverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn set(mut self, key: impl Into<String>, value: impl Into<OverrideValue>) -> Self {
        self.insert(key, value, ConfigSource::Builder);
        self
    }

    /// Insert with explicit source; last write wins
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<OverrideValue>,
        source: ConfigSource,
    ) {
        let key = key.into();
        let value = value.into();
        debug!(key = %key, value = ?value, source = %source.describe(), "Override recorded");
        self.entries.insert(key, OverrideEntry { value, source });
    }

    /// Parse a YAML override document
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        Self::parse_yaml(yaml, "<inline>")
    }

    /// Load a YAML override document from disk
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse_yaml(&content, &path.display().to_string())
    }

    fn parse_yaml(yaml: &str, origin: &str) -> ConfigResult<Self> {
        let doc: OverrideDocument = serde_yaml::from_str(yaml)?;
        if !SUPPORTED_VERSIONS.contains(&doc.version) {
            return Err(ConfigError::UnsupportedVersion {
                found: doc.version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let mut set = Self::new();
        for (key, value) in doc.overrides {
            let value = yaml_to_override(&key, &value)?;
            set.insert(
                key,
                value,
                ConfigSource::Yaml {
                    path: origin.to_string(),
                },
            );
        }
        Ok(set)
    }

    /// Build from environment-style pairs.
    ///
    /// Only names starting with [`ENV_PREFIX`] are taken; a double underscore
    /// after the prefix separates namespace and field (`HTT_bank__bankDir`).
    pub fn from_env_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut set = Self::new();
        for (name, value) in pairs {
            let name = name.as_ref();
            let Some(stripped) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            if stripped.is_empty() {
                continue;
            }
            let key = stripped.replacen("__", ".", 1);
            set.insert(key, value.into(), ConfigSource::Env(name.to_string()));
        }
        set
    }

    /// Build from the process environment
    pub fn from_env() -> Self {
        Self::from_env_pairs(std::env::vars())
    }

    /// Merge another set on top of this one; `other` wins on conflicts
    pub fn merge(mut self, other: OverrideSet) -> Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn get(&self, key: &str) -> Option<&OverrideValue> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn source(&self, key: &str) -> Option<&ConfigSource> {
        self.entries.get(key).map(|e| &e.source)
    }

    /// Scalar text of a key, if set as a scalar
    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(OverrideValue::as_scalar)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OverrideValue, &ConfigSource)> {
        self.entries
            .iter()
            .map(|(k, e)| (k.as_str(), &e.value, &e.source))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn yaml_to_override(key: &str, value: &serde_yaml::Value) -> ConfigResult<OverrideValue> {
    use serde_yaml::Value;

    match value {
        Value::Sequence(items) => items
            .iter()
            .map(|item| match item {
                Value::Sequence(group) => group
                    .iter()
                    .map(|v| yaml_scalar(key, v))
                    .collect::<ConfigResult<Vec<_>>>()
                    .map(|parts| parts.join(",")),
                other => yaml_scalar(key, other),
            })
            .collect::<ConfigResult<Vec<_>>>()
            .map(OverrideValue::List),
        other => yaml_scalar(key, other).map(OverrideValue::Scalar),
    }
}

fn yaml_scalar(key: &str, value: &serde_yaml::Value) -> ConfigResult<String> {
    use serde_yaml::Value;

    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        other => Err(ConfigError::type_mismatch(
            key,
            "scalar or list",
            format!("{:?}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder_set() {
        let set = OverrideSet::new().set("hough", true).set("threshold", vec![5i64]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.scalar("hough"), Some("true"));
        assert_eq!(set.get("threshold"), Some(&OverrideValue::List(vec!["5".to_string()])));
        assert_eq!(set.source("hough"), Some(&ConfigSource::Builder));
    }

    #[test]
    fn test_last_write_wins() {
        let set = OverrideSet::new().set("region", "1").set("region", "R2");
        assert_eq!(set.scalar("region"), Some("R2"));
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(
            OverrideKey::parse("bank.bankDir").unwrap(),
            OverrideKey {
                namespace: Some(Namespace::Bank),
                field: "bankDir".to_string(),
            }
        );
        assert_eq!(OverrideKey::parse("hough").unwrap().namespace, None);
        assert!(OverrideKey::parse("bnak.bankDir").is_err());
    }

    #[test]
    fn test_yaml_document() {
        let yaml = r#"
version: 1
overrides:
  algoTag: hough
  secondStage: true
  threshold: [5]
  combine_layers: [[0, 1], [2]]
  phi_min: 0.25
"#;
        let set = OverrideSet::from_yaml_str(yaml).unwrap();
        assert_eq!(set.scalar("algoTag"), Some("hough"));
        assert_eq!(set.scalar("secondStage"), Some("true"));
        assert_eq!(set.scalar("phi_min"), Some("0.25"));
        assert_eq!(
            set.get("combine_layers"),
            Some(&OverrideValue::List(vec!["0,1".to_string(), "2".to_string()]))
        );
        assert!(matches!(set.source("threshold"), Some(ConfigSource::Yaml { .. })));
    }

    #[test]
    fn test_yaml_unsupported_version() {
        let err = OverrideSet::from_yaml_str("version: 2\noverrides: {}\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { found: 2, .. }));
    }

    #[test]
    fn test_yaml_rejects_mapping_value() {
        let err = OverrideSet::from_yaml_str("version: 1\noverrides:\n  hough: {a: 1}\n").unwrap_err();
        assert!(matches!(err, ConfigError::TypeMismatch { .. }));
    }

    #[test]
    fn test_env_pairs() {
        let set = OverrideSet::from_env_pairs(vec![
            ("HTT_hough", "1"),
            ("HTT_bank__bankDir", "/tmp/banks/"),
            ("PATH", "/usr/bin"),
            ("HTT_", "ignored"),
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.scalar("hough"), Some("1"));
        assert_eq!(set.scalar("bank.bankDir"), Some("/tmp/banks/"));
        assert_eq!(
            set.source("bank.bankDir"),
            Some(&ConfigSource::Env("HTT_bank__bankDir".to_string()))
        );
    }

    #[test]
    fn test_merge_other_wins() {
        let base = OverrideSet::new().set("region", "0").set("hough", true);
        let env = OverrideSet::from_env_pairs(vec![("HTT_region", "2")]);
        let merged = base.merge(env);
        assert_eq!(merged.scalar("region"), Some("2"));
        assert_eq!(merged.scalar("hough"), Some("true"));
    }
}
