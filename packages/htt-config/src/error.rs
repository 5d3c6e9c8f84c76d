//! Configuration error types

use crate::namespace::Namespace;
use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Requested named tag is absent from the registry
    #[error("Unknown {namespace} tag '{name}'. {suggestion}")]
    UnknownTag {
        namespace: Namespace,
        name: String,
        suggestion: String,
    },

    /// Region override matches neither an index nor a known region name
    #[error("Invalid region '{value}'. Known regions: [{}]", region_names.join(", "))]
    InvalidRegion {
        value: String,
        region_names: Vec<String>,
    },

    /// A path placeholder has no binding in the template context
    #[error("Missing template context for '{{{token}}}' in field '{field}'")]
    MissingTemplateContext { field: String, token: String },

    /// Mutually-exclusive group violated, or cross-namespace references disagree
    #[error("Inconsistent tag configuration for {group}: [{}]", values.join(", "))]
    InconsistentTag { group: String, values: Vec<String> },

    /// A single-threshold filter received more or fewer than one value
    #[error("{filter} supports exactly one threshold value, got [{}]", values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    MultiValueThresholdUnsupported { filter: String, values: Vec<i64> },

    /// Registered record does not cover its namespace template exactly
    #[error("Tag '{name}' does not match the {namespace} template (missing: [{}], extra: [{}])", missing.join(", "), extra.join(", "))]
    TemplateMismatch {
        namespace: Namespace,
        name: String,
        missing: Vec<String>,
        extra: Vec<String>,
    },

    /// Same tag name registered twice in one namespace
    #[error("Duplicate {namespace} tag '{name}'")]
    DuplicateTag { namespace: Namespace, name: String },

    /// Override key recognized by no namespace template
    #[error("Unknown override key '{key}'. {suggestion}")]
    UnknownOverrideKey { key: String, suggestion: String },

    /// A tag lacks a field its reader asked for
    #[error("{namespace} tag has no field '{key}'")]
    MissingField { namespace: Namespace, key: String },

    /// Override value could not be coerced to the template type
    #[error("Cannot set '{key}' to '{value}': expected {expected}")]
    TypeMismatch {
        key: String,
        expected: String,
        value: String,
    },

    /// Override targets a key that identifies the tag itself
    #[error("Key '{0}' identifies the tag and cannot be overridden")]
    ReservedKey(String),

    /// Unsupported override document version
    #[error("Unsupported override document version {found}. Supported versions: {}", supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Create an unknown tag error with suggestion
    pub fn unknown_tag(namespace: Namespace, name: impl Into<String>, known: &[String]) -> Self {
        let name = name.into();
        let suggestion = find_closest_match(&name, known);
        Self::UnknownTag {
            namespace,
            name,
            suggestion,
        }
    }

    /// Create an unknown override key error with suggestion
    pub fn unknown_override_key(key: impl Into<String>, valid_keys: &[String]) -> Self {
        let key = key.into();
        let suggestion = find_closest_match(&key, valid_keys);
        Self::UnknownOverrideKey { key, suggestion }
    }

    /// Create an inconsistency error for a named group
    pub fn inconsistent(group: impl Into<String>, values: Vec<String>) -> Self {
        Self::InconsistentTag {
            group: group.into(),
            values,
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(
        key: impl Into<String>,
        expected: impl ToString,
        value: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            expected: expected.to_string(),
            value: value.into(),
        }
    }
}

/// Find closest match using simple edit distance
pub(crate) fn find_closest_match(target: &str, candidates: &[String]) -> String {
    candidates
        .iter()
        .min_by_key(|candidate| levenshtein_distance(target, candidate))
        .map(|closest| format!("Did you mean '{}'?", closest))
        .unwrap_or_else(|| "No valid names available".to_string())
}

/// Simple Levenshtein distance implementation
fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    let mut matrix = vec![vec![0; b.len() + 1]; a.len() + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b.len() {
        matrix[0][j] = j;
    }

    for (i, c1) in a.iter().enumerate() {
        for (j, c2) in b.iter().enumerate() {
            let cost = if c1 == c2 { 0 } else { 1 };
            matrix[i + 1][j + 1] = (matrix[i][j + 1] + 1) // deletion
                .min(matrix[i + 1][j] + 1) // insertion
                .min(matrix[i][j] + cost); // substitution
        }
    }

    matrix[a.len()][b.len()]
}
