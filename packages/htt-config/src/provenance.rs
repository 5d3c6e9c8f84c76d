//! Configuration provenance tracking
//!
//! Track where each resolved value came from (catalog tag, YAML, env, builder)

use crate::namespace::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field-level provenance for one resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigProvenance {
    /// Tag name chosen per namespace
    base_tags: BTreeMap<Namespace, String>,

    /// Field path → source
    /// Example: "bank.bankDir" → ConfigSource::Env("HTT_bank__bankDir")
    field_sources: BTreeMap<String, ConfigSource>,
}

/// Configuration source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Stored value of a catalog tag
    Catalog { namespace: Namespace, tag: String },

    /// From YAML override document
    Yaml { path: String },

    /// From environment variable
    Env(String),

    /// From builder API
    Builder,
}

impl ConfigProvenance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the catalog tag a namespace was resolved from
    pub fn track_base(&mut self, namespace: Namespace, tag: &str) {
        self.base_tags.insert(namespace, tag.to_string());
    }

    /// Record field-level override
    pub fn track_field(&mut self, field_path: &str, source: ConfigSource) {
        self.field_sources.insert(field_path.to_string(), source);
    }

    /// Source of `namespace.key`: the override that set it, else its catalog tag
    pub fn source_of(&self, namespace: Namespace, key: &str) -> Option<ConfigSource> {
        self.field_sources
            .get(&format!("{}.{}", namespace, key))
            .cloned()
            .or_else(|| {
                self.base_tags.get(&namespace).map(|tag| ConfigSource::Catalog {
                    namespace,
                    tag: tag.clone(),
                })
            })
    }

    pub fn get_source(&self, field_path: &str) -> Option<&ConfigSource> {
        self.field_sources.get(field_path)
    }

    pub fn field_sources(&self) -> &BTreeMap<String, ConfigSource> {
        &self.field_sources
    }

    /// Get human-readable summary
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for (namespace, tag) in &self.base_tags {
            lines.push(format!("Base {} tag: {}", namespace, tag));
        }

        if !self.field_sources.is_empty() {
            lines.push("\nOverridden fields:".to_string());
            for (field, source) in &self.field_sources {
                let source_str = match source {
                    ConfigSource::Catalog { namespace, tag } => format!("{} tag {}", namespace, tag),
                    ConfigSource::Yaml { path } => path.clone(),
                    ConfigSource::Env(var) => format!("env ${}", var),
                    ConfigSource::Builder => "builder API".to_string(),
                };
                lines.push(format!("  {} ← {}", field, source_str));
            }
        }

        lines.join("\n")
    }
}

impl ConfigSource {
    /// Get a short description
    pub fn describe(&self) -> String {
        match self {
            ConfigSource::Catalog { namespace, tag } => format!("{}:{}", namespace, tag),
            ConfigSource::Yaml { path } => format!("yaml:{}", path),
            ConfigSource::Env(var) => format!("env:{}", var),
            ConfigSource::Builder => "builder".to_string(),
        }
    }
}
