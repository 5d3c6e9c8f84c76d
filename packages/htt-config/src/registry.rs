//! Tag registry
//!
//! Immutable catalog of named tags per namespace. Built once through
//! [`TagRegistryBuilder`], which rejects records that do not cover their
//! namespace template exactly, then shared read-only.

use crate::catalog;
use crate::error::{ConfigError, ConfigResult};
use crate::namespace::Namespace;
use crate::schema::{template, Template};
use crate::tag::Tag;
use crate::value::TagValue;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use tracing::debug;

static BUILTIN: Lazy<TagRegistry> = Lazy::new(|| {
    catalog::builtin_registry()
        .unwrap_or_else(|err| panic!("built-in tag catalog is invalid: {}", err))
});

/// A tag definition as registered: complete, or a delta on a parent
#[derive(Debug, Clone, Default)]
pub struct TagRecord {
    parent: Option<String>,
    fields: BTreeMap<String, TagValue>,
}

impl TagRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inherit every field not set on this record from `parent`
    pub fn inherit(parent: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            fields: BTreeMap::new(),
        }
    }

    /// Start from the namespace template defaults
    pub fn from_template(namespace: Namespace) -> Self {
        Self {
            parent: None,
            fields: template(namespace).defaults().into_fields(),
        }
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }
}

/// Read-only catalog of tags
#[derive(Debug, Clone)]
pub struct TagRegistry {
    tags: BTreeMap<Namespace, BTreeMap<String, Tag>>,
    defaults: BTreeMap<Namespace, String>,
}

impl TagRegistry {
    pub fn builder() -> TagRegistryBuilder {
        TagRegistryBuilder::default()
    }

    /// Process-wide built-in catalog
    pub fn builtin() -> &'static TagRegistry {
        &BUILTIN
    }

    /// Look up a tag by name
    pub fn get(&self, namespace: Namespace, name: &str) -> ConfigResult<&Tag> {
        self.tags
            .get(&namespace)
            .and_then(|tags| tags.get(name))
            .ok_or_else(|| ConfigError::unknown_tag(namespace, name, &self.names(namespace)))
    }

    /// All-defaults record of a namespace
    pub fn template(&self, namespace: Namespace) -> Tag {
        template(namespace).defaults()
    }

    /// Name used when no selector override is given
    pub fn default_name(&self, namespace: Namespace) -> ConfigResult<&str> {
        self.defaults
            .get(&namespace)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::unknown_tag(namespace, "<default>", &self.names(namespace)))
    }

    pub fn names(&self, namespace: Namespace) -> Vec<String> {
        self.tags
            .get(&namespace)
            .map(|tags| tags.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, namespace: Namespace, name: &str) -> bool {
        self.get(namespace, name).is_ok()
    }

    /// Builder seeded with every tag of this registry
    pub fn extend(&self) -> TagRegistryBuilder {
        TagRegistryBuilder {
            tags: self.tags.clone(),
            defaults: self.defaults.clone(),
        }
    }
}

/// Registry builder
#[derive(Debug, Default)]
pub struct TagRegistryBuilder {
    tags: BTreeMap<Namespace, BTreeMap<String, Tag>>,
    defaults: BTreeMap<Namespace, String>,
}

impl TagRegistryBuilder {
    /// Register a tag; parents must be registered first
    pub fn register(mut self, namespace: Namespace, record: TagRecord) -> ConfigResult<Self> {
        let tmpl = template(namespace);
        let name = match record.fields.get("name") {
            Some(TagValue::Str(name)) if !name.is_empty() => name.clone(),
            _ => {
                return Err(ConfigError::TemplateMismatch {
                    namespace,
                    name: String::new(),
                    missing: vec!["name".to_string()],
                    extra: Vec::new(),
                })
            }
        };

        let existing = self.tags.entry(namespace).or_default();
        if existing.contains_key(&name) {
            return Err(ConfigError::DuplicateTag { namespace, name });
        }

        let extra: Vec<String> = record
            .fields
            .keys()
            .filter(|key| !tmpl.contains(key))
            .cloned()
            .collect();

        let mut fields = match &record.parent {
            Some(parent) => existing
                .get(parent)
                .map(|tag| tag.clone().into_fields())
                .ok_or_else(|| {
                    ConfigError::unknown_tag(namespace, parent.as_str(), &existing.keys().cloned().collect::<Vec<_>>())
                })?,
            None => BTreeMap::new(),
        };
        let missing: Vec<String> = if record.parent.is_some() {
            Vec::new()
        } else {
            tmpl.keys()
                .filter(|key| !record.fields.contains_key(*key))
                .map(str::to_string)
                .collect()
        };
        if !missing.is_empty() || !extra.is_empty() {
            return Err(ConfigError::TemplateMismatch {
                namespace,
                name,
                missing,
                extra,
            });
        }

        for (key, value) in record.fields {
            let conformed = conform(tmpl, namespace, &key, value)?;
            fields.insert(key, conformed);
        }

        debug!(namespace = %namespace, tag = %name, parent = ?record.parent, "Registered tag");
        existing.insert(name, Tag::from_fields(namespace, fields));
        Ok(self)
    }

    /// Set the tag used when no selector override is given
    pub fn default_tag(mut self, namespace: Namespace, name: impl Into<String>) -> Self {
        self.defaults.insert(namespace, name.into());
        self
    }

    /// Check defaults and cross-namespace references, then freeze
    pub fn build(self) -> ConfigResult<TagRegistry> {
        let registry = TagRegistry {
            tags: self.tags,
            defaults: self.defaults,
        };

        for (namespace, name) in &registry.defaults {
            registry.get(*namespace, name)?;
        }

        for tag in registry.tags.get(&Namespace::Bank).into_iter().flat_map(|t| t.values()) {
            registry.get(Namespace::Map, tag.str("mapTag")?)?;
        }
        for tag in registry.tags.get(&Namespace::Algo).into_iter().flat_map(|t| t.values()) {
            let map_tag = tag.str("mapTag")?;
            if !map_tag.is_empty() {
                registry.get(Namespace::Map, map_tag)?;
            }
            let bank_tag = tag.str("bankTag")?;
            if !bank_tag.is_empty() {
                registry.get(Namespace::Bank, bank_tag)?;
            }
        }

        Ok(registry)
    }
}

fn conform(tmpl: &Template, namespace: Namespace, key: &str, value: TagValue) -> ConfigResult<TagValue> {
    match tmpl.field(key) {
        Some(spec) => spec.kind.conform(&format!("{}.{}", namespace, key), value),
        None => Err(ConfigError::unknown_override_key(
            key,
            &tmpl.keys().map(str::to_string).collect::<Vec<_>>(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn map_record(name: &str) -> TagRecord {
        TagRecord::from_template(Namespace::Map)
            .set("name", name)
            .set("regionNames", vec!["R0", "R1", "R2"])
    }

    #[test]
    fn test_register_and_get() {
        let registry = TagRegistry::builder()
            .register(Namespace::Map, map_record("T1"))
            .unwrap()
            .build()
            .unwrap();
        let tag = registry.get(Namespace::Map, "T1").unwrap();
        assert_eq!(tag.name(), "T1");
        assert_eq!(tag.str_list("regionNames").unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_tag_suggests() {
        let registry = TagRegistry::builder()
            .register(Namespace::Map, map_record("TDRConf-v1"))
            .unwrap()
            .build()
            .unwrap();
        let err = registry.get(Namespace::Map, "TDRConf-v2").unwrap_err();
        assert!(err.to_string().contains("Did you mean 'TDRConf-v1'"));
    }

    #[test]
    fn test_rejects_missing_fields() {
        let record = TagRecord::new().set("name", "partial").set("package", "bank");
        let err = TagRegistry::builder().register(Namespace::Bank, record).unwrap_err();
        match err {
            ConfigError::TemplateMismatch { missing, extra, .. } => {
                assert!(missing.contains(&"bankDir".to_string()));
                assert!(extra.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_extra_fields() {
        let record = map_record("T1").set("colour", "blue");
        let err = TagRegistry::builder().register(Namespace::Map, record).unwrap_err();
        assert!(matches!(err, ConfigError::TemplateMismatch { ref extra, .. } if extra == &vec!["colour".to_string()]));
    }

    #[test]
    fn test_rejects_wrong_kind() {
        let record = map_record("T1").set("withPU", "yes");
        let err = TagRegistry::builder().register(Namespace::Map, record).unwrap_err();
        assert!(matches!(err, ConfigError::TypeMismatch { ref key, .. } if key == "map.withPU"));
    }

    #[test]
    fn test_rejects_duplicates() {
        let err = TagRegistry::builder()
            .register(Namespace::Map, map_record("T1"))
            .unwrap()
            .register(Namespace::Map, map_record("T1"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTag { .. }));
    }

    #[test]
    fn test_inheritance() {
        let registry = TagRegistry::builder()
            .register(Namespace::Algo, TagRecord::from_template(Namespace::Algo).set("name", "base"))
            .unwrap()
            .register(
                Namespace::Algo,
                TagRecord::inherit("base").set("name", "child").set("hough", true),
            )
            .unwrap()
            .build()
            .unwrap();

        let child = registry.get(Namespace::Algo, "child").unwrap();
        assert!(child.bool("hough").unwrap());
        assert_eq!(child.keys().count(), template(Namespace::Algo).keys().count());
        assert!(!registry.get(Namespace::Algo, "base").unwrap().bool("hough").unwrap());
    }

    #[test]
    fn test_child_cannot_add_fields() {
        let err = TagRegistry::builder()
            .register(Namespace::Algo, TagRecord::from_template(Namespace::Algo).set("name", "base"))
            .unwrap()
            .register(Namespace::Algo, TagRecord::inherit("base").set("name", "child").set("houg", true))
            .unwrap_err();
        assert!(matches!(err, ConfigError::TemplateMismatch { .. }));
    }

    #[test]
    fn test_parent_must_exist() {
        let err = TagRegistry::builder()
            .register(Namespace::Algo, TagRecord::inherit("missing").set("name", "child"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTag { .. }));
    }

    #[test]
    fn test_bank_map_reference_checked() {
        let bank = TagRecord::from_template(Namespace::Bank)
            .set("name", "B1")
            .set("mapTag", "nowhere");
        let err = TagRegistry::builder()
            .register(Namespace::Bank, bank)
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTag { namespace: Namespace::Map, .. }));
    }

    #[test]
    fn test_missing_default() {
        let err = TagRegistry::builder()
            .default_tag(Namespace::Map, "T1")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTag { .. }));
    }

    #[test]
    fn test_extend_builtin() {
        let registry = TagRegistry::builtin()
            .extend()
            .register(Namespace::Map, map_record("T1"))
            .unwrap()
            .build()
            .unwrap();
        assert!(registry.contains(Namespace::Map, "T1"));
        assert!(registry.contains(Namespace::Map, "EF_TaskForce_dev22"));
    }
}
