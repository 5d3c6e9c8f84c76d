//! Tag records

use crate::error::{ConfigError, ConfigResult};
use crate::namespace::Namespace;
use crate::value::TagValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named, flat parameter record in one namespace.
///
/// Tags are never mutated in place: [`Tag::with`] returns a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    namespace: Namespace,
    fields: BTreeMap<String, TagValue>,
}

impl Tag {
    pub fn from_fields(namespace: Namespace, fields: BTreeMap<String, TagValue>) -> Self {
        Self { namespace, fields }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Tag name (the `name` field)
    pub fn name(&self) -> &str {
        self.get("name").and_then(TagValue::as_str).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn fields(&self) -> &BTreeMap<String, TagValue> {
        &self.fields
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Copy of this tag with one field replaced
    pub fn with(&self, key: impl Into<String>, value: TagValue) -> Self {
        let mut fields = self.fields.clone();
        fields.insert(key.into(), value);
        Self {
            namespace: self.namespace,
            fields,
        }
    }

    pub(crate) fn into_fields(self) -> BTreeMap<String, TagValue> {
        self.fields
    }

    fn require(&self, key: &str) -> ConfigResult<&TagValue> {
        self.get(key).ok_or_else(|| ConfigError::MissingField {
            namespace: self.namespace,
            key: key.to_string(),
        })
    }

    fn mismatch(&self, key: &str, expected: &str, value: &TagValue) -> ConfigError {
        ConfigError::type_mismatch(format!("{}.{}", self.namespace, key), expected, value.to_string())
    }

    pub fn bool(&self, key: &str) -> ConfigResult<bool> {
        let value = self.require(key)?;
        value.as_bool().ok_or_else(|| self.mismatch(key, "bool", value))
    }

    pub fn int(&self, key: &str) -> ConfigResult<i64> {
        let value = self.require(key)?;
        value.as_int().ok_or_else(|| self.mismatch(key, "int", value))
    }

    pub fn float(&self, key: &str) -> ConfigResult<f64> {
        let value = self.require(key)?;
        value.as_float().ok_or_else(|| self.mismatch(key, "float", value))
    }

    pub fn str(&self, key: &str) -> ConfigResult<&str> {
        let value = self.require(key)?;
        value.as_str().ok_or_else(|| self.mismatch(key, "string", value))
    }

    pub fn str_list(&self, key: &str) -> ConfigResult<Vec<String>> {
        self.list_with(key, "list<string>", |v| v.as_str().map(str::to_string))
    }

    pub fn int_list(&self, key: &str) -> ConfigResult<Vec<i64>> {
        self.list_with(key, "list<int>", TagValue::as_int)
    }

    pub fn float_list(&self, key: &str) -> ConfigResult<Vec<f64>> {
        self.list_with(key, "list<float>", TagValue::as_float)
    }

    pub fn bool_list(&self, key: &str) -> ConfigResult<Vec<bool>> {
        self.list_with(key, "list<bool>", TagValue::as_bool)
    }

    pub fn nested_int_list(&self, key: &str) -> ConfigResult<Vec<Vec<i64>>> {
        let value = self.require(key)?;
        let groups = value
            .as_list()
            .ok_or_else(|| self.mismatch(key, "list<list<int>>", value))?;
        groups
            .iter()
            .map(|group| {
                group
                    .as_list()
                    .and_then(|items| items.iter().map(TagValue::as_int).collect::<Option<Vec<_>>>())
                    .ok_or_else(|| self.mismatch(key, "list<list<int>>", value))
            })
            .collect()
    }

    fn list_with<T>(
        &self,
        key: &str,
        expected: &str,
        convert: impl Fn(&TagValue) -> Option<T>,
    ) -> ConfigResult<Vec<T>> {
        let value = self.require(key)?;
        value
            .as_list()
            .and_then(|items| items.iter().map(&convert).collect::<Option<Vec<_>>>())
            .ok_or_else(|| self.mismatch(key, expected, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Tag {
        let fields = [
            ("name", TagValue::from("hough")),
            ("hough", TagValue::from(true)),
            ("threshold", TagValue::from(vec![5, 6])),
            ("phi_min", TagValue::from(0.3)),
            ("xBins", TagValue::from(216)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Tag::from_fields(Namespace::Algo, fields)
    }

    #[test]
    fn test_typed_getters() {
        let tag = sample();
        assert_eq!(tag.name(), "hough");
        assert!(tag.bool("hough").unwrap());
        assert_eq!(tag.int_list("threshold").unwrap(), vec![5, 6]);
        assert_eq!(tag.float("phi_min").unwrap(), 0.3);
        assert_eq!(tag.float("xBins").unwrap(), 216.0);
    }

    #[test]
    fn test_missing_field() {
        let err = sample().bool("lrt").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { namespace: Namespace::Algo, ref key } if key == "lrt"));
    }

    #[test]
    fn test_wrong_kind() {
        let err = sample().bool("threshold").unwrap_err();
        assert!(err.to_string().contains("algo.threshold"));
    }

    #[test]
    fn test_with_leaves_original_untouched() {
        let tag = sample();
        let changed = tag.with("hough", TagValue::Bool(false));
        assert!(tag.bool("hough").unwrap());
        assert!(!changed.bool("hough").unwrap());
    }
}
