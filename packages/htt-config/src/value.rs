//! Tag values, value kinds and override coercion

use crate::error::{ConfigError, ConfigResult};
use crate::overrides::OverrideValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single tag field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<TagValue>),
}

impl TagValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TagValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// True for `""` and `[]`; scalars of other kinds are never empty
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Str(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Short kind label used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Str(s) => write!(f, "{}", s),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for TagValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl<T: Into<TagValue>> From<Vec<T>> for TagValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// Declared type of a template field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Str,
    List(Box<ValueKind>),
}

impl ValueKind {
    pub fn list_of(inner: ValueKind) -> Self {
        Self::List(Box::new(inner))
    }

    /// Coerce raw override input into a value of this kind.
    ///
    /// Scalar input for a list kind is split on commas; for a list of lists
    /// the groups are split on `;` first.
    pub fn coerce(&self, key: &str, raw: &OverrideValue) -> ConfigResult<TagValue> {
        match (self, raw) {
            (Self::List(inner), OverrideValue::Scalar(text)) => {
                let separator = if matches!(**inner, Self::List(_)) { ';' } else { ',' };
                split_items(text, separator)
                    .map(|item| inner.coerce_scalar(key, item))
                    .collect::<ConfigResult<Vec<_>>>()
                    .map(TagValue::List)
            }
            (Self::List(inner), OverrideValue::List(items)) => items
                .iter()
                .map(|item| inner.coerce_scalar(key, item))
                .collect::<ConfigResult<Vec<_>>>()
                .map(TagValue::List),
            (_, OverrideValue::Scalar(text)) => self.coerce_scalar(key, text),
            (_, OverrideValue::List(items)) => {
                Err(ConfigError::type_mismatch(key, self, format!("[{}]", items.join(", "))))
            }
        }
    }

    fn coerce_scalar(&self, key: &str, text: &str) -> ConfigResult<TagValue> {
        let trimmed = text.trim();
        match self {
            Self::Bool => parse_bool(trimmed)
                .map(TagValue::Bool)
                .ok_or_else(|| ConfigError::type_mismatch(key, self, text)),
            Self::Int => trimmed
                .parse::<i64>()
                .map(TagValue::Int)
                .map_err(|_| ConfigError::type_mismatch(key, self, text)),
            Self::Float => trimmed
                .parse::<f64>()
                .map(TagValue::Float)
                .map_err(|_| ConfigError::type_mismatch(key, self, text)),
            Self::Str => Ok(TagValue::Str(text.to_string())),
            Self::List(inner) => split_items(text, ',')
                .map(|item| inner.coerce_scalar(key, item))
                .collect::<ConfigResult<Vec<_>>>()
                .map(TagValue::List),
        }
    }

    /// Check a literal value against this kind, widening ints to floats
    pub fn conform(&self, key: &str, value: TagValue) -> ConfigResult<TagValue> {
        match (self, value) {
            (Self::Bool, v @ TagValue::Bool(_)) => Ok(v),
            (Self::Int, v @ TagValue::Int(_)) => Ok(v),
            (Self::Float, v @ TagValue::Float(_)) => Ok(v),
            (Self::Float, TagValue::Int(i)) => Ok(TagValue::Float(i as f64)),
            (Self::Str, v @ TagValue::Str(_)) => Ok(v),
            (Self::List(inner), TagValue::List(items)) => items
                .into_iter()
                .map(|item| inner.conform(key, item))
                .collect::<ConfigResult<Vec<_>>>()
                .map(TagValue::List),
            (kind, other) => Err(ConfigError::type_mismatch(key, kind, other.to_string())),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Str => write!(f, "string"),
            Self::List(inner) => write!(f, "list<{}>", inner),
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_items(text: &str, separator: char) -> impl Iterator<Item = &str> {
    text.split(separator)
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scalar(text: &str) -> OverrideValue {
        OverrideValue::Scalar(text.to_string())
    }

    #[test]
    fn test_bool_spellings() {
        for text in ["true", "TRUE", "1", "yes", "on"] {
            assert_eq!(ValueKind::Bool.coerce("hough", &scalar(text)).unwrap(), TagValue::Bool(true));
        }
        for text in ["false", "0", "No", "off"] {
            assert_eq!(ValueKind::Bool.coerce("hough", &scalar(text)).unwrap(), TagValue::Bool(false));
        }
    }

    #[test]
    fn test_bool_rejects_garbage() {
        let err = ValueKind::Bool.coerce("hough", &scalar("maybe")).unwrap_err();
        assert!(matches!(err, ConfigError::TypeMismatch { ref key, .. } if key == "hough"));
    }

    #[test]
    fn test_comma_separated_list() {
        let kind = ValueKind::list_of(ValueKind::Int);
        assert_eq!(
            kind.coerce("threshold", &scalar("5, 6")).unwrap(),
            TagValue::List(vec![TagValue::Int(5), TagValue::Int(6)])
        );
        assert_eq!(kind.coerce("threshold", &scalar("")).unwrap(), TagValue::List(vec![]));
    }

    #[test]
    fn test_explicit_list() {
        let kind = ValueKind::list_of(ValueKind::Float);
        let raw = OverrideValue::List(vec!["0.1".to_string(), "2".to_string()]);
        assert_eq!(
            kind.coerce("PhiRoadFilter", &raw).unwrap(),
            TagValue::List(vec![TagValue::Float(0.1), TagValue::Float(2.0)])
        );
    }

    #[test]
    fn test_nested_list_groups() {
        let kind = ValueKind::list_of(ValueKind::list_of(ValueKind::Int));
        let expected = TagValue::List(vec![
            TagValue::List(vec![TagValue::Int(0), TagValue::Int(1)]),
            TagValue::List(vec![TagValue::Int(2)]),
        ]);
        assert_eq!(kind.coerce("combine_layers", &scalar("0,1;2")).unwrap(), expected);

        let raw = OverrideValue::List(vec!["0,1".to_string(), "2".to_string()]);
        assert_eq!(kind.coerce("combine_layers", &raw).unwrap(), expected);
    }

    #[test]
    fn test_list_input_for_scalar_kind_fails() {
        let raw = OverrideValue::List(vec!["1".to_string()]);
        assert!(ValueKind::Int.coerce("seed", &raw).is_err());
    }

    #[test]
    fn test_conform_widens_int_to_float() {
        assert_eq!(
            ValueKind::Float.conform("d0alpha", TagValue::Int(0)).unwrap(),
            TagValue::Float(0.0)
        );
        assert!(ValueKind::Int.conform("seed", TagValue::Float(1.5)).is_err());
        assert!(ValueKind::Str.conform("name", TagValue::Bool(true)).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(TagValue::from(vec![5, 6]).to_string(), "[5, 6]");
        assert_eq!(ValueKind::list_of(ValueKind::Int).to_string(), "list<int>");
    }
}
