//! Path template expansion
//!
//! Path fields are stored relative to their namespace directory field and,
//! for formatted tags, contain `{token}` placeholders such as
//! `{regionName}`. Expansion prefixes the directory, substitutes the
//! placeholders and clears the directory field, so expanding an already
//! expanded tag changes nothing.

use crate::error::{ConfigError, ConfigResult};
use crate::resolver::ResolvedConfig;
use crate::schema::template;
use crate::tag::Tag;
use crate::value::TagValue;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use tracing::debug;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]*)\}").expect("placeholder pattern is valid"));

/// Flat string → string substitution context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    values: BTreeMap<String, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Expands path fields of resolved tags
pub struct PathTemplateExpander;

impl PathTemplateExpander {
    /// Expand every path field of `tag`, returning a new tag
    pub fn expand(tag: &Tag, context: &TemplateContext) -> ConfigResult<Tag> {
        let tmpl = template(tag.namespace());
        let Some(dir_field) = tmpl.dir_field() else {
            return Ok(tag.clone());
        };

        let dir = tag.str(dir_field)?.to_string();
        let formatted = tag.get("formatted").and_then(TagValue::as_bool).unwrap_or(false);
        let namespace = tag.namespace();
        let mut fields = tag.clone().into_fields();

        for spec in tmpl.path_fields() {
            let Some(value) = fields.get(spec.key) else {
                continue;
            };
            let field = format!("{}.{}", namespace, spec.key);
            let expanded = match value {
                TagValue::Str(path) => TagValue::Str(expand_path(&field, &dir, path, formatted, context)?),
                TagValue::List(items) => TagValue::List(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| {
                            let element = format!("{}[{}]", field, i);
                            let path = item
                                .as_str()
                                .ok_or_else(|| ConfigError::type_mismatch(&element, "string", item.to_string()))?;
                            expand_path(&element, &dir, path, formatted, context).map(TagValue::Str)
                        })
                        .collect::<ConfigResult<Vec<_>>>()?,
                ),
                other => return Err(ConfigError::type_mismatch(field, "path", other.to_string())),
            };
            fields.insert(spec.key.to_string(), expanded);
        }

        fields.insert(dir_field.to_string(), TagValue::Str(String::new()));
        debug!(namespace = %namespace, tag = %tag.name(), formatted, "Expanded path fields");
        Ok(Tag::from_fields(namespace, fields))
    }

    /// Expand every tag of a resolved config with its region context
    pub fn expand_config(config: &ResolvedConfig) -> ConfigResult<ResolvedConfig> {
        let context = config.region().context();
        let expand = |tag: Option<&Tag>| tag.map(|t| Self::expand(t, &context)).transpose();

        Ok(config.with_tags(
            Self::expand(config.map(), &context)?,
            expand(config.bank())?,
            expand(config.algo())?,
        ))
    }
}

/// Empty filenames stay empty so missing files remain visible
fn expand_path(
    field: &str,
    dir: &str,
    path: &str,
    formatted: bool,
    context: &TemplateContext,
) -> ConfigResult<String> {
    if path.is_empty() {
        return Ok(String::new());
    }
    let joined = format!("{}{}", dir, path);
    if formatted {
        substitute(field, &joined, context)
    } else {
        Ok(joined)
    }
}

fn substitute(field: &str, text: &str, context: &TemplateContext) -> ConfigResult<String> {
    if let Some(missing) = PLACEHOLDER
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .find(|token| context.get(token).is_none())
    {
        return Err(ConfigError::MissingTemplateContext {
            field: field.to_string(),
            token: missing,
        });
    }

    Ok(PLACEHOLDER
        .replace_all(text, |caps: &Captures| context.get(&caps[1]).unwrap_or_default().to_string())
        .into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Namespace;
    use pretty_assertions::assert_eq;

    fn bank(formatted: bool, dir: &str) -> Tag {
        template(Namespace::Bank)
            .defaults()
            .with("name", "B1".into())
            .with("bankDir", dir.into())
            .with("formatted", formatted.into())
            .with("constants_1st", "SectorBanks/corrgen_raw_8L.gcon".into())
            .with("patternBank", "ccache_reg{region}.root".into())
            .with(
                "constantsNoGuess_1st",
                vec!["skipPlane0.gcon", "skipPlane1.gcon"].into(),
            )
    }

    fn context() -> TemplateContext {
        TemplateContext::new()
            .with("region", "2")
            .with("regionName", "barrelA")
    }

    #[test]
    fn test_formatted_substitution() {
        let tag = bank(true, "/eos/htt/{regionName}/");
        let out = PathTemplateExpander::expand(&tag, &context()).unwrap();

        assert_eq!(
            out.str("constants_1st").unwrap(),
            "/eos/htt/barrelA/SectorBanks/corrgen_raw_8L.gcon"
        );
        assert_eq!(out.str("patternBank").unwrap(), "/eos/htt/barrelA/ccache_reg2.root");
        assert_eq!(
            out.str_list("constantsNoGuess_1st").unwrap(),
            vec![
                "/eos/htt/barrelA/skipPlane0.gcon".to_string(),
                "/eos/htt/barrelA/skipPlane1.gcon".to_string(),
            ]
        );
        assert_eq!(out.str("bankDir").unwrap(), "");
    }

    #[test]
    fn test_unformatted_is_prefixed_only() {
        let tag = bank(false, "/eos/htt/{regionName}/");
        let out = PathTemplateExpander::expand(&tag, &context()).unwrap();
        assert_eq!(out.str("patternBank").unwrap(), "/eos/htt/{regionName}/ccache_reg{region}.root");
    }

    #[test]
    fn test_non_path_fields_untouched() {
        let tag = bank(true, "/eos/htt/{regionName}/").with("rndStreamName", "{regionName}".into());
        let out = PathTemplateExpander::expand(&tag, &context()).unwrap();
        assert_eq!(out.str("rndStreamName").unwrap(), "{regionName}");
    }

    #[test]
    fn test_empty_path_stays_empty() {
        let tag = bank(true, "/eos/htt/{regionName}/");
        let out = PathTemplateExpander::expand(&tag, &context()).unwrap();
        assert_eq!(out.str("sectorBank_2nd").unwrap(), "");
    }

    #[test]
    fn test_missing_token() {
        let tag = bank(true, "/eos/{campaign}/");
        let err = PathTemplateExpander::expand(&tag, &context()).unwrap_err();
        match err {
            ConfigError::MissingTemplateContext { field, token } => {
                assert_eq!(token, "campaign");
                assert!(field.starts_with("bank."));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_second_pass_is_noop() {
        let tag = bank(true, "/eos/htt/{regionName}/");
        let once = PathTemplateExpander::expand(&tag, &context()).unwrap();
        let twice = PathTemplateExpander::expand(&once, &context()).unwrap();
        assert_eq!(once, twice);
    }
}
