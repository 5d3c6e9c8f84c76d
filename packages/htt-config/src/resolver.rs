//! Tag resolution
//!
//! Single entry point that turns `(stage, overrides)` into a complete,
//! cross-consistent [`ResolvedConfig`]:
//!
//! 1. pick a tag name per namespace (selector override, else the name the
//!    dependent tag references, else the registry default)
//! 2. look the tags up
//! 3. apply overrides with type coercion (flat keys first, then
//!    namespace-qualified keys)
//! 4. check that the map/bank/algo references agree
//! 5. resolve the region against `regionNames`
//! 6. check the LRT exclusive groups

use crate::error::{ConfigError, ConfigResult};
use crate::features::FeatureGroup;
use crate::namespace::{Namespace, Stage};
use crate::overrides::{OverrideKey, OverrideSet, OverrideValue};
use crate::provenance::{ConfigProvenance, ConfigSource};
use crate::region::RegionSelection;
use crate::registry::TagRegistry;
use crate::schema::{all_keys, template};
use crate::tag::Tag;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Keys that identify a tag and cannot be overridden
const RESERVED_KEYS: &[&str] = &["name", "package"];

/// Resolved tag triple for one stage request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    stage: Stage,
    map: Tag,
    bank: Option<Tag>,
    algo: Option<Tag>,
    region: RegionSelection,
    #[serde(default)]
    provenance: ConfigProvenance,
}

impl ResolvedConfig {
    /// Assemble from already-resolved tags; the region is resolved from the map tag
    pub fn from_parts(stage: Stage, map: Tag, bank: Option<Tag>, algo: Option<Tag>) -> ConfigResult<Self> {
        let region = RegionSelection::resolve(map.str("region")?, &map.str_list("regionNames")?)?;
        Ok(Self {
            stage,
            map,
            bank,
            algo,
            region,
            provenance: ConfigProvenance::new(),
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn map(&self) -> &Tag {
        &self.map
    }

    pub fn bank(&self) -> Option<&Tag> {
        self.bank.as_ref()
    }

    pub fn algo(&self) -> Option<&Tag> {
        self.algo.as_ref()
    }

    pub fn tag(&self, namespace: Namespace) -> Option<&Tag> {
        match namespace {
            Namespace::Map => Some(&self.map),
            Namespace::Bank => self.bank.as_ref(),
            Namespace::Algo => self.algo.as_ref(),
        }
    }

    pub fn region(&self) -> &RegionSelection {
        &self.region
    }

    pub fn provenance(&self) -> &ConfigProvenance {
        &self.provenance
    }

    /// Same request with replacement tags (used by expansion)
    pub fn with_tags(&self, map: Tag, bank: Option<Tag>, algo: Option<Tag>) -> Self {
        Self {
            stage: self.stage,
            map,
            bank,
            algo,
            region: self.region.clone(),
            provenance: self.provenance.clone(),
        }
    }

    /// Export to YAML for the execution host
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// JSON form handed to the execution host alongside the pipeline graph
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Resolves stage requests against a registry
#[derive(Debug, Clone, Copy)]
pub struct TagResolver<'r> {
    registry: &'r TagRegistry,
}

impl TagResolver<'static> {
    /// Resolver over the built-in catalog
    pub fn builtin() -> Self {
        Self::new(TagRegistry::builtin())
    }
}

impl<'r> TagResolver<'r> {
    pub fn new(registry: &'r TagRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &'r TagRegistry {
        self.registry
    }

    pub fn resolve(&self, stage: Stage, overrides: &OverrideSet) -> ConfigResult<ResolvedConfig> {
        info!(stage = %stage, overrides = overrides.len(), "Resolving tags");
        let keys = self.classify(stage, overrides)?;
        let mut provenance = ConfigProvenance::new();

        // Names and lookups
        let algo = if stage.includes(Namespace::Algo) {
            let name = self.select(Namespace::Algo, overrides, None)?;
            Some(self.registry.get(Namespace::Algo, &name)?.clone())
        } else {
            None
        };
        let bank = if stage.includes(Namespace::Bank) {
            let referenced = algo.as_ref().map(|t| t.str("bankTag")).transpose()?;
            let name = self.select(Namespace::Bank, overrides, referenced)?;
            Some(self.registry.get(Namespace::Bank, &name)?.clone())
        } else {
            None
        };
        let referenced = bank.as_ref().map(|t| t.str("mapTag")).transpose()?;
        let map_name = self.select(Namespace::Map, overrides, referenced)?;
        let map = self.registry.get(Namespace::Map, &map_name)?.clone();

        for tag in [Some(&map), bank.as_ref(), algo.as_ref()].into_iter().flatten() {
            provenance.track_base(tag.namespace(), tag.name());
        }

        // Overrides
        let map = apply_overrides(map, &keys, &mut provenance)?;
        let bank = bank.map(|t| apply_overrides(t, &keys, &mut provenance)).transpose()?;
        let algo = algo.map(|t| apply_overrides(t, &keys, &mut provenance)).transpose()?;

        check_references(&map, bank.as_ref(), algo.as_ref())?;

        let region = RegionSelection::resolve(map.str("region")?, &map.str_list("regionNames")?)?;
        debug!(region = %region, "Resolved region");

        if let Some(algo) = &algo {
            for group in [FeatureGroup::LrtHitFilter, FeatureGroup::LrtRoadFinder] {
                if let Some(violation) = group.check(algo)? {
                    return Err(violation.into());
                }
            }
        }

        let config = ResolvedConfig {
            stage,
            map,
            bank,
            algo,
            region,
            provenance,
        };
        info!(
            map = %config.map.name(),
            bank = %config.bank().map(Tag::name).unwrap_or("-"),
            algo = %config.algo().map(Tag::name).unwrap_or("-"),
            region = config.region.index,
            "Resolved tags"
        );
        Ok(config)
    }

    /// Resolve the same request for several regions in parallel.
    ///
    /// Results keep the order of `regions`.
    pub fn resolve_regions(
        &self,
        stage: Stage,
        overrides: &OverrideSet,
        regions: &[String],
    ) -> Vec<ConfigResult<ResolvedConfig>> {
        regions
            .par_iter()
            .map(|region| {
                let request = overrides.clone().set("region", region.as_str());
                self.resolve(stage, &request)
            })
            .collect()
    }

    fn select(
        &self,
        namespace: Namespace,
        overrides: &OverrideSet,
        referenced: Option<&str>,
    ) -> ConfigResult<String> {
        if let Some(value) = overrides.get(namespace.selector_key()) {
            return value
                .as_scalar()
                .map(|s| s.trim().to_string())
                .ok_or_else(|| ConfigError::type_mismatch(namespace.selector_key(), "tag name", format!("{:?}", value)));
        }
        match referenced {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => Ok(self.registry.default_name(namespace)?.to_string()),
        }
    }

    /// Validate every override key and keep the ones this stage uses
    fn classify(&self, stage: Stage, overrides: &OverrideSet) -> ConfigResult<Vec<ClassifiedOverride>> {
        let mut classified = Vec::new();
        for (raw_key, value, source) in overrides.iter() {
            let key = OverrideKey::parse(raw_key)?;
            if RESERVED_KEYS.contains(&key.field.as_str()) {
                return Err(ConfigError::ReservedKey(raw_key.to_string()));
            }

            let owners: Vec<Namespace> = match key.namespace {
                Some(ns) => {
                    if !template(ns).contains(&key.field) {
                        let known: Vec<String> = template(ns)
                            .keys()
                            .map(|k| format!("{}.{}", ns, k))
                            .collect();
                        return Err(ConfigError::unknown_override_key(raw_key, &known));
                    }
                    vec![ns]
                }
                None => {
                    let owners: Vec<Namespace> = Namespace::ALL
                        .into_iter()
                        .filter(|ns| template(*ns).contains(&key.field))
                        .collect();
                    if owners.is_empty() && key.field != Namespace::Algo.selector_key() {
                        let mut known = all_keys();
                        known.push(Namespace::Algo.selector_key().to_string());
                        return Err(ConfigError::unknown_override_key(raw_key, &known));
                    }
                    owners
                }
            };

            let (used, ignored): (Vec<Namespace>, Vec<Namespace>) =
                owners.into_iter().partition(|ns| stage.includes(*ns));
            if used.is_empty() && !ignored.is_empty() {
                debug!(key = %raw_key, stage = %stage, "Override targets no resolved namespace, ignoring");
            }
            for namespace in used {
                classified.push(ClassifiedOverride {
                    namespace,
                    qualified: key.namespace.is_some(),
                    field: key.field.clone(),
                    value: value.clone(),
                    source: source.clone(),
                });
            }
        }
        // Flat keys first so namespace-qualified keys win
        classified.sort_by_key(|o| o.qualified);
        Ok(classified)
    }
}

#[derive(Debug, Clone)]
struct ClassifiedOverride {
    namespace: Namespace,
    qualified: bool,
    field: String,
    value: OverrideValue,
    source: ConfigSource,
}

fn apply_overrides(
    tag: Tag,
    overrides: &[ClassifiedOverride],
    provenance: &mut ConfigProvenance,
) -> ConfigResult<Tag> {
    let namespace = tag.namespace();
    let tmpl = template(namespace);
    let mut tag = tag;
    for o in overrides.iter().filter(|o| o.namespace == namespace) {
        let Some(spec) = tmpl.field(&o.field) else {
            continue;
        };
        let path = format!("{}.{}", namespace, o.field);
        let value = spec.kind.coerce(&path, &o.value)?;
        debug!(field = %path, value = %value, source = %o.source.describe(), "Applied override");
        tag = tag.with(o.field.clone(), value);
        provenance.track_field(&path, o.source.clone());
    }
    Ok(tag)
}

/// Every path from algo to map must reach the same tags
fn check_references(map: &Tag, bank: Option<&Tag>, algo: Option<&Tag>) -> ConfigResult<()> {
    let map_name = map.name();
    if let Some(bank) = bank {
        let referenced = bank.str("mapTag")?;
        if referenced != map_name {
            return Err(ConfigError::inconsistent(
                "map tag reference",
                vec![format!("map={}", map_name), format!("bank.mapTag={}", referenced)],
            ));
        }
    }
    if let Some(algo) = algo {
        let referenced = algo.str("mapTag")?;
        if !referenced.is_empty() && referenced != map_name {
            return Err(ConfigError::inconsistent(
                "map tag reference",
                vec![format!("map={}", map_name), format!("algo.mapTag={}", referenced)],
            ));
        }
        let bank_name = bank.map(Tag::name).unwrap_or_default();
        let referenced = algo.str("bankTag")?;
        if !referenced.is_empty() && referenced != bank_name {
            return Err(ConfigError::inconsistent(
                "bank tag reference",
                vec![format!("bank={}", bank_name), format!("algo.bankTag={}", referenced)],
            ));
        }
    }
    Ok(())
}
