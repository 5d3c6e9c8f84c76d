//! Human-readable descriptions and output file naming

use crate::error::ConfigResult;
use crate::resolver::ResolvedConfig;
use crate::tag::Tag;

/// Multi-line description of the resolved tags and region
pub fn describe(config: &ResolvedConfig) -> ConfigResult<String> {
    let map = config.map();
    let mut lines = vec![format!(
        "map: {} (release {}, geometry {})",
        map.name(),
        map.str("release")?,
        map.str("geoTag")?
    )];
    if let Some(bank) = config.bank() {
        lines.push(format!("bank: {}", bank.name()));
    }
    if let Some(algo) = config.algo() {
        lines.push(format!("algo: {}", algo.name()));
    }
    lines.push(format!("region: {}", config.region()));
    lines.push(format!(
        "sample: {}{}",
        map.str("sampleType")?,
        if map.bool("withPU")? { " with pile-up" } else { "" }
    ));
    Ok(lines.join("\n"))
}

/// Filesystem-safe stem: `map__bank__algo__regN`
pub fn describe_filename(config: &ResolvedConfig) -> String {
    let mut parts: Vec<String> = [Some(config.map()), config.bank(), config.algo()]
        .into_iter()
        .flatten()
        .map(Tag::name)
        .map(sanitize)
        .collect();
    parts.push(format!("reg{}", config.region().index));
    parts.join("__")
}

/// Default monitoring histogram file: `loghits__{release}-{geoTag}__{stem}.root`
pub fn default_histogram_filename(config: &ResolvedConfig) -> ConfigResult<String> {
    let map = config.map();
    Ok(format!(
        "loghits__{}-{}__{}.root",
        sanitize(map.str("release")?),
        sanitize(map.str("geoTag")?),
        describe_filename(config)
    ))
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::Stage;
    use crate::overrides::OverrideSet;
    use crate::resolver::TagResolver;
    use pretty_assertions::assert_eq;

    fn hough() -> ResolvedConfig {
        TagResolver::builtin()
            .resolve(Stage::Algo, &OverrideSet::new().set("algoTag", "hough").set("region", "2"))
            .unwrap()
    }

    #[test]
    fn test_filename_stem() {
        assert_eq!(
            describe_filename(&hough()),
            "EF_TaskForce_dev22__EF_TaskForce_dev22__hough__reg2"
        );
    }

    #[test]
    fn test_map_only_stem() {
        let config = TagResolver::builtin()
            .resolve(Stage::Map, &OverrideSet::new().set("mapTag", "TDRConf-v1"))
            .unwrap();
        assert_eq!(describe_filename(&config), "TDRConf-v1__reg0");
    }

    #[test]
    fn test_histogram_filename() {
        assert_eq!(
            default_histogram_filename(&hough()).unwrap(),
            "loghits__21.9.16-ATLAS-P2-ITK-22-02-00__EF_TaskForce_dev22__EF_TaskForce_dev22__hough__reg2.root"
        );
    }

    #[test]
    fn test_describe() {
        let text = describe(&hough()).unwrap();
        assert!(text.contains("algo: hough"));
        assert!(text.contains("region: 2 (eta1214phi0305)"));
        assert!(text.contains("sample: singleMuons"));
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("a/b c"), "a_b_c");
        assert_eq!(sanitize("21.9.2"), "21.9.2");
    }
}
