//! Concurrent resolution against the shared read-only registry

use htt_config::*;
use pretty_assertions::assert_eq;
use std::thread;

#[test]
fn concurrent_resolution_matches_sequential() {
    let overrides = OverrideSet::new().set("algoTag", "hough").set("secondStage", true);
    let expected = TagResolver::builtin().resolve(Stage::Algo, &overrides).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let overrides = overrides.clone();
            thread::spawn(move || TagResolver::builtin().resolve(Stage::Algo, &overrides).unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn batch_regions_match_individual_requests() {
    let resolver = TagResolver::builtin();
    let overrides = OverrideSet::new().set("algoTag", "hough_1d");
    let regions: Vec<String> = TagRegistry::builtin()
        .get(Namespace::Map, "EF_TaskForce_dev22")
        .unwrap()
        .str_list("regionNames")
        .unwrap();

    let batch = resolver.resolve_regions(Stage::Algo, &overrides, &regions);
    assert_eq!(batch.len(), regions.len());

    for (index, (region, result)) in regions.iter().zip(batch).enumerate() {
        let single = resolver
            .resolve(Stage::Algo, &overrides.clone().set("region", region.as_str()))
            .unwrap();
        let batched = result.unwrap();
        assert_eq!(batched.region().index, index);
        assert_eq!(batched, single);
    }
}
