// tests/matching_index.rs

//! Match index boundary behaviors: longest-prefix binding, cross-namespace
//! isolation, exact-over-prefix priority and the generator-side query.

mod common;

use std::sync::Arc;

use ripple::deps::{CustomTarget, MatchStrategy, Target};
use ripple::errors::Result;
use ripple::matching::trie::SegmentTrie;
use ripple::matching::{GeneratorIndex, MatchIndex};

/// Target with an arbitrary key, for index tests that don't touch disk.
struct KeyTarget {
    key: String,
    strategy: MatchStrategy,
}

impl KeyTarget {
    fn exact(key: &str) -> Target {
        Target::Custom(Arc::new(Self {
            key: key.to_string(),
            strategy: MatchStrategy::Exact,
        }))
    }

    fn prefix(key: &str) -> Target {
        Target::Custom(Arc::new(Self {
            key: key.to_string(),
            strategy: MatchStrategy::Prefix,
        }))
    }

    fn custom(key: &str) -> Target {
        Target::Custom(Arc::new(Self {
            key: key.to_string(),
            strategy: MatchStrategy::Custom,
        }))
    }
}

impl CustomTarget for KeyTarget {
    fn key(&self) -> String {
        self.key.clone()
    }

    fn exists(&self) -> Result<bool> {
        Ok(true)
    }

    fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    fn matches(&self, dep_key: &str) -> bool {
        // Suffix matching, something neither exact nor prefix can express.
        dep_key.ends_with(&self.key)
    }
}

#[test]
fn longest_prefix_wins() {
    common::init_tracing();
    let mut index = MatchIndex::new();
    index
        .register_target(&KeyTarget::prefix("/out/"), "root")
        .unwrap();
    index
        .register_target(&KeyTarget::prefix("/out/sub/"), "sub")
        .unwrap();

    assert_eq!(index.find_producer("/out/sub/x.txt"), Some("sub"));
    assert_eq!(index.find_producer("/out/x.txt"), Some("root"));
    assert_eq!(index.find_producer("/elsewhere/x.txt"), None);
}

#[test]
fn cross_bucket_prefixes_never_match() {
    let mut index = MatchIndex::new();
    index
        .register_target(&KeyTarget::prefix("s3://a/data/"), "bucket-a")
        .unwrap();

    assert_eq!(index.find_producer("s3://a/data/x"), Some("bucket-a"));
    assert_eq!(index.find_producer("s3://b/data/x"), None);
    assert_eq!(index.find_producer("gs://a/data/x"), None);
}

#[test]
fn exact_beats_covering_prefix() {
    let mut index = MatchIndex::new();
    index
        .register_target(&KeyTarget::prefix("/out/sub/"), "prefix-owner")
        .unwrap();
    index
        .register_target(&KeyTarget::exact("/out/sub/x.txt"), "exact-owner")
        .unwrap();

    assert_eq!(index.find_producer("/out/sub/x.txt"), Some("exact-owner"));
    // Keys without an exact producer still bind to the prefix owner.
    assert_eq!(index.find_producer("/out/sub/y.txt"), Some("prefix-owner"));

    let all = index.find_all_producers("/out/sub/x.txt");
    assert_eq!(all, vec!["exact-owner", "prefix-owner"]);
}

#[test]
fn custom_targets_scan_in_declaration_order() {
    let mut index = MatchIndex::new();
    index
        .register_target(&KeyTarget::custom(".log"), "first")
        .unwrap();
    index
        .register_target(&KeyTarget::custom("x.log"), "second")
        .unwrap();

    // Both match; declaration order decides.
    assert_eq!(index.find_producer("/var/x.log"), Some("first"));
}

#[test]
fn duplicate_exact_target_is_rejected() {
    let mut index = MatchIndex::new();
    index
        .register_target(&KeyTarget::exact("/out/a"), "one")
        .unwrap();

    // Same owner re-registering is fine (regeneration).
    index
        .register_target(&KeyTarget::exact("/out/a"), "one")
        .unwrap();

    let err = index
        .register_target(&KeyTarget::exact("/out/a"), "two")
        .unwrap_err();
    assert!(err.to_string().contains("Conflicting target"));
}

#[test]
fn generator_index_matches_both_directions() {
    let mut gens = GeneratorIndex::new();
    gens.register_pattern("/work/extracted/", MatchStrategy::Prefix, "stage2");
    gens.register_pattern("/work/input.zip", MatchStrategy::Exact, "stage1");

    // A key published under the pattern.
    assert_eq!(
        gens.affected("/work/extracted/a.txt"),
        vec!["stage2".to_string()]
    );
    // A published directory prefix that contains the pattern.
    assert_eq!(gens.affected("/work/"), vec!["stage2".to_string()]);
    // Exact pattern.
    assert_eq!(gens.affected("/work/input.zip"), vec!["stage1".to_string()]);
    // Unrelated key.
    assert!(gens.affected("/other/file").is_empty());
}

#[test]
fn trie_longest_and_all() {
    let mut trie: SegmentTrie<&str> = SegmentTrie::new();
    trie.insert("/a/", "short");
    trie.insert("/a/b/c/", "long");

    assert_eq!(trie.find_longest("/a/b/c/d.txt"), Some(&"long"));
    assert_eq!(trie.find_longest("/a/x.txt"), Some(&"short"));
    assert_eq!(trie.find_longest("/z/x.txt"), None);
    assert_eq!(trie.find_all("/a/b/c/d.txt"), vec![&"short", &"long"]);
    assert!(trie.contains("/a/"));
    assert!(!trie.contains("/a/b/"));
}
