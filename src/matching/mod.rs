// src/matching/mod.rs

//! Producer/consumer match index.
//!
//! Targets register here at admission; dependency keys resolve to their
//! producing task with exact > longest-prefix > custom priority. The same
//! priority drives the symmetric generator-side index that answers "which
//! generators care about this published key".
//!
//! Both indexes are append-only for the lifetime of a session.

pub mod trie;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::deps::{CustomTarget, MatchStrategy, Target};
use crate::errors::{Result, RippleError};
use trie::SegmentTrie;

/// Resolves dependency keys to the task producing a matching target.
#[derive(Default)]
pub struct MatchIndex {
    exact: HashMap<String, String>,
    prefix_trie: SegmentTrie<String>,
    prefixes: HashMap<String, String>,
    custom: Vec<(Arc<dyn CustomTarget>, String)>,
}

impl MatchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one declared target for `owner`.
    ///
    /// Distinct owners may not declare the same exact key or the same
    /// prefix; re-registration by the same owner (task regeneration) is a
    /// no-op.
    pub fn register_target(&mut self, target: &Target, owner: &str) -> Result<()> {
        let key = target.key();
        match target.strategy() {
            MatchStrategy::Exact => {
                if let Some(existing) = self.exact.get(&key) {
                    if existing != owner {
                        return Err(RippleError::DuplicateTarget {
                            key,
                            first: existing.clone(),
                            second: owner.to_string(),
                        });
                    }
                    return Ok(());
                }
                // Legal but worth surfacing: an exact target shadow-covered
                // by another task's prefix target. Exact wins at lookup.
                if let Some(cover) = self.prefix_trie.find_longest(&key) {
                    if cover != owner {
                        warn!(
                            key = %key,
                            exact_owner = %owner,
                            prefix_owner = %cover,
                            "exact target is covered by another task's prefix target; exact match wins"
                        );
                    }
                }
                self.exact.insert(key, owner.to_string());
            }
            MatchStrategy::Prefix => {
                let normalized = normalize_prefix(&key);
                if let Some(existing) = self.prefixes.get(&normalized) {
                    if existing != owner {
                        return Err(RippleError::DuplicateTarget {
                            key: normalized,
                            first: existing.clone(),
                            second: owner.to_string(),
                        });
                    }
                    return Ok(());
                }
                self.prefixes.insert(normalized.clone(), owner.to_string());
                self.prefix_trie.insert(&normalized, owner.to_string());
            }
            MatchStrategy::Custom => {
                if let Target::Custom(t) = target {
                    self.custom.push((Arc::clone(t), owner.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Task producing a target that matches `dep_key`, if any.
    ///
    /// Priority: exact lookup, then longest registered prefix, then custom
    /// targets in declaration order.
    pub fn find_producer(&self, dep_key: &str) -> Option<&str> {
        if let Some(owner) = self.exact.get(dep_key) {
            return Some(owner.as_str());
        }
        if let Some(owner) = self.prefix_trie.find_longest(dep_key) {
            return Some(owner.as_str());
        }
        for (target, owner) in &self.custom {
            if target.matches(dep_key) {
                return Some(owner.as_str());
            }
        }
        None
    }

    /// Every producer whose target matches `dep_key`, across all buckets.
    /// Useful for conflict diagnostics.
    pub fn find_all_producers(&self, dep_key: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        if let Some(owner) = self.exact.get(dep_key) {
            out.push(owner.as_str());
        }
        for owner in self.prefix_trie.find_all(dep_key) {
            if !out.contains(&owner.as_str()) {
                out.push(owner.as_str());
            }
        }
        for (target, owner) in &self.custom {
            if target.matches(dep_key) && !out.contains(&owner.as_str()) {
                out.push(owner.as_str());
            }
        }
        out
    }

    pub fn exact_count(&self) -> usize {
        self.exact.len()
    }

    pub fn prefix_count(&self) -> usize {
        self.prefixes.len()
    }

    pub fn custom_count(&self) -> usize {
        self.custom.len()
    }
}

/// Maps generator input patterns to generator ids, answering the symmetric
/// query: which generators could produce tasks for a just-published key.
#[derive(Debug, Default)]
pub struct GeneratorIndex {
    exact: HashMap<String, Vec<String>>,
    /// (normalized prefix, generator id), in registration order.
    prefixes: Vec<(String, String)>,
    /// (pattern, generator id), in registration order.
    custom: Vec<(String, String)>,
}

impl GeneratorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pattern(&mut self, pattern: &str, strategy: MatchStrategy, gen_id: &str) {
        match strategy {
            MatchStrategy::Exact => {
                let ids = self.exact.entry(pattern.to_string()).or_default();
                if !ids.contains(&gen_id.to_string()) {
                    ids.push(gen_id.to_string());
                }
            }
            MatchStrategy::Prefix => {
                let normalized = normalize_prefix(pattern);
                let entry = (normalized, gen_id.to_string());
                if !self.prefixes.contains(&entry) {
                    self.prefixes.push(entry);
                }
            }
            MatchStrategy::Custom => {
                let entry = (pattern.to_string(), gen_id.to_string());
                if !self.custom.contains(&entry) {
                    self.custom.push(entry);
                }
            }
        }
    }

    /// Generator ids affected by a published key, de-duplicated, in
    /// exact > prefix > custom priority order.
    ///
    /// A prefix pattern matches both directions: a published key under the
    /// pattern, and a published prefix (directory target) that contains the
    /// pattern, since files may appear beneath it.
    pub fn affected(&self, published_key: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();

        if let Some(ids) = self.exact.get(published_key) {
            for id in ids {
                push_unique(&mut out, id);
            }
        }

        for (prefix, id) in &self.prefixes {
            if published_key.starts_with(prefix.as_str())
                || prefix.starts_with(published_key)
            {
                push_unique(&mut out, id);
            }
        }

        for (pattern, id) in &self.custom {
            if published_key.starts_with(pattern.as_str()) {
                push_unique(&mut out, id);
            }
        }

        out
    }
}

fn push_unique(out: &mut Vec<String>, id: &str) {
    if !out.iter().any(|x| x == id) {
        out.push(id.to_string());
    }
}

fn normalize_prefix(key: &str) -> String {
    if key.ends_with('/') {
        key.to_string()
    } else {
        format!("{key}/")
    }
}
