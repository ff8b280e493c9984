// src/matching/trie.rs

//! Prefix trie over `/`-separated key segments.
//!
//! Keys are split into non-empty segments, so scheme markers ("s3:") and
//! bucket names are ordinary segments and keys from different namespaces
//! never share a subtree.

use std::collections::HashMap;

#[derive(Debug, Clone)]
struct TrieNode<T> {
    children: HashMap<String, TrieNode<T>>,
    value: Option<T>,
}

impl<T> Default for TrieNode<T> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            value: None,
        }
    }
}

/// Trie mapping registered prefixes to values, with longest-prefix lookup.
#[derive(Debug, Clone, Default)]
pub struct SegmentTrie<T> {
    root: TrieNode<T>,
}

impl<T> SegmentTrie<T> {
    pub fn new() -> Self {
        Self {
            root: TrieNode::default(),
        }
    }

    /// Register `prefix` with `value`, replacing any previous value at the
    /// exact same prefix.
    pub fn insert(&mut self, prefix: &str, value: T) {
        let mut node = &mut self.root;
        for part in split_segments(prefix) {
            node = node.children.entry(part.to_string()).or_default();
        }
        node.value = Some(value);
    }

    /// Value of the longest registered prefix that `key` falls under.
    pub fn find_longest(&self, key: &str) -> Option<&T> {
        let mut node = &self.root;
        let mut result = node.value.as_ref();
        for part in split_segments(key) {
            match node.children.get(part) {
                Some(child) => {
                    node = child;
                    if node.value.is_some() {
                        result = node.value.as_ref();
                    }
                }
                None => break,
            }
        }
        result
    }

    /// Values of every registered prefix that `key` falls under, shortest
    /// prefix first.
    pub fn find_all(&self, key: &str) -> Vec<&T> {
        let mut node = &self.root;
        let mut results = Vec::new();
        if let Some(v) = &node.value {
            results.push(v);
        }
        for part in split_segments(key) {
            match node.children.get(part) {
                Some(child) => {
                    node = child;
                    if let Some(v) = &node.value {
                        results.push(v);
                    }
                }
                None => break,
            }
        }
        results
    }

    /// Whether this exact prefix was registered.
    pub fn contains(&self, prefix: &str) -> bool {
        let mut node = &self.root;
        for part in split_segments(prefix) {
            match node.children.get(part) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.value.is_some()
    }
}

fn split_segments(key: &str) -> impl Iterator<Item = &str> {
    key.split('/').filter(|s| !s.is_empty())
}
