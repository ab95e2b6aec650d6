//! Traversal position tracking for the call graph builder

use std::collections::HashMap;

/// Digest path of the current traversal position, with a human readable
/// name per digest. Every path entered is remembered.
#[derive(Debug, Clone, Default)]
pub struct Level {
    mapping: HashMap<String, String>,
    current: Vec<String>,
    all_paths: Vec<String>,
    all_digest_paths: Vec<Vec<String>>,
}

impl Level {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descend into the node `digest`, named `name`
    pub fn enter(&mut self, digest: &str, name: &str) {
        self.mapping.insert(digest.to_string(), name.to_string());
        self.current.push(digest.to_string());
        self.all_paths.push(self.name());
        self.all_digest_paths.push(self.current.clone());
    }

    pub fn exit(&mut self) {
        self.current.pop();
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Current digest path, root first
    pub fn digests(&self) -> Vec<String> {
        self.current.clone()
    }

    /// Current path as names, root first
    pub fn names(&self) -> Vec<String> {
        self.current
            .iter()
            .map(|d| self.name_of(d).unwrap_or(d).to_string())
            .collect()
    }

    /// Current path joined with '.'
    pub fn name(&self) -> String {
        self.names().join(".")
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.current.iter().any(|d| d == digest)
    }

    pub fn name_of(&self, digest: &str) -> Option<&str> {
        self.mapping.get(digest).map(String::as_str)
    }

    pub fn all_paths(&self) -> &[String] {
        &self.all_paths
    }

    pub fn all_digest_paths(&self) -> &[Vec<String>] {
        &self.all_digest_paths
    }
}
