use std::collections::HashMap;

use super::ProxyResponse;

/// Build the cache key for a request.
///
/// Keyed by method + full URL, so querystrings produce distinct entries.
pub fn cache_key(method: &reqwest::Method, url: &str) -> String {
    format!("{} {}", method, url)
}

/// A named, independently managed store of cached responses.
#[derive(Debug, Default)]
pub struct CachePartition {
    entries: HashMap<String, ProxyResponse>,
}

impl CachePartition {
    /// Store a response snapshot under the given key.
    pub fn put(&mut self, key: String, response: ProxyResponse) {
        self.entries.insert(key, response);
    }

    /// Look up a stored response.
    pub fn get(&self, key: &str) -> Option<&ProxyResponse> {
        self.entries.get(key)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the partition holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The set of cache partitions owned by the proxy.
///
/// Partitions are addressed by name so the activation sweep can drop
/// anything left behind by a previous version.
#[derive(Debug, Default)]
pub struct PartitionSet {
    partitions: HashMap<String, CachePartition>,
}

impl PartitionSet {
    /// Create an empty partition set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a partition by name, creating it if missing.
    pub fn open(&mut self, name: &str) -> &mut CachePartition {
        self.partitions.entry(name.to_string()).or_default()
    }

    /// Look up a partition without creating it.
    pub fn get(&self, name: &str) -> Option<&CachePartition> {
        self.partitions.get(name)
    }

    /// Names of all existing partitions.
    pub fn names(&self) -> Vec<String> {
        self.partitions.keys().cloned().collect()
    }

    /// Delete every partition whose name is not in `keep`.
    ///
    /// Returns the names that were removed. This is the version-upgrade
    /// garbage collection run at activation.
    pub fn sweep(&mut self, keep: &[&str]) -> Vec<String> {
        let stale: Vec<String> = self
            .partitions
            .keys()
            .filter(|name| !keep.contains(&name.as_str()))
            .cloned()
            .collect();

        for name in &stale {
            self.partitions.remove(name);
        }

        stale
    }
}
