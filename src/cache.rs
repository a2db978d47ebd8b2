//! Process-wide memory of modules that are known to import cleanly.
//!
//! Construct one [`PackageCache`] at startup and hand an `Arc` of it to every
//! request. The set only ever grows.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

/// Modules confirmed importable or installed during this process's lifetime.
#[derive(Debug, Default)]
pub struct PackageCache {
    names: RwLock<HashSet<String>>,
}

impl PackageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        // A poisoned set is still a valid set: inserts are atomic per name.
        let names = self.names.read().unwrap_or_else(PoisonError::into_inner);
        names.contains(name)
    }

    /// Record `names` as importable. Already-known names are a no-op.
    pub fn mark_installed<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = self.names.write().unwrap_or_else(PoisonError::into_inner);
        set.extend(names.into_iter().map(Into::into));
    }

    /// Number of cached module names.
    pub fn len(&self) -> usize {
        self.names.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted copy of the cached names.
    pub fn snapshot(&self) -> Vec<String> {
        let names = self.names.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<String> = names.iter().cloned().collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_empty() {
        let cache = PackageCache::new();
        assert!(cache.is_empty());
        assert!(!cache.contains("requests"));
    }

    #[test]
    fn mark_then_contains() {
        let cache = PackageCache::new();
        cache.mark_installed(["requests", "numpy"]);
        assert!(cache.contains("requests"));
        assert!(cache.contains("numpy"));
        assert!(!cache.contains("pandas"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn marking_twice_does_not_grow() {
        let cache = PackageCache::new();
        cache.mark_installed(vec!["requests".to_string()]);
        cache.mark_installed(vec!["requests".to_string()]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn snapshot_is_sorted() {
        let cache = PackageCache::new();
        cache.mark_installed(["yaml", "bs4", "numpy"]);
        assert_eq!(cache.snapshot(), vec!["bs4", "numpy", "yaml"]);
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let cache = Arc::new(PackageCache::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        cache.mark_installed([format!("pkg{}", i % 25)]);
                        let _ = cache.contains(&format!("pkg{t}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 25);
    }
}
