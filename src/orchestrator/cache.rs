//! Version-keyed LRU cache of validation results.
//!
//! One entry per document. An entry is only returned for the exact version
//! it was computed for, and an older result never replaces a newer one.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

use crate::lint::ValidationResult;

/// Default number of documents kept.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Lookups that found an entry for a different version
    pub stale: u64,
}

pub struct ResultCache {
    entries: Mutex<LruCache<String, ValidationResult>>,
    stats: Mutex<CacheStats>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ResultCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// The cached result for exactly `version`.
    #[must_use]
    pub fn get(&self, document_id: &str, version: u64) -> Option<ValidationResult> {
        let mut entries = self.entries.lock();
        let mut stats = self.stats.lock();
        match entries.get(document_id) {
            Some(result) if result.version == version => {
                stats.hits += 1;
                trace!(document = document_id, version, "cache hit");
                Some(result.clone())
            }
            Some(result) => {
                stats.misses += 1;
                stats.stale += 1;
                trace!(document = document_id, version, cached = result.version, "cache stale");
                None
            }
            None => {
                stats.misses += 1;
                trace!(document = document_id, version, "cache miss");
                None
            }
        }
    }

    /// Store a result unless a newer version is already cached.
    ///
    /// Returns whether the result was stored.
    pub fn insert(&self, result: ValidationResult) -> bool {
        let mut entries = self.entries.lock();
        if entries
            .peek(&result.document_id)
            .is_some_and(|existing| existing.version > result.version)
        {
            return false;
        }
        entries.put(result.document_id.clone(), result);
        true
    }

    /// Drop the entry for a document.
    pub fn evict(&self, document_id: &str) -> Option<ValidationResult> {
        self.entries.lock().pop(document_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::DocumentType;

    fn result(id: &str, version: u64) -> ValidationResult {
        ValidationResult::new(id, version, DocumentType::Definition, vec![], false)
    }

    #[test]
    fn test_exact_version_only() {
        let cache = ResultCache::new(4);
        assert!(cache.insert(result("a", 2)));

        assert!(cache.get("a", 2).is_some());
        assert!(cache.get("a", 3).is_none());
        assert!(cache.get("a", 1).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.stale, 2);
    }

    #[test]
    fn test_older_result_never_replaces_newer() {
        let cache = ResultCache::new(4);
        assert!(cache.insert(result("a", 5)));
        assert!(!cache.insert(result("a", 4)));
        assert_eq!(cache.get("a", 5).map(|r| r.version), Some(5));
        assert!(cache.insert(result("a", 6)));
        assert!(cache.get("a", 5).is_none());
    }

    #[test]
    fn test_capacity_and_evict() {
        let cache = ResultCache::new(2);
        cache.insert(result("a", 1));
        cache.insert(result("b", 1));
        cache.insert(result("c", 1));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a", 1).is_none());

        assert!(cache.evict("b").is_some());
        assert!(cache.evict("b").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = ResultCache::new(0);
        cache.insert(result("a", 1));
        assert!(!cache.is_empty());
    }
}
