//! Content-addressed score cache
//!
//! Blobs are frequently unchanged across revisions. Entries are keyed by the
//! xxh3 hash of the content, so an unchanged blob is extracted and scored
//! once per run no matter how many revisions carry it.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use xxhash_rust::xxh3::xxh3_64;

use super::Granularity;
use crate::error::UnitError;
use crate::models::{FeatureVector, Language, RatingBand, ScopeSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hash: u64,
    language: Option<Language>,
    granularity: Granularity,
}

impl CacheKey {
    pub fn new(content: &[u8], language: Option<Language>, granularity: Granularity) -> Self {
        Self {
            hash: xxh3_64(content),
            language,
            granularity,
        }
    }
}

/// Scored entry of one unit, independent of path and revision.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub scope: Option<ScopeSpan>,
    pub features: FeatureVector,
    pub score: f64,
    pub band: RatingBand,
}

/// Whole-unit failure, or one result per scored scope.
pub type CachedScores = Result<Vec<Result<Scored, (Option<ScopeSpan>, UnitError)>>, UnitError>;

/// Thread-safe score cache shared by the scoring workers.
#[derive(Default)]
pub struct ScoreCache {
    entries: DashMap<CacheKey, Arc<CachedScores>>,
    hits: AtomicUsize,
}

impl ScoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached entry for `key`, computing it on a miss.
    ///
    /// The computation runs outside the shard lock. Two workers racing on
    /// the same blob may both compute, the first insert wins.
    pub fn get_or_compute(&self, key: CacheKey, compute: impl FnOnce() -> CachedScores) -> Arc<CachedScores> {
        if let Some(hit) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(hit.value());
        }
        let value = Arc::new(compute());
        Arc::clone(self.entries.entry(key).or_insert(value).value())
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_content_computes_once() {
        let cache = ScoreCache::new();
        let mut calls = 0;
        for _ in 0..3 {
            let key = CacheKey::new(b"x = 1\n", Some(Language::Python), Granularity::File);
            let entry = cache.get_or_compute(key, || {
                calls += 1;
                Err(UnitError::Parse("stub".into()))
            });
            assert!(entry.is_err());
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_key_separates_granularity_and_language() {
        let file = CacheKey::new(b"a", Some(Language::Python), Granularity::File);
        let func = CacheKey::new(b"a", Some(Language::Python), Granularity::Function);
        let other = CacheKey::new(b"a", Some(Language::Rust), Granularity::File);
        assert_ne!(file, func);
        assert_ne!(file, other);
        assert_eq!(file, CacheKey::new(b"a", Some(Language::Python), Granularity::File));
    }
}
