//! Configuration for the shard's inverted index.
//!
//! The `index_*` flags declare which auxiliary buckets a shard maintains.
//! Filters that need a bucket the configuration did not enable fail with a
//! remediation message naming the flag to turn on.

use serde::{Deserialize, Serialize};

/// Configuration for a shard's range index.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexConfig {
    /// Maintain `<prop>_nullState` buckets so `IsNull` filters are servable.
    #[serde(default)]
    pub index_null_state: bool,

    /// Maintain `_creationTimeUnix` / `_lastUpdateTimeUnix` buckets so
    /// object timestamps are filterable.
    #[serde(default)]
    pub index_timestamps: bool,

    /// Maintain `<prop>_propertyLength` buckets so `len(<prop>)` filters
    /// are servable.
    #[serde(default)]
    pub index_property_length: bool,

    /// Doc-bitmap cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Configuration for the per-shard doc-bitmap cache.
///
/// Cached entries are keyed by (bucket, operator, value, limit), so repeated
/// sub-filters across disjuncts are served without re-reading the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Whether leaf results are cached at all.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Maximum number of cached doc bitmaps before LRU eviction.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            capacity: default_cache_capacity(),
        }
    }
}
