//! Leaf predicate evaluation and caching.
//!
//! The planner resolves each leaf to a bucket name and asks a [`Searcher`]
//! for the matching doc ids. [`RangeSearcher`] is the roaring-set-range
//! implementation: every bucket is a frozen memtable or a serialized
//! segment, predicates run through a [`RangeReader`], and results are
//! cached per (bucket, operator, value, limit).

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use lru::LruCache;
use roaring::RoaringTreemap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::memtable::{Memtable, MemtableCursor};
use crate::model::{
    self, NULL_STATE_SUFFIX, Operator, PROP_CREATION_TIME_UNIX, PROP_LAST_UPDATE_TIME_UNIX,
    PROPERTY_LENGTH_SUFFIX,
};
use crate::query::checksum::leaf_checksum;
use crate::reader::{BoxedLayerCursor, RangeReader};
use crate::segment::Segment;

/// A leaf result: the matching doc ids plus the checksum identifying them.
#[derive(Debug, Clone, PartialEq)]
pub struct DocBitmap {
    pub doc_ids: RoaringTreemap,
    pub checksum: Vec<u8>,
}

impl DocBitmap {
    pub fn new() -> Self {
        Self {
            doc_ids: RoaringTreemap::new(),
            checksum: Vec::new(),
        }
    }
}

impl Default for DocBitmap {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves leaf predicates to doc bitmaps. The searcher owns caching, the
/// limit-truncation policy, and is the sole source of leaf checksums.
#[async_trait]
pub trait Searcher: Send + Sync {
    /// Whether the named bucket exists in this shard.
    fn has_bucket(&self, bucket: &str) -> bool;

    /// Materialize the doc ids matching `(operator, value)` in `bucket`.
    ///
    /// `limit` of 0 means unlimited. `skip_cache` bypasses both cache read
    /// and write for this call.
    async fn doc_bitmap(
        &self,
        cancel: &CancellationToken,
        bucket: &str,
        limit: usize,
        operator: Operator,
        value: u64,
        skip_cache: bool,
    ) -> Result<DocBitmap>;
}

/// The storage behind one bucket: an unflushed (frozen) memtable or a
/// serialized segment. Cheap to clone; cursors own their backing data.
#[derive(Clone)]
pub enum Bucket {
    Memtable(Arc<Memtable>),
    Segment(Segment),
}

impl Bucket {
    fn cursor(&self) -> BoxedLayerCursor {
        match self {
            Bucket::Memtable(memtable) => Box::new(MemtableCursor::new(Arc::clone(memtable))),
            Bucket::Segment(segment) => Box::new(segment.read_cursor()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    bucket: String,
    operator: Operator,
    value: u64,
    limit: usize,
}

/// [`Searcher`] over roaring-set-range buckets.
pub struct RangeSearcher {
    buckets: HashMap<String, Bucket>,
    cache: Option<Mutex<LruCache<CacheKey, DocBitmap>>>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl RangeSearcher {
    pub fn builder(config: IndexConfig) -> RangeSearcherBuilder {
        RangeSearcherBuilder {
            config,
            buckets: HashMap::new(),
        }
    }

    /// Cache (hits, misses) since construction.
    pub fn cache_stats(&self) -> (u64, u64) {
        (
            self.cache_hits.load(Ordering::Relaxed),
            self.cache_misses.load(Ordering::Relaxed),
        )
    }

    fn evaluate(
        &self,
        cancel: &CancellationToken,
        bucket: &str,
        limit: usize,
        operator: Operator,
        value: u64,
    ) -> Result<DocBitmap> {
        let data = self
            .buckets
            .get(bucket)
            .ok_or_else(|| Error::Config(format!("bucket {} not found - is it indexed?", bucket)))?
            .clone();

        let reader = RangeReader::new(value, operator, move || data.cursor());
        let mut doc_ids = reader.read(cancel)?;

        if limit > 0 && doc_ids.len() > limit as u64 {
            doc_ids = doc_ids.iter().take(limit).collect();
        }

        let checksum = leaf_checksum(&doc_ids)?;
        Ok(DocBitmap { doc_ids, checksum })
    }
}

#[async_trait]
impl Searcher for RangeSearcher {
    fn has_bucket(&self, bucket: &str) -> bool {
        self.buckets.contains_key(bucket)
    }

    async fn doc_bitmap(
        &self,
        cancel: &CancellationToken,
        bucket: &str,
        limit: usize,
        operator: Operator,
        value: u64,
        skip_cache: bool,
    ) -> Result<DocBitmap> {
        if !is_range_operator(operator) {
            return Err(Error::UnsupportedOperator(operator));
        }

        let key = CacheKey {
            bucket: bucket.to_string(),
            operator,
            value,
            limit,
        };

        if !skip_cache {
            if let Some(cache) = &self.cache {
                if let Some(hit) = cache.lock().await.get(&key) {
                    self.cache_hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(hit.clone());
                }
                self.cache_misses.fetch_add(1, Ordering::Relaxed);
            }
        }

        let doc_bitmap = self.evaluate(cancel, bucket, limit, operator, value)?;

        if !skip_cache {
            if let Some(cache) = &self.cache {
                cache.lock().await.put(key, doc_bitmap.clone());
            }
        }

        Ok(doc_bitmap)
    }
}

fn is_range_operator(operator: Operator) -> bool {
    matches!(
        operator,
        Operator::Equal
            | Operator::NotEqual
            | Operator::GreaterThan
            | Operator::GreaterThanEqual
            | Operator::LessThan
            | Operator::LessThanEqual
    )
}

/// Builds a [`RangeSearcher`], enforcing that auxiliary buckets are only
/// registered when the index configuration enables them.
pub struct RangeSearcherBuilder {
    config: IndexConfig,
    buckets: HashMap<String, Bucket>,
}

impl RangeSearcherBuilder {
    /// Register the value bucket for a property.
    pub fn property(mut self, prop: &str, data: Bucket) -> Self {
        self.buckets.insert(model::bucket_from_prop(prop), data);
        self
    }

    /// Register the property-length bucket for a property.
    pub fn property_length(mut self, prop: &str, data: Bucket) -> Result<Self> {
        if !self.config.index_property_length {
            return Err(Error::Config(format!(
                "property length bucket for {} requires index_property_length",
                prop
            )));
        }
        self.buckets.insert(
            model::bucket_from_prop(&format!("{prop}{PROPERTY_LENGTH_SUFFIX}")),
            data,
        );
        Ok(self)
    }

    /// Register the null-state bucket for a property.
    pub fn null_state(mut self, prop: &str, data: Bucket) -> Result<Self> {
        if !self.config.index_null_state {
            return Err(Error::Config(format!(
                "null state bucket for {} requires index_null_state",
                prop
            )));
        }
        self.buckets.insert(
            format!("{}{}", model::bucket_from_prop(prop), NULL_STATE_SUFFIX),
            data,
        );
        Ok(self)
    }

    /// Register the object timestamp buckets.
    pub fn timestamps(mut self, creation: Bucket, last_update: Bucket) -> Result<Self> {
        if !self.config.index_timestamps {
            return Err(Error::Config(
                "timestamp buckets require index_timestamps".to_string(),
            ));
        }
        self.buckets
            .insert(model::bucket_from_prop(PROP_CREATION_TIME_UNIX), creation);
        self.buckets.insert(
            model::bucket_from_prop(PROP_LAST_UPDATE_TIME_UNIX),
            last_update,
        );
        Ok(self)
    }

    pub fn build(self) -> RangeSearcher {
        let cache = if self.config.cache.enabled {
            NonZeroUsize::new(self.config.cache.capacity)
                .map(|capacity| Mutex::new(LruCache::new(capacity)))
        } else {
            None
        };

        RangeSearcher {
            buckets: self.buckets,
            cache,
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }
}
