//! Bit-sliced roaring range index for vector-search shards.
//!
//! This crate implements a shard's secondary index for numeric range
//! filtering, plus the boolean planner that combines per-property predicate
//! results into one candidate doc id set for the vector search stage.
//!
//! # Architecture
//!
//! Each indexed property stores its u64 values bit-sliced across 65 roaring
//! bitmaps: slot 0 holds the docs with any value (`presence`), slot k+1
//! holds the docs whose value has bit k set. Any inequality then reduces to
//! at most 64 bitmap AND/OR operations, independent of the value range.
//!
//! Writes land in a [`Memtable`]; frozen memtables flush to immutable
//! [`Segment`]s. Both expose the same sparse layer-cursor contract, which
//! [`GapFillingCursor`] densifies so the [`RangeReader`] fold can walk bit
//! positions 0..=64 without caring which layers the store skipped.
//!
//! # Key Concepts
//!
//! - **Presence bitmap**: slot 0, the membership filter applied before any
//!   bit fold. Deletions are tracked only here; per-bit layers never carry
//!   tombstones.
//! - **PropValuePair**: one node of a boolean filter tree. Leaves fetch doc
//!   bitmaps through a [`Searcher`] (concurrently across siblings), inner
//!   nodes merge them under AND/OR with checksum-based short-circuiting.
//! - **DocBitmap**: a result bitmap paired with the checksum that identifies
//!   it for caching and merge deduplication.
//!
//! # Example
//!
//! ```ignore
//! use rangeindex::{Bucket, IndexConfig, Memtable, Operator, PropValuePair, RangeSearcher};
//! use tokio_util::sync::CancellationToken;
//!
//! let mut memtable = Memtable::new();
//! memtable.insert(42, &[1, 2, 3]);
//!
//! let searcher = RangeSearcher::builder(IndexConfig::default())
//!     .property("price", Bucket::Memtable(memtable.into()))
//!     .build();
//!
//! let mut filter = PropValuePair::leaf("price", Operator::GreaterThanEqual, 10);
//! filter.fetch_doc_ids(&searcher, 0, false, &CancellationToken::new()).await?;
//! let candidates = filter.merge_doc_ids()?;
//! ```

pub mod bitmap;
pub mod config;
pub mod cursor;
pub mod error;
pub mod memtable;
pub mod model;
pub mod query;
pub mod reader;
pub mod segment;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{CacheConfig, IndexConfig};
pub use cursor::{GapFillingCursor, LayerCursor};
pub use error::{Error, Result};
pub use memtable::{Memtable, MemtableCursor, MemtableNode};
pub use model::Operator;
pub use query::{Bucket, DocBitmap, PropValuePair, RangeSearcher, RangeSearcherBuilder, Searcher};
pub use reader::{BoxedLayerCursor, RangeReader};
pub use segment::{BitmapLayer, Segment, SegmentCursor, SegmentNode, merge_segments};
