//! Bitmap helpers shared across the index.
//!
//! Document sets are `roaring::RoaringTreemap`s keyed by 64-bit doc ids.
//! This module adds the few operations the treemap itself does not provide:
//! building from a doc id slice, condensing, and byte-level (de)serialization
//! with the crate's error type.

use std::io::Cursor;

use bytes::Bytes;
use common::EncodingError;
use roaring::RoaringTreemap;

/// Build a bitmap from a slice of doc ids.
pub fn bitmap_of(doc_ids: &[u64]) -> RoaringTreemap {
    let mut bm = RoaringTreemap::new();
    for doc_id in doc_ids {
        bm.insert(*doc_id);
    }
    bm
}

/// Rebuild a bitmap into freshly allocated, right-sized containers.
///
/// Bitmaps that have seen many removals keep their peak allocation; frozen
/// copies handed to long-lived readers should not. Contents are unchanged.
pub fn condense(bm: &RoaringTreemap) -> RoaringTreemap {
    bm.iter().collect()
}

/// Serialize a bitmap to its portable byte format.
pub fn serialize(bm: &RoaringTreemap) -> Result<Bytes, EncodingError> {
    let mut buf = Vec::new();
    bm.serialize_into(&mut buf).map_err(|e| EncodingError {
        message: format!("Failed to serialize RoaringTreemap: {}", e),
    })?;
    Ok(Bytes::from(buf))
}

/// Deserialize a bitmap from its portable byte format.
pub fn deserialize(buf: &[u8]) -> Result<RoaringTreemap, EncodingError> {
    RoaringTreemap::deserialize_from(Cursor::new(buf)).map_err(|e| EncodingError {
        message: format!("Failed to deserialize RoaringTreemap: {}", e),
    })
}
