//! Segment node encoding/decoding.
//!
//! One node serialises one layer of a flushed memtable. Nodes are
//! self-describing: the leading total length lets a reader that was handed a
//! larger buffer trim itself, and lets a cursor step node-to-node through a
//! packed segment without an external index.
//!
//! ## Layout
//!
//! ```text
//! +-----------------------------------------------------------------+
//! |  total_length:     u64 LE   full node size including headers    |
//! |  additions_length: u64 LE   size of the additions bitmap        |
//! |  key:              u8      bit position (0 = presence layer)    |
//! |  additions:        RoaringTreemap serialization                 |
//! |  deletions:        RoaringTreemap serialization (derived size)  |
//! +-----------------------------------------------------------------+
//! ```

use bytes::{Bytes, BytesMut};
use common::serde::encoding::decode_u64;
use common::{Encode, EncodingError};
use roaring::RoaringTreemap;

use crate::bitmap;

/// Byte size of the fixed node header (total length, additions length, key).
pub const HEADER_LEN: usize = 17;

/// One serialized index layer, backed by exactly its own bytes.
///
/// The node keeps the serialized form; accessors decode on demand. This
/// makes `to_buffer` an exact re-emission of the bytes the node was built
/// from, so round trips are byte-identical by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentNode {
    buf: Bytes,
}

impl SegmentNode {
    /// Serialize a layer into a new node.
    pub fn new(
        key: u8,
        additions: &RoaringTreemap,
        deletions: &RoaringTreemap,
    ) -> Result<Self, EncodingError> {
        let additions_buf = bitmap::serialize(additions)?;
        let deletions_buf = bitmap::serialize(deletions)?;

        let total = HEADER_LEN + additions_buf.len() + deletions_buf.len();
        let mut buf = BytesMut::with_capacity(total);
        (total as u64).encode(&mut buf);
        (additions_buf.len() as u64).encode(&mut buf);
        key.encode(&mut buf);
        buf.extend_from_slice(&additions_buf);
        buf.extend_from_slice(&deletions_buf);

        Ok(Self { buf: buf.freeze() })
    }

    /// Read a node from the head of `buf`, trimming to the node's own
    /// `total_length`. The buffer may extend past the node.
    pub fn from_buffer(buf: Bytes) -> Result<Self, EncodingError> {
        if buf.len() < HEADER_LEN {
            return Err(EncodingError {
                message: format!(
                    "Buffer too short for segment node header: {} < {}",
                    buf.len(),
                    HEADER_LEN
                ),
            });
        }

        let mut slice = buf.as_ref();
        let total = decode_u64(&mut slice)? as usize;
        let additions_len = decode_u64(&mut slice)? as usize;

        if total < HEADER_LEN + additions_len {
            return Err(EncodingError {
                message: format!(
                    "Segment node total length {} shorter than header plus additions {}",
                    total,
                    HEADER_LEN + additions_len
                ),
            });
        }
        if total > buf.len() {
            return Err(EncodingError {
                message: format!(
                    "Segment node total length {} exceeds buffer length {}",
                    total,
                    buf.len()
                ),
            });
        }

        Ok(Self {
            buf: buf.slice(..total),
        })
    }

    /// Full serialized size of this node.
    pub fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    pub fn key(&self) -> u8 {
        self.buf[16]
    }

    pub fn additions(&self) -> Result<RoaringTreemap, EncodingError> {
        let end = HEADER_LEN + self.additions_len();
        bitmap::deserialize(&self.buf[HEADER_LEN..end])
    }

    pub fn deletions(&self) -> Result<RoaringTreemap, EncodingError> {
        let start = HEADER_LEN + self.additions_len();
        bitmap::deserialize(&self.buf[start..])
    }

    /// The node's exact serialized bytes, headers included.
    pub fn to_buffer(&self) -> Bytes {
        self.buf.clone()
    }

    fn additions_len(&self) -> usize {
        u64::from_le_bytes([
            self.buf[8],
            self.buf[9],
            self.buf[10],
            self.buf[11],
            self.buf[12],
            self.buf[13],
            self.buf[14],
            self.buf[15],
        ]) as usize
    }
}
