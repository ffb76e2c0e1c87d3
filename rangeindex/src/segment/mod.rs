//! Serialized form of a flushed memtable.
//!
//! A segment is the concatenation of [`SegmentNode`] buffers in strictly
//! ascending key order, tightly packed. Readers step between nodes using
//! each node's self-reported total length; there is no segment-level header
//! or index.

pub mod cursor;
pub mod merger;
pub mod node;

use bytes::{Bytes, BytesMut};
use common::EncodingError;
use roaring::RoaringTreemap;

pub use cursor::{SegmentCursor, SegmentReadCursor};
pub use merger::merge_segments;
pub use node::SegmentNode;

use crate::memtable::{Memtable, MemtableNode};

/// One layer's bitmaps as read back from a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct BitmapLayer {
    pub additions: RoaringTreemap,
    pub deletions: RoaringTreemap,
}

/// An immutable, serialized range index for one property.
#[derive(Debug, Clone)]
pub struct Segment {
    bytes: Bytes,
}

impl Segment {
    /// Wrap and validate externally produced segment bytes.
    ///
    /// Walks every node once: lengths must be in bounds, keys ascending and
    /// ≤ 64, bitmaps decodable. Cursors over a validated segment do not hit
    /// decode errors.
    pub fn new(bytes: Bytes) -> Result<Self, EncodingError> {
        let mut pos = 0usize;
        let mut last_key: Option<u8> = None;

        while pos < bytes.len() {
            let node = SegmentNode::from_buffer(bytes.slice(pos..))?;
            let key = node.key();
            if key > 64 {
                return Err(EncodingError {
                    message: format!("Segment node key {} out of range", key),
                });
            }
            if let Some(last) = last_key {
                if key <= last {
                    return Err(EncodingError {
                        message: format!(
                            "Segment node keys not strictly ascending: {} after {}",
                            key, last
                        ),
                    });
                }
            }
            node.additions()?;
            node.deletions()?;

            last_key = Some(key);
            pos += node.len() as usize;
        }

        Ok(Self { bytes })
    }

    /// Serialize memtable layers into a segment.
    pub fn from_nodes(nodes: &[MemtableNode]) -> Result<Self, EncodingError> {
        let mut buf = BytesMut::new();
        for node in nodes {
            let segment_node = SegmentNode::new(node.key, &node.additions, &node.deletions)?;
            buf.extend_from_slice(&segment_node.to_buffer());
        }
        Ok(Self { bytes: buf.freeze() })
    }

    /// Flush a frozen memtable into its serialized form.
    pub fn from_memtable(memtable: &Memtable) -> Result<Self, EncodingError> {
        Self::from_nodes(&memtable.nodes())
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Merge-facing cursor over full layers (additions and deletions).
    pub fn layer_cursor(&self) -> SegmentCursor {
        SegmentCursor::new(self.bytes.clone())
    }

    /// Query-facing cursor yielding each layer's additions.
    pub fn read_cursor(&self) -> SegmentReadCursor {
        SegmentReadCursor::new(self.bytes.clone())
    }
}
