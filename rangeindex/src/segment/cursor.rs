//! Cursors over serialized segments.

use bytes::Bytes;
use roaring::RoaringTreemap;

use crate::cursor::LayerCursor;
use crate::segment::BitmapLayer;
use crate::segment::node::SegmentNode;

/// Iterates the nodes of a packed segment in bit-position order.
///
/// Steps node-to-node through the bytes using each node's self-reported
/// total length. Segments validated at construction never fail to decode
/// here; if bytes rot underneath us anyway, the cursor logs and ends.
pub struct SegmentCursor {
    bytes: Bytes,
    pos: usize,
}

impl SegmentCursor {
    pub fn new(bytes: Bytes) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn first(&mut self) -> Option<(u8, BitmapLayer)> {
        self.pos = 0;
        self.next()
    }

    pub fn next(&mut self) -> Option<(u8, BitmapLayer)> {
        if self.pos >= self.bytes.len() {
            return None;
        }

        let node = match SegmentNode::from_buffer(self.bytes.slice(self.pos..)) {
            Ok(node) => node,
            Err(err) => {
                tracing::error!(pos = self.pos, error = %err, "corrupt segment node");
                self.pos = self.bytes.len();
                return None;
            }
        };

        let layer = match (node.additions(), node.deletions()) {
            (Ok(additions), Ok(deletions)) => BitmapLayer {
                additions,
                deletions,
            },
            (Err(err), _) | (_, Err(err)) => {
                tracing::error!(pos = self.pos, key = node.key(), error = %err, "corrupt segment node bitmap");
                self.pos = self.bytes.len();
                return None;
            }
        };

        self.pos += node.len() as usize;
        Some((node.key(), layer))
    }
}

/// Query-facing cursor over a segment, yielding each layer's additions.
///
/// Within a single segment, the slot-0 additions are the presence set;
/// deletions only matter when merging this segment over older ones.
pub struct SegmentReadCursor {
    inner: SegmentCursor,
}

impl SegmentReadCursor {
    pub fn new(bytes: Bytes) -> Self {
        Self {
            inner: SegmentCursor::new(bytes),
        }
    }
}

impl LayerCursor for SegmentReadCursor {
    fn first(&mut self) -> Option<(u8, RoaringTreemap)> {
        self.inner.first().map(|(key, layer)| (key, layer.additions))
    }

    fn next(&mut self) -> Option<(u8, RoaringTreemap)> {
        self.inner.next().map(|(key, layer)| (key, layer.additions))
    }
}
