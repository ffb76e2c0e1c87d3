//! Test doubles shared across unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use roaring::RoaringTreemap;

use crate::cursor::LayerCursor;

/// Sparse cursor over a fixed list of layers, counting close calls.
pub(crate) struct FakeLayerCursor {
    layers: Vec<(u8, RoaringTreemap)>,
    pos: usize,
    closes: Arc<AtomicUsize>,
}

impl FakeLayerCursor {
    pub(crate) fn new(layers: Vec<(u8, RoaringTreemap)>) -> Self {
        Self {
            layers,
            pos: 0,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Layers for doc id → value pairs, the same shape a memtable produces:
    /// slot 0 presence plus one slot per set bit.
    pub(crate) fn from_doc_values(doc_values: &[(u64, u64)]) -> Self {
        let mut bitmaps: Vec<RoaringTreemap> = (0..65).map(|_| RoaringTreemap::new()).collect();
        for &(doc_id, value) in doc_values {
            bitmaps[0].insert(doc_id);
            for bit in 0..64 {
                if value & (1 << bit) != 0 {
                    bitmaps[bit + 1].insert(doc_id);
                }
            }
        }

        let layers = bitmaps
            .into_iter()
            .enumerate()
            .filter(|(_, bm)| !bm.is_empty())
            .map(|(key, bm)| (key as u8, bm))
            .collect();
        Self::new(layers)
    }

    pub(crate) fn close_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }
}

impl LayerCursor for FakeLayerCursor {
    fn first(&mut self) -> Option<(u8, RoaringTreemap)> {
        self.pos = 0;
        self.next()
    }

    fn next(&mut self) -> Option<(u8, RoaringTreemap)> {
        let layer = self.layers.get(self.pos)?.clone();
        self.pos += 1;
        Some(layer)
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
