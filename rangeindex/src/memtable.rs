//! In-memory writer for the bit-sliced range index.
//!
//! A memtable records, for one property, which doc ids carry which u64
//! values. The value column is kept bit-sliced: one `presence` bitmap of all
//! docs with any value, and one bitmap per bit position holding the docs
//! whose value has that bit set. Range predicates then reduce to at most 64
//! bitmap operations regardless of the value distribution.
//!
//! Memtables are single-writer. Once frozen, a memtable is converted to
//! [`MemtableNode`]s (for flushing into a segment) or read through a
//! [`MemtableCursor`].

use std::sync::Arc;

use roaring::RoaringTreemap;

use crate::bitmap::condense;
use crate::cursor::LayerCursor;

/// One serialisable layer of a memtable snapshot, identified by its
/// bit-position key. Key 0 is the presence/deletions layer; key k+1 holds
/// the docs whose value has bit k set.
#[derive(Debug, Clone, PartialEq)]
pub struct MemtableNode {
    pub key: u8,
    pub additions: RoaringTreemap,
    pub deletions: RoaringTreemap,
}

/// Bit-sliced in-memory index for one property's u64 values.
pub struct Memtable {
    /// Docs with any value inserted and not since deleted.
    presence: RoaringTreemap,
    /// Docs whose last write must tombstone older segments at merge time.
    /// Inserts land here too: a re-inserted doc still shadows its older
    /// segment entries.
    deletions: RoaringTreemap,
    /// Per-bit doc sets, allocated on first 1-bit write. `None` ⇔ empty.
    bits: [Option<RoaringTreemap>; 64],
}

impl Memtable {
    pub fn new() -> Self {
        Self {
            presence: RoaringTreemap::new(),
            deletions: RoaringTreemap::new(),
            bits: std::array::from_fn(|_| None),
        }
    }

    /// Record `value` for each doc in `docs`, replacing any value previously
    /// written for the same doc in this memtable.
    pub fn insert(&mut self, value: u64, docs: &[u64]) {
        if docs.is_empty() {
            return;
        }

        for &doc_id in docs {
            self.presence.insert(doc_id);
            self.deletions.insert(doc_id);
        }

        for bit in 0..64 {
            if value & (1 << bit) == 0 {
                if let Some(slice) = self.bits[bit].as_mut() {
                    for &doc_id in docs {
                        slice.remove(doc_id);
                    }
                }
            } else {
                let slice = self.bits[bit].get_or_insert_with(RoaringTreemap::new);
                for &doc_id in docs {
                    slice.insert(doc_id);
                }
            }
        }
    }

    /// Remove each doc in `docs` from the index, leaving a tombstone.
    pub fn delete(&mut self, _value: u64, docs: &[u64]) {
        if docs.is_empty() {
            return;
        }

        for &doc_id in docs {
            self.deletions.insert(doc_id);
            self.presence.remove(doc_id);
        }

        for slice in self.bits.iter_mut().flatten() {
            for &doc_id in docs {
                slice.remove(doc_id);
            }
        }
    }

    /// No doc has been written or deleted.
    pub fn is_empty(&self) -> bool {
        self.presence.is_empty() && self.deletions.is_empty()
    }

    /// Snapshot the memtable as flushable layers, ascending by key.
    ///
    /// Layer 0 is emitted whenever the memtable saw any write; per-bit
    /// layers only when non-empty. Deletions are carried exclusively on
    /// layer 0: readers apply presence as the membership filter before the
    /// bit fold, so per-bit tombstones would never be consulted.
    pub fn nodes(&self) -> Vec<MemtableNode> {
        if self.is_empty() {
            return Vec::new();
        }

        let mut nodes = Vec::with_capacity(65);
        nodes.push(MemtableNode {
            key: 0,
            additions: condense(&self.presence),
            deletions: condense(&self.deletions),
        });

        for bit in 0..64u8 {
            if let Some(slice) = &self.bits[bit as usize] {
                if !slice.is_empty() {
                    nodes.push(MemtableNode {
                        key: bit + 1,
                        additions: condense(slice),
                        deletions: RoaringTreemap::new(),
                    });
                }
            }
        }

        nodes
    }
}

impl Default for Memtable {
    fn default() -> Self {
        Self::new()
    }
}

/// Read cursor over a frozen memtable, yielding the presence layer followed
/// by non-empty bit slices in ascending key order.
pub struct MemtableCursor {
    memtable: Arc<Memtable>,
    next_bit: usize,
    started: bool,
}

impl MemtableCursor {
    pub fn new(memtable: Arc<Memtable>) -> Self {
        Self {
            memtable,
            next_bit: 0,
            started: false,
        }
    }
}

impl LayerCursor for MemtableCursor {
    fn first(&mut self) -> Option<(u8, RoaringTreemap)> {
        self.started = true;
        self.next_bit = 0;

        if self.memtable.is_empty() {
            return None;
        }
        Some((0, self.memtable.presence.clone()))
    }

    fn next(&mut self) -> Option<(u8, RoaringTreemap)> {
        if !self.started {
            return self.first();
        }

        while self.next_bit < 64 {
            let bit = self.next_bit;
            self.next_bit += 1;
            if let Some(slice) = &self.memtable.bits[bit] {
                if !slice.is_empty() {
                    return Some((bit as u8 + 1, slice.clone()));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::bitmap_of;

    #[test]
    fn should_return_no_nodes_for_empty_memtable() {
        // given
        let memtable = Memtable::new();

        // when / then
        assert!(memtable.nodes().is_empty());
        assert!(memtable.is_empty());
    }

    #[test]
    fn should_index_inserted_values_per_bit() {
        // given
        let mut memtable = Memtable::new();

        // when - 5 = 0b101, 13 = 0b1101
        memtable.insert(5, &[15, 25]);
        memtable.insert(13, &[113, 213]);
        memtable.insert(0, &[10, 20]);

        // then
        let nodes = memtable.nodes();
        let keys: Vec<u8> = nodes.iter().map(|n| n.key).collect();
        assert_eq!(keys, vec![0, 1, 3, 4]);

        assert_eq!(nodes[0].additions, bitmap_of(&[10, 15, 20, 25, 113, 213]));
        assert_eq!(nodes[0].deletions, bitmap_of(&[10, 15, 20, 25, 113, 213]));
        assert_eq!(nodes[1].additions, bitmap_of(&[15, 25, 113, 213])); // bit 0
        assert_eq!(nodes[2].additions, bitmap_of(&[15, 25, 113, 213])); // bit 2
        assert_eq!(nodes[3].additions, bitmap_of(&[113, 213])); // bit 3
        for node in &nodes[1..] {
            assert!(node.deletions.is_empty());
        }
    }

    #[test]
    fn should_overwrite_value_on_reinsert() {
        // given
        let mut memtable = Memtable::new();
        memtable.insert(0b111, &[42]);

        // when
        memtable.insert(0b100, &[42]);

        // then - bits 0 and 1 cleared, bit 2 kept
        let nodes = memtable.nodes();
        let keys: Vec<u8> = nodes.iter().map(|n| n.key).collect();
        assert_eq!(keys, vec![0, 3]);
        assert!(nodes[1].additions.contains(42));
    }

    #[test]
    fn should_remove_doc_on_delete_and_keep_tombstone() {
        // given
        let mut memtable = Memtable::new();
        memtable.insert(0b101, &[7, 8]);

        // when
        memtable.delete(0b101, &[7]);

        // then
        let nodes = memtable.nodes();
        assert_eq!(nodes[0].additions, bitmap_of(&[8]));
        assert_eq!(nodes[0].deletions, bitmap_of(&[7, 8]));
        for node in &nodes[1..] {
            assert!(!node.additions.contains(7));
        }
    }

    #[test]
    fn should_emit_slot_zero_for_delete_only_memtable() {
        // given
        let mut memtable = Memtable::new();

        // when
        memtable.delete(0, &[99]);

        // then - tombstone must surface even though nothing is present
        let nodes = memtable.nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].key, 0);
        assert!(nodes[0].additions.is_empty());
        assert_eq!(nodes[0].deletions, bitmap_of(&[99]));
    }

    #[test]
    fn should_ignore_empty_doc_slices() {
        // given
        let mut memtable = Memtable::new();

        // when
        memtable.insert(42, &[]);
        memtable.delete(42, &[]);

        // then
        assert!(memtable.is_empty());
    }

    #[test]
    fn should_keep_bit_slices_subsets_of_presence() {
        // given - a churned memtable
        let mut memtable = Memtable::new();
        memtable.insert(u64::MAX, &[1, 2, 3]);
        memtable.insert(7, &[2]);
        memtable.delete(u64::MAX, &[3]);
        memtable.insert(0, &[4]);

        // then - every doc in any bit slice is present
        let nodes = memtable.nodes();
        let presence = &nodes[0].additions;
        for node in &nodes[1..] {
            for doc_id in node.additions.iter() {
                assert!(presence.contains(doc_id));
            }
        }
    }

    #[test]
    fn should_cursor_over_presence_and_bit_slices() {
        // given
        let mut memtable = Memtable::new();
        memtable.insert(5, &[15, 25]);
        let memtable = Arc::new(memtable);

        // when
        let mut cursor = MemtableCursor::new(memtable);

        // then
        let (key, presence) = cursor.first().unwrap();
        assert_eq!(key, 0);
        assert_eq!(presence, bitmap_of(&[15, 25]));

        let (key, bit0) = cursor.next().unwrap();
        assert_eq!(key, 1);
        assert_eq!(bit0, bitmap_of(&[15, 25]));

        let (key, bit2) = cursor.next().unwrap();
        assert_eq!(key, 3);
        assert_eq!(bit2, bitmap_of(&[15, 25]));

        assert!(cursor.next().is_none());
    }

    #[test]
    fn should_densify_memtable_cursor_through_gap_filling() {
        use crate::cursor::GapFillingCursor;

        // given - values 5 and 13 populate slots 0, 1, 3, 4
        let mut memtable = Memtable::new();
        memtable.insert(13, &[113, 213]);
        memtable.insert(5, &[15, 25]);
        memtable.insert(0, &[10, 20]);
        let mut cursor = GapFillingCursor::new(MemtableCursor::new(Arc::new(memtable)));

        // when / then
        let (key, presence) = cursor.first().unwrap();
        assert_eq!(key, 0);
        assert_eq!(presence.unwrap(), bitmap_of(&[10, 20, 15, 25, 113, 213]));

        for expected in 1..=64u8 {
            let (key, bitmap) = cursor.next().unwrap();
            assert_eq!(key, expected);
            match expected {
                1 | 3 => assert_eq!(bitmap.unwrap(), bitmap_of(&[15, 25, 113, 213])),
                4 => assert_eq!(bitmap.unwrap(), bitmap_of(&[113, 213])),
                _ => assert!(bitmap.is_none()),
            }
        }

        assert!(cursor.next().is_none());
    }

    #[test]
    fn should_cursor_return_none_for_empty_memtable() {
        // given
        let memtable = Arc::new(Memtable::new());

        // when
        let mut cursor = MemtableCursor::new(memtable);

        // then
        assert!(cursor.first().is_none());
        assert!(cursor.next().is_none());
    }
}
