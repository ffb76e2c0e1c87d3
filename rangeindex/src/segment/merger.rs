//! Merging segments of one property, oldest to newest.
//!
//! Newer segments shadow older ones through their slot-0 layer: its
//! deletions name every doc whose last write (insert or delete) happened in
//! that segment, so they scrub the accumulated presence and every
//! accumulated bit slice before the newer layers are unioned in. Per-bit
//! layers never carry tombstones of their own.

use roaring::RoaringTreemap;

use common::EncodingError;

use crate::bitmap::condense;
use crate::memtable::MemtableNode;
use crate::segment::Segment;

/// Merge segments into one, `segments` ordered oldest to newest.
///
/// The merged segment keeps the union of all tombstones on its slot-0
/// layer, so it still shadows segments older than any of its inputs.
pub fn merge_segments(segments: &[Segment]) -> Result<Segment, EncodingError> {
    let mut presence = RoaringTreemap::new();
    let mut deletions = RoaringTreemap::new();
    let mut bits: [RoaringTreemap; 64] = std::array::from_fn(|_| RoaringTreemap::new());

    for segment in segments {
        let mut cursor = segment.layer_cursor();
        let mut entry = cursor.first();
        while let Some((key, layer)) = entry {
            if key == 0 {
                // scrub everything accumulated so far, then apply this
                // segment's own layer; keys ascend, so slot 0 lands before
                // any of this segment's bit slices
                presence -= &layer.deletions;
                for slice in bits.iter_mut() {
                    *slice -= &layer.deletions;
                }
                presence |= &layer.additions;
                deletions |= &layer.deletions;
            } else if key <= 64 {
                bits[(key - 1) as usize] |= &layer.additions;
            }
            entry = cursor.next();
        }
    }

    if presence.is_empty() && deletions.is_empty() {
        return Segment::from_nodes(&[]);
    }

    let mut nodes = Vec::with_capacity(65);
    nodes.push(MemtableNode {
        key: 0,
        additions: condense(&presence),
        deletions: condense(&deletions),
    });
    for (bit, slice) in bits.iter().enumerate() {
        if !slice.is_empty() {
            nodes.push(MemtableNode {
                key: bit as u8 + 1,
                additions: condense(slice),
                deletions: RoaringTreemap::new(),
            });
        }
    }

    Segment::from_nodes(&nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::bitmap_of;
    use crate::memtable::Memtable;

    fn flush(build: impl FnOnce(&mut Memtable)) -> Segment {
        let mut memtable = Memtable::new();
        build(&mut memtable);
        Segment::from_memtable(&memtable).unwrap()
    }

    fn layers_of(segment: &Segment) -> Vec<(u8, RoaringTreemap, RoaringTreemap)> {
        let mut cursor = segment.layer_cursor();
        let mut layers = Vec::new();
        let mut entry = cursor.first();
        while let Some((key, layer)) = entry {
            layers.push((key, layer.additions, layer.deletions));
            entry = cursor.next();
        }
        layers
    }

    #[test]
    fn should_merge_disjoint_segments() {
        // given
        let older = flush(|m| m.insert(5, &[1, 2]));
        let newer = flush(|m| m.insert(13, &[3]));

        // when
        let merged = merge_segments(&[older, newer]).unwrap();

        // then
        let layers = layers_of(&merged);
        assert_eq!(layers[0].0, 0);
        assert_eq!(layers[0].1, bitmap_of(&[1, 2, 3]));
        let keys: Vec<u8> = layers.iter().map(|(key, _, _)| *key).collect();
        assert_eq!(keys, vec![0, 1, 3, 4]);
    }

    #[test]
    fn should_let_newer_upsert_shadow_older_value() {
        // given - doc 7 first holds 0b111, then is rewritten to 0b100
        let older = flush(|m| m.insert(0b111, &[7]));
        let newer = flush(|m| m.insert(0b100, &[7]));

        // when
        let merged = merge_segments(&[older, newer]).unwrap();

        // then - bits 0 and 1 no longer contain the doc
        let keys: Vec<u8> = layers_of(&merged).iter().map(|(key, _, _)| *key).collect();
        assert_eq!(keys, vec![0, 3]);
    }

    #[test]
    fn should_drop_docs_deleted_in_newer_segment() {
        // given
        let older = flush(|m| m.insert(5, &[1, 2]));
        let newer = flush(|m| m.delete(5, &[1]));

        // when
        let merged = merge_segments(&[older, newer]).unwrap();

        // then
        let layers = layers_of(&merged);
        assert_eq!(layers[0].1, bitmap_of(&[2]));
        for (_, additions, _) in &layers[1..] {
            assert!(!additions.contains(1));
        }
    }

    #[test]
    fn should_keep_union_of_tombstones_on_slot_zero_only() {
        // given
        let older = flush(|m| m.insert(5, &[1]));
        let newer = flush(|m| {
            m.insert(13, &[2]);
            m.delete(5, &[1]);
        });

        // when
        let merged = merge_segments(&[older, newer]).unwrap();

        // then
        let layers = layers_of(&merged);
        assert_eq!(layers[0].2, bitmap_of(&[1, 2]));
        for (_, _, deletions) in &layers[1..] {
            assert!(deletions.is_empty());
        }
    }

    #[test]
    fn should_not_scrub_a_segments_own_layers_with_its_deletions() {
        // given - a single segment where doc 1 was re-inserted (so it is in
        // both additions and deletions of slot 0)
        let only = flush(|m| m.insert(5, &[1]));

        // when
        let merged = merge_segments(&[only]).unwrap();

        // then - the doc survives the merge
        let layers = layers_of(&merged);
        assert_eq!(layers[0].1, bitmap_of(&[1]));
        assert!(layers[1].1.contains(1));
    }

    #[test]
    fn should_match_single_memtable_equivalent() {
        // given - the same operation sequence split across three segments
        let segments = vec![
            flush(|m| {
                m.insert(5, &[15, 25]);
                m.insert(0, &[10, 20]);
            }),
            flush(|m| m.insert(13, &[113, 213])),
            flush(|m| {
                m.delete(5, &[25]);
                m.insert(6, &[15]);
            }),
        ];

        let mut equivalent = Memtable::new();
        equivalent.insert(5, &[15, 25]);
        equivalent.insert(0, &[10, 20]);
        equivalent.insert(13, &[113, 213]);
        equivalent.delete(5, &[25]);
        equivalent.insert(6, &[15]);

        // when
        let merged = merge_segments(&segments).unwrap();
        let expected = Segment::from_memtable(&equivalent).unwrap();

        // then
        assert_eq!(merged.as_bytes(), expected.as_bytes());
    }

    #[test]
    fn should_produce_empty_segment_from_no_inputs() {
        // given / when
        let merged = merge_segments(&[]).unwrap();

        // then
        assert!(merged.is_empty());
    }
}
