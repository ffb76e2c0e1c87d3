//! Checksums for doc bitmaps.
//!
//! Leaf checksums digest a bitmap's serialized form; combined checksums
//! digest an operator tag followed by the ordered, length-prefixed child
//! checksums. Equal checksums short-circuit merges and key upstream caches,
//! so both functions must stay stable across releases.

use roaring::RoaringTreemap;
use sha2::{Digest, Sha256};

use common::EncodingError;

use crate::bitmap;
use crate::model::Operator;

/// Checksum of a leaf result bitmap.
pub fn leaf_checksum(doc_ids: &RoaringTreemap) -> Result<Vec<u8>, EncodingError> {
    let bytes = bitmap::serialize(doc_ids)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hasher.finalize().to_vec())
}

/// Combine ordered child checksums under an operator.
///
/// The leading operator tag separates the domain from leaf checksums, so an
/// inner node with a single child cannot collide with the child itself. Each
/// child checksum is length-prefixed so sequences cannot alias across
/// boundaries.
pub fn combine_checksums(checksums: &[&[u8]], operator: Operator) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update([operator.tag()]);
    for checksum in checksums {
        hasher.update((checksum.len() as u32).to_le_bytes());
        hasher.update(checksum);
    }
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::bitmap_of;

    #[test]
    fn should_be_deterministic_for_identical_inputs() {
        // given
        let a = leaf_checksum(&bitmap_of(&[1, 2, 3])).unwrap();
        let b = leaf_checksum(&bitmap_of(&[4, 5])).unwrap();

        // when
        let first = combine_checksums(&[&a, &b], Operator::And);
        let second = combine_checksums(&[&a, &b], Operator::And);

        // then
        assert_eq!(first, second);
    }

    #[test]
    fn should_differ_by_operator() {
        // given
        let a = leaf_checksum(&bitmap_of(&[1, 2, 3])).unwrap();
        let b = leaf_checksum(&bitmap_of(&[4, 5])).unwrap();

        // when
        let anded = combine_checksums(&[&a, &b], Operator::And);
        let ored = combine_checksums(&[&a, &b], Operator::Or);

        // then
        assert_ne!(anded, ored);
    }

    #[test]
    fn should_differ_by_child_order() {
        // given
        let a = leaf_checksum(&bitmap_of(&[1])).unwrap();
        let b = leaf_checksum(&bitmap_of(&[2])).unwrap();

        // when / then
        assert_ne!(
            combine_checksums(&[&a, &b], Operator::Or),
            combine_checksums(&[&b, &a], Operator::Or)
        );
    }

    #[test]
    fn should_not_alias_across_checksum_boundaries() {
        // given - same concatenated bytes, different splits
        let ab = [1u8, 2, 3, 4];
        let a = [1u8, 2];
        let b = [3u8, 4];

        // when / then
        assert_ne!(
            combine_checksums(&[&ab], Operator::And),
            combine_checksums(&[&a, &b], Operator::And)
        );
    }

    #[test]
    fn should_distinguish_single_child_composite_from_leaf() {
        // given
        let leaf = leaf_checksum(&bitmap_of(&[1, 2, 3])).unwrap();

        // when
        let composite = combine_checksums(&[&leaf], Operator::And);

        // then
        assert_ne!(composite, leaf);
    }

    #[test]
    fn should_produce_equal_leaf_checksums_for_equal_bitmaps() {
        // given
        let a = bitmap_of(&[7, 8, 9]);
        let b = bitmap_of(&[9, 8, 7]);

        // when / then
        assert_eq!(leaf_checksum(&a).unwrap(), leaf_checksum(&b).unwrap());
    }
}
