//! Range predicate evaluation over bit-sliced layers.
//!
//! A [`RangeReader`] answers one `(operator, value)` predicate by folding
//! AND/OR over the 64 bit-slice bitmaps, walking them once LSB→MSB through a
//! dense [`GapFillingCursor`]. For a threshold T the fold computes
//! `{doc : value(doc) ≥ T}`: at each position, an AND (T has the bit)
//! demands agreement above that bit, an OR (T lacks the bit) admits docs
//! that already exceed T at a higher position. Every other operator is
//! derived from that fold plus the presence set.

use roaring::RoaringTreemap;
use tokio_util::sync::CancellationToken;

use crate::cursor::{GapFillingCursor, LayerCursor};
use crate::error::{Error, Result};
use crate::model::Operator;

/// Boxed layer cursor as produced by a cursor factory.
pub type BoxedLayerCursor = Box<dyn LayerCursor>;

/// Evaluates a single range predicate against one property's index.
///
/// The factory is invoked once per read to obtain a fresh layer cursor;
/// cursors are not restartable, so operators needing two thresholds (EQ, NE)
/// fold both in a single pass.
pub struct RangeReader<F>
where
    F: Fn() -> BoxedLayerCursor,
{
    value: u64,
    operator: Operator,
    cursor_fn: F,
}

impl<F> RangeReader<F>
where
    F: Fn() -> BoxedLayerCursor,
{
    pub fn new(value: u64, operator: Operator, cursor_fn: F) -> Self {
        Self {
            value,
            operator,
            cursor_fn,
        }
    }

    /// Evaluate the predicate, returning the matching doc ids.
    pub fn read(&self, cancel: &CancellationToken) -> Result<RoaringTreemap> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match self.operator {
            Operator::GreaterThan => self.greater_than(self.value, cancel),
            Operator::GreaterThanEqual => self.greater_than_equal(self.value, cancel),
            Operator::LessThan => self.less_than(self.value, cancel),
            Operator::LessThanEqual => self.less_than_equal(self.value, cancel),
            Operator::Equal => self.equal(self.value, cancel),
            Operator::NotEqual => self.not_equal(self.value, cancel),
            op => Err(Error::UnsupportedOperator(op)),
        }
    }

    fn greater_than_equal(
        &self,
        value: u64,
        cancel: &CancellationToken,
    ) -> Result<RoaringTreemap> {
        let Some((presence, mut cursor)) = self.non_null_with_cursor(cancel)? else {
            return Ok(RoaringTreemap::new());
        };

        // all values are >= 0
        if value == 0 {
            cursor.close();
            return Ok(presence);
        }

        let result = merge_greater_than_equal(presence, &mut cursor, value, cancel);
        cursor.close();
        result
    }

    fn greater_than(&self, value: u64, cancel: &CancellationToken) -> Result<RoaringTreemap> {
        // no value is > max u64
        if value == u64::MAX {
            return Ok(RoaringTreemap::new());
        }

        self.greater_than_equal(value + 1, cancel)
    }

    fn less_than_equal(&self, value: u64, cancel: &CancellationToken) -> Result<RoaringTreemap> {
        let Some((mut presence, mut cursor)) = self.non_null_with_cursor(cancel)? else {
            return Ok(RoaringTreemap::new());
        };

        // all values are <= max u64
        if value == u64::MAX {
            cursor.close();
            return Ok(presence);
        }

        let partial = merge_greater_than_equal(presence.clone(), &mut cursor, value + 1, cancel);
        cursor.close();
        presence -= &partial?;
        Ok(presence)
    }

    fn less_than(&self, value: u64, cancel: &CancellationToken) -> Result<RoaringTreemap> {
        // no value is < 0
        if value == 0 {
            return Ok(RoaringTreemap::new());
        }

        let Some((mut presence, mut cursor)) = self.non_null_with_cursor(cancel)? else {
            return Ok(RoaringTreemap::new());
        };

        let partial = merge_greater_than_equal(presence.clone(), &mut cursor, value, cancel);
        cursor.close();
        presence -= &partial?;
        Ok(presence)
    }

    fn equal(&self, value: u64, cancel: &CancellationToken) -> Result<RoaringTreemap> {
        if value == 0 {
            return self.less_than_equal(0, cancel);
        }
        if value == u64::MAX {
            return self.greater_than_equal(u64::MAX, cancel);
        }

        let Some((presence, mut cursor)) = self.non_null_with_cursor(cancel)? else {
            return Ok(RoaringTreemap::new());
        };

        let result = merge_equal(presence, &mut cursor, value, cancel);
        cursor.close();
        result
    }

    fn not_equal(&self, value: u64, cancel: &CancellationToken) -> Result<RoaringTreemap> {
        if value == 0 {
            return self.greater_than(0, cancel);
        }
        if value == u64::MAX {
            return self.less_than(u64::MAX, cancel);
        }

        let Some((mut presence, mut cursor)) = self.non_null_with_cursor(cancel)? else {
            return Ok(RoaringTreemap::new());
        };

        let equal = merge_equal(presence.clone(), &mut cursor, value, cancel);
        cursor.close();
        presence -= &equal?;
        Ok(presence)
    }

    /// Open a dense cursor and pull the slot-0 presence bitmap.
    ///
    /// `None` means no docs are indexed and the caller should produce an
    /// empty result. Cancellation is only checked once the presence bitmap
    /// is known non-empty. The cursor is closed on every early exit.
    fn non_null_with_cursor(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<(RoaringTreemap, GapFillingCursor<BoxedLayerCursor>)>> {
        let mut cursor = GapFillingCursor::new((self.cursor_fn)());

        let presence = match cursor.first() {
            Some((_, Some(bitmap))) if !bitmap.is_empty() => bitmap,
            _ => {
                cursor.close();
                return Ok(None);
            }
        };

        if cancel.is_cancelled() {
            cursor.close();
            return Err(Error::Cancelled);
        }

        Ok(Some((presence, cursor)))
    }
}

/// Fold `result` towards `{doc : value(doc) >= threshold}` over bit
/// positions 1..=64 of the cursor. Missing slices are empty sets: AND with
/// an empty slice clears the candidates, OR is a no-op.
fn merge_greater_than_equal(
    mut result: RoaringTreemap,
    cursor: &mut GapFillingCursor<BoxedLayerCursor>,
    threshold: u64,
    cancel: &CancellationToken,
) -> Result<RoaringTreemap> {
    while let Some((bit, slice)) = cursor.next() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        apply_slice(&mut result, threshold & (1 << (bit - 1)) != 0, &slice);
    }

    Ok(result)
}

/// Single-pass `{doc : value(doc) == value}`: fold `>= value` and
/// `>= value + 1` in parallel over one cursor walk, then subtract.
/// Callers guarantee `0 < value < u64::MAX`.
fn merge_equal(
    presence: RoaringTreemap,
    cursor: &mut GapFillingCursor<BoxedLayerCursor>,
    value: u64,
    cancel: &CancellationToken,
) -> Result<RoaringTreemap> {
    let mut ge_value = presence.clone();
    let mut ge_next = presence;

    while let Some((bit, slice)) = cursor.next() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mask = 1 << (bit - 1);
        apply_slice(&mut ge_value, value & mask != 0, &slice);
        apply_slice(&mut ge_next, (value + 1) & mask != 0, &slice);
    }

    ge_value -= &ge_next;
    Ok(ge_value)
}

fn apply_slice(result: &mut RoaringTreemap, threshold_bit_set: bool, slice: &Option<RoaringTreemap>) {
    match (slice, threshold_bit_set) {
        (Some(bitmap), true) => *result &= bitmap,
        (Some(bitmap), false) => *result |= bitmap,
        (None, true) => result.clear(),
        (None, false) => {}
    }
}
