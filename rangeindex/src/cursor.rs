//! Layer cursors and the gap-filling adapter.
//!
//! The store hands out *sparse* cursors: only non-empty layers are yielded,
//! keys strictly ascending within 0..=64. The range reader's bit fold wants
//! a *dense* stream with one entry per bit position, holes included, which
//! is what [`GapFillingCursor`] provides.

use roaring::RoaringTreemap;

/// Cursor over the layers of one property's range index, sparsest form.
///
/// `first`/`next` yield `(key, additions)` pairs with keys in strictly
/// ascending order, all ≤ 64, `None` when exhausted. `close` releases any
/// underlying store resources and is idempotent.
pub trait LayerCursor: Send {
    fn first(&mut self) -> Option<(u8, RoaringTreemap)>;
    fn next(&mut self) -> Option<(u8, RoaringTreemap)>;

    fn close(&mut self) {}
}

impl<C: LayerCursor + ?Sized> LayerCursor for Box<C> {
    fn first(&mut self) -> Option<(u8, RoaringTreemap)> {
        (**self).first()
    }

    fn next(&mut self) -> Option<(u8, RoaringTreemap)> {
        (**self).next()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Adapts a sparse [`LayerCursor`] into a dense stream over bit positions
/// 0..=64, yielding `None` bitmaps for the positions the store skipped.
///
/// A two-state machine: before `first` the cursor is fresh; afterwards a
/// monotonic `next_key` counter walks the 65 positions exactly once. After
/// 65 emissions the cursor is terminal and `next` reports exhaustion.
pub struct GapFillingCursor<C: LayerCursor> {
    cursor: C,
    started: bool,
    next_key: u8,
    /// Next unconsumed entry of the wrapped cursor; `None` once exhausted.
    pending: Option<(u8, RoaringTreemap)>,
    closed: bool,
}

impl<C: LayerCursor> GapFillingCursor<C> {
    pub fn new(cursor: C) -> Self {
        Self {
            cursor,
            started: false,
            next_key: 0,
            pending: None,
            closed: false,
        }
    }

    /// Position at bit 0. Returns the slot-0 bitmap if the store has one,
    /// `None` otherwise; the outer `Some` always holds for `first`.
    pub fn first(&mut self) -> Option<(u8, Option<RoaringTreemap>)> {
        self.started = true;
        self.pending = self.cursor.first();
        self.next_key = 1;

        if matches!(&self.pending, Some((0, _))) {
            let (_, bitmap) = self.pending.take().expect("pending entry matched key 0");
            self.pending = self.cursor.next();
            return Some((0, Some(bitmap)));
        }
        Some((0, None))
    }

    /// Yield the next bit position, filling holes with `None` bitmaps.
    /// Exhausted after position 64.
    pub fn next(&mut self) -> Option<(u8, Option<RoaringTreemap>)> {
        if !self.started {
            return self.first();
        }

        if self.next_key > 64 {
            return None;
        }

        // catch the wrapped cursor up past any holes below the current key
        while matches!(&self.pending, Some((key, _)) if *key < self.next_key) {
            self.pending = self.cursor.next();
        }

        let key = self.next_key;
        self.next_key += 1;

        if matches!(&self.pending, Some((pending_key, _)) if *pending_key == key) {
            let (_, bitmap) = self.pending.take().expect("pending entry matched current key");
            self.pending = self.cursor.next();
            return Some((key, Some(bitmap)));
        }
        Some((key, None))
    }

    /// Close the wrapped cursor. Further calls are no-ops.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.cursor.close();
        }
    }
}

impl<C: LayerCursor> Drop for GapFillingCursor<C> {
    fn drop(&mut self) {
        self.close();
    }
}
