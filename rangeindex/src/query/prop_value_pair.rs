//! Boolean filter tree.
//!
//! A [`PropValuePair`] is either a leaf predicate on one property or an
//! AND/OR node over child pairs. Evaluation runs in two phases: `fetch`
//! resolves every leaf to a doc bitmap (children concurrently, first error
//! wins), then `merge` folds the tree bottom-up into one candidate set.

use std::borrow::Cow;

use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use roaring::RoaringTreemap;
use tokio_util::sync::CancellationToken;

use crate::bitmap::condense;
use crate::error::{Error, Result};
use crate::model::{Operator, missing_bucket_error, resolve_bucket};
use crate::query::checksum::combine_checksums;
use crate::query::searcher::{DocBitmap, Searcher};

/// How many children get per-child stats in merge logs.
const LOG_CHILDREN_TRUNCATE: usize = 20;

/// One node of a boolean filter tree.
pub struct PropValuePair {
    /// Property the predicate applies to; rewritten during fetch for legacy
    /// and derived properties.
    pub prop: String,
    pub operator: Operator,
    /// Predicate value, pre-encoded to an order-preserving u64.
    pub value: u64,
    pub children: Vec<PropValuePair>,
    doc_ids: DocBitmap,
}

impl PropValuePair {
    /// Leaf predicate `prop <operator> value`.
    pub fn leaf(prop: impl Into<String>, operator: Operator, value: u64) -> Self {
        Self {
            prop: prop.into(),
            operator,
            value,
            children: Vec::new(),
            doc_ids: DocBitmap::new(),
        }
    }

    /// Conjunction over `children`.
    pub fn and(children: Vec<PropValuePair>) -> Self {
        Self::inner(Operator::And, children)
    }

    /// Disjunction over `children`.
    pub fn or(children: Vec<PropValuePair>) -> Self {
        Self::inner(Operator::Or, children)
    }

    fn inner(operator: Operator, children: Vec<PropValuePair>) -> Self {
        Self {
            prop: String::new(),
            operator,
            value: 0,
            children,
            doc_ids: DocBitmap::new(),
        }
    }

    /// The doc bitmap fetched for this leaf.
    pub fn doc_ids(&self) -> &DocBitmap {
        &self.doc_ids
    }

    /// Phase 1: materialize leaf bitmaps, fanning out over children.
    ///
    /// Leaves resolve their bucket (with legacy-id and derived-property
    /// rewrites) and fail with a remediation message if the bucket does not
    /// exist. Children of a boolean node are fetched concurrently; the
    /// first error drops the remaining siblings and propagates, wrapped
    /// with the child's index. Cancellation propagates unwrapped.
    pub fn fetch_doc_ids<'a, S>(
        &'a mut self,
        searcher: &'a S,
        limit: usize,
        skip_cache: bool,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<()>>
    where
        S: Searcher + ?Sized,
    {
        async move {
            if self.operator.on_value() {
                let resolution = resolve_bucket(&self.prop, self.operator);
                self.prop = resolution.prop.clone();

                if !searcher.has_bucket(&resolution.bucket)
                    && self.operator != Operator::WithinGeoRange
                {
                    // geo filters are not served by this index, so a missing
                    // bucket is only fatal for the other operators
                    return Err(missing_bucket_error(&resolution, self.operator));
                }

                self.doc_ids = searcher
                    .doc_bitmap(
                        cancel,
                        &resolution.bucket,
                        limit,
                        self.operator,
                        self.value,
                        skip_cache,
                    )
                    .await?;
                return Ok(());
            }

            // Children run with limit 0 (unlimited): applying the outer
            // limit per child would truncate before the merge and undercount
            // the final result.
            try_join_all(self.children.iter_mut().enumerate().map(|(index, child)| {
                child
                    .fetch_doc_ids(searcher, 0, skip_cache, cancel)
                    .map(move |result| result.map_err(|err| Error::wrap_nested(index, err)))
            }))
            .await?;
            Ok(())
        }
        .boxed()
    }

    /// Phase 2: fold children left-to-right under this node's operator.
    ///
    /// Leaves return their fetched bitmap by reference. When a cacheable
    /// node's children all carry the same checksum the first child is
    /// returned as-is, without allocating a merged bitmap.
    pub fn merge_doc_ids(&self) -> Result<Cow<'_, DocBitmap>> {
        if self.operator.on_value() {
            return Ok(Cow::Borrowed(&self.doc_ids));
        }

        if !matches!(self.operator, Operator::And | Operator::Or) {
            return Err(Error::InvalidQuery(format!(
                "unsupported operator: {}",
                self.operator.name()
            )));
        }
        if self.children.is_empty() {
            return Err(Error::InvalidQuery(format!(
                "no children for operator: {}",
                self.operator.name()
            )));
        }

        let mut child_bitmaps = Vec::with_capacity(self.children.len());
        for (index, child) in self.children.iter().enumerate() {
            let bitmap = child
                .merge_doc_ids()
                .map_err(|err| Error::wrap_nested(index, err))?;
            child_bitmaps.push(bitmap);
        }

        if self.cacheable() && checksums_identical(&child_bitmaps) {
            // all children are identical, no need to merge, simply return
            // the first
            return Ok(child_bitmaps.swap_remove(0));
        }

        let log_id = rand::random::<u64>();
        log_before_merge(log_id, self.operator, &child_bitmaps);

        let intersect = self.operator == Operator::And;
        let mut merged = child_bitmaps[0].doc_ids.clone();
        for child in &child_bitmaps[1..] {
            if intersect {
                merged &= &child.doc_ids;
            } else {
                merged |= &child.doc_ids;
            }
        }
        let merged = condense(&merged);

        log_after_merge(log_id, self.operator, child_bitmaps.len(), &merged);

        let checksums: Vec<&[u8]> = child_bitmaps
            .iter()
            .map(|child| child.checksum.as_slice())
            .collect();
        Ok(Cow::Owned(DocBitmap {
            checksum: combine_checksums(&checksums, self.operator),
            doc_ids: merged,
        }))
    }

    /// A node is cacheable when every leaf below it carries a checksum.
    /// Only cacheable nodes may short-circuit on identical children; their
    /// bitmaps are treated as read-only by upstream consumers.
    fn cacheable(&self) -> bool {
        if self.operator.on_value() {
            !self.doc_ids.checksum.is_empty()
        } else {
            self.children.iter().all(|child| child.cacheable())
        }
    }
}

fn checksums_identical(child_bitmaps: &[Cow<'_, DocBitmap>]) -> bool {
    let Some(first) = child_bitmaps.first() else {
        return false;
    };
    if first.checksum.is_empty() {
        return false;
    }
    child_bitmaps
        .iter()
        .all(|child| child.checksum == first.checksum)
}

fn log_before_merge(log_id: u64, operator: Operator, child_bitmaps: &[Cow<'_, DocBitmap>]) {
    let children: Vec<(u64, Option<u64>, Option<u64>)> = child_bitmaps
        .iter()
        .take(LOG_CHILDREN_TRUNCATE)
        .map(|child| (child.doc_ids.len(), child.doc_ids.min(), child.doc_ids.max()))
        .collect();

    tracing::debug!(
        log_id,
        operator = operator.name(),
        children_count = child_bitmaps.len(),
        children_stats = ?children,
        "before merge - per-child results truncated to {} children",
        LOG_CHILDREN_TRUNCATE
    );
}

fn log_after_merge(log_id: u64, operator: Operator, children_count: usize, merged: &RoaringTreemap) {
    tracing::debug!(
        log_id,
        operator = operator.name(),
        children_count,
        doc_id_count = merged.len(),
        doc_id_min = ?merged.min(),
        doc_id_max = ?merged.max(),
        "merged filter children"
    );
}
