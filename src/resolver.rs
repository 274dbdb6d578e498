//! Per-store diff resolution and comparison orchestration
//!
//! [`StoreDiffResolver`] takes the classification produced by the root hash
//! comparison and fills in key-level detail: bounded merge diffs for
//! differing stores, key samples for missing stores, and notes for
//! incomparable stores and hash/content anomalies. Per-store work is
//! independent, so resolution fans out over a rayon pool by default and is
//! collected back into deterministic name-sorted order.

use crate::error::{Result, StorediffError};
use crate::hashcmp::classify_store_sets;
use crate::merge_diff::{diff_streams, MergeStatus};
use crate::report::{assemble_report, ComparisonReport, HexBytes, StoreDiff, StoreStatus};
use crate::shape::shape_diff_streams;
use crate::store::{IterationCapability, StoreSet};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Note attached when a differing store cannot be compared key-by-key.
const NOTE_INCOMPARABLE: &str =
    "store does not expose an ordered iteration capability on both sides; contents not compared";

/// Note attached when full iteration found no divergent keys despite
/// unequal root hashes.
const NOTE_HASH_ANOMALY: &str =
    "keys match but root hash differs; possible hashing or store versioning inconsistency";

/// Tunables for one comparison run.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Maximum key diffs collected per differing store.
    pub key_diff_limit: usize,
    /// Keys sampled from stores present on only one side.
    pub sample_keys: usize,
    /// Force the coarse shape diff for every differing store, not just on
    /// hash/content anomalies.
    pub shape_diff: bool,
    /// Maximum mismatching positions recorded by the shape diff.
    pub shape_mismatch_limit: usize,
    /// Resolve stores concurrently on the rayon pool.
    pub parallel: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            key_diff_limit: crate::DEFAULT_KEY_DIFF_LIMIT,
            sample_keys: crate::DEFAULT_SAMPLE_KEYS,
            shape_diff: false,
            shape_mismatch_limit: crate::DEFAULT_SHAPE_MISMATCH_LIMIT,
            parallel: true,
        }
    }
}

/// Cooperative cancellation flag with an optional deadline.
///
/// Checked between store-level units of work, not mid-stream; a cancelled
/// comparison aborts at the next store boundary with every open stream
/// released on the way out.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that trips automatically after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }

    /// Errors with [`StorediffError::Cancelled`] once tripped.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(StorediffError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Which external capability a differing store is compared through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareStrategy {
    TreeOrdered,
    GenericKeyValue,
}

/// Fills in key-level detail for classified stores.
pub struct StoreDiffResolver<'a> {
    left: &'a dyn StoreSet,
    right: &'a dyn StoreSet,
    options: DiffOptions,
}

impl<'a> StoreDiffResolver<'a> {
    pub fn new(left: &'a dyn StoreSet, right: &'a dyn StoreSet, options: DiffOptions) -> Self {
        Self {
            left,
            right,
            options,
        }
    }

    /// Resolves every classified store, concurrently when configured.
    ///
    /// Both paths produce identical output for identical inputs; the
    /// parallel path preserves input order on collection.
    pub fn resolve_all(
        &self,
        classified: Vec<StoreDiff>,
        cancel: &CancelToken,
    ) -> Result<Vec<StoreDiff>> {
        if self.options.parallel {
            classified
                .into_par_iter()
                .map(|diff| {
                    cancel.checkpoint()?;
                    Ok(self.resolve_one(diff))
                })
                .collect()
        } else {
            classified
                .into_iter()
                .map(|diff| {
                    cancel.checkpoint()?;
                    Ok(self.resolve_one(diff))
                })
                .collect()
        }
    }

    fn resolve_one(&self, diff: StoreDiff) -> StoreDiff {
        match diff.status {
            StoreStatus::Match => diff,
            StoreStatus::Differ => self.resolve_differing(diff),
            StoreStatus::MissingInRight => self.attach_sample(diff, self.left),
            StoreStatus::MissingInLeft => self.attach_sample(diff, self.right),
        }
    }

    /// Picks a comparison strategy from the capabilities both sides
    /// resolved at open time. Tree-ordered comparison requires structural
    /// iteration on both sides; otherwise any ordered capability on both
    /// sides allows the generic comparison.
    fn pick_strategy(&self, name: &str) -> Option<CompareStrategy> {
        let left = self.left.capability(name);
        let right = self.right.capability(name);
        match (left, right) {
            (IterationCapability::Tree, IterationCapability::Tree) => {
                Some(CompareStrategy::TreeOrdered)
            }
            (l, r) if l.is_ordered() && r.is_ordered() => Some(CompareStrategy::GenericKeyValue),
            _ => None,
        }
    }

    fn resolve_differing(&self, mut diff: StoreDiff) -> StoreDiff {
        let name = diff.name.clone();
        let strategy = match self.pick_strategy(&name) {
            Some(strategy) => strategy,
            None => {
                log::warn!("store '{}' is incomparable, skipping key diff", name);
                diff.note = Some(NOTE_INCOMPARABLE.to_string());
                return diff;
            }
        };

        log::debug!("diffing store '{}' via {:?}", name, strategy);

        let streams = match strategy {
            CompareStrategy::TreeOrdered => (
                self.left.open_tree_stream(&name),
                self.right.open_tree_stream(&name),
            ),
            CompareStrategy::GenericKeyValue => {
                (self.left.open_stream(&name), self.right.open_stream(&name))
            }
        };
        let (mut left_stream, mut right_stream) = match streams {
            (Ok(l), Ok(r)) => (l, r),
            (l, r) => {
                let message = l.err().or(r.err()).map(|e| e.to_string()).unwrap_or_default();
                diff.partial = true;
                diff.note = Some(format!("failed to open ordered stream: {}", message));
                return diff;
            }
        };

        let outcome = diff_streams(
            &mut *left_stream,
            &mut *right_stream,
            self.options.key_diff_limit,
        );
        drop(left_stream);
        drop(right_stream);

        let clean = outcome.is_clean();
        diff.key_diffs = outcome.diffs;
        match outcome.status {
            MergeStatus::Completed => {}
            MergeStatus::Truncated => diff.truncated = true,
            MergeStatus::Aborted { message } => {
                diff.partial = true;
                diff.note = Some(format!("comparison aborted mid-stream: {}", message));
            }
        }

        if clean {
            diff.note = Some(NOTE_HASH_ANOMALY.to_string());
        }
        // The positional shape diff is only a coarse fallback; run it on
        // anomalies, or for every differing store when explicitly requested.
        if clean || self.options.shape_diff {
            diff.shape = self.run_shape_diff(&name);
        }

        diff
    }

    fn run_shape_diff(&self, name: &str) -> Option<crate::shape::ShapeDiff> {
        let left = self.left.open_stream(name);
        let right = self.right.open_stream(name);
        match (left, right) {
            (Ok(mut l), Ok(mut r)) => {
                match shape_diff_streams(&mut *l, &mut *r, self.options.shape_mismatch_limit) {
                    Ok(shape) => Some(shape),
                    Err(e) => {
                        log::warn!("shape diff failed for store '{}': {}", name, e);
                        None
                    }
                }
            }
            _ => None,
        }
    }

    /// First few keys from the side that has the store, for human
    /// orientation. Best-effort: sampling failures only log.
    fn attach_sample(&self, mut diff: StoreDiff, owner: &dyn StoreSet) -> StoreDiff {
        if self.options.sample_keys == 0 {
            return diff;
        }
        match self.collect_sample(owner, &diff.name) {
            Ok(sample) => diff.sample_keys = Some(sample),
            Err(e) => {
                log::debug!("could not sample keys from store '{}': {}", diff.name, e);
            }
        }
        diff
    }

    fn collect_sample(&self, owner: &dyn StoreSet, name: &str) -> Result<Vec<HexBytes>> {
        let mut stream = owner.open_stream(name)?;
        let mut sample = Vec::with_capacity(self.options.sample_keys);
        while sample.len() < self.options.sample_keys {
            match stream.next_entry()? {
                Some((key, _)) => sample.push(HexBytes(key)),
                None => break,
            }
        }
        Ok(sample)
    }
}

/// Runs a complete comparison: classification, per-store resolution, report
/// assembly. The only fatal errors past this point are cancellation and
/// resource failures; per-store problems are folded into the report.
pub fn compare_store_sets(
    left: &dyn StoreSet,
    right: &dyn StoreSet,
    options: DiffOptions,
    cancel: &CancelToken,
) -> Result<ComparisonReport> {
    let classified = classify_store_sets(left, right);
    log::info!(
        "classified {} stores (left version {}, right version {})",
        classified.len(),
        left.version(),
        right.version()
    );

    let resolver = StoreDiffResolver::new(left, right, options);
    let resolved = resolver.resolve_all(classified, cancel)?;

    Ok(assemble_report(left.version(), right.version(), resolved))
}
