//! Merge-comparison over two ordered key streams
//!
//! Walks two sorted streams in lock-step and emits a bounded sequence of
//! [`KeyDiff`] records without materializing either store. Linear in the
//! combined stream length, constant memory beyond the collected diffs.

use crate::error::Result;
use crate::report::KeyDiff;
use crate::store::OrderedKeyStream;
use std::cmp::Ordering;

/// How a merge run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStatus {
    /// Both streams were exhausted; every divergence up to the limit was seen.
    Completed,
    /// The diff limit was reached before both streams were exhausted.
    Truncated,
    /// A stream failed mid-iteration; diffs collected so far are retained.
    Aborted { message: String },
}

/// Result of one merge run.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub diffs: Vec<KeyDiff>,
    pub status: MergeStatus,
}

impl MergeOutcome {
    /// True when both streams were fully consumed and no divergence was
    /// found. Against unequal root hashes this signals a hashing or
    /// versioning inconsistency upstream, which callers must surface rather
    /// than drop.
    pub fn is_clean(&self) -> bool {
        self.diffs.is_empty() && self.status == MergeStatus::Completed
    }
}

/// Runs the merge-join over two ordered streams, emitting at most `limit`
/// diffs.
///
/// Both streams must yield strictly ascending keys with no duplicates; that
/// is the caller's precondition and is not enforced here. Stream errors end
/// the run with [`MergeStatus::Aborted`], keeping the partial output.
pub fn diff_streams<L, R>(left: &mut L, right: &mut R, limit: usize) -> MergeOutcome
where
    L: OrderedKeyStream + ?Sized,
    R: OrderedKeyStream + ?Sized,
{
    let mut diffs = Vec::new();
    let status = match run_merge(left, right, limit, &mut diffs) {
        Ok(true) => MergeStatus::Truncated,
        Ok(false) => MergeStatus::Completed,
        Err(e) => MergeStatus::Aborted {
            message: e.to_string(),
        },
    };
    MergeOutcome { diffs, status }
}

/// Inner loop; returns `true` when the limit cut the run short.
fn run_merge<L, R>(
    left: &mut L,
    right: &mut R,
    limit: usize,
    diffs: &mut Vec<KeyDiff>,
) -> Result<bool>
where
    L: OrderedKeyStream + ?Sized,
    R: OrderedKeyStream + ?Sized,
{
    let mut left_head = left.next_entry()?;
    let mut right_head = right.next_entry()?;

    loop {
        if left_head.is_none() && right_head.is_none() {
            return Ok(false);
        }
        if diffs.len() >= limit {
            return Ok(true);
        }

        match (&left_head, &right_head) {
            (Some((lk, lv)), None) => {
                diffs.push(KeyDiff::key_only_left(lk, lv));
                left_head = left.next_entry()?;
            }
            (None, Some((rk, rv))) => {
                diffs.push(KeyDiff::key_only_right(rk, rv));
                right_head = right.next_entry()?;
            }
            (Some((lk, lv)), Some((rk, rv))) => match lk.cmp(rk) {
                Ordering::Less => {
                    diffs.push(KeyDiff::key_only_left(lk, lv));
                    left_head = left.next_entry()?;
                }
                Ordering::Greater => {
                    diffs.push(KeyDiff::key_only_right(rk, rv));
                    right_head = right.next_entry()?;
                }
                Ordering::Equal => {
                    if lv != rv {
                        diffs.push(KeyDiff::value_differs(lk, lv, rv));
                    }
                    left_head = left.next_entry()?;
                    right_head = right.next_entry()?;
                }
            },
            (None, None) => unreachable!("checked above"),
        }
    }
}
