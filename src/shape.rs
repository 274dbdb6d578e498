//! Coarse positional shape diff
//!
//! Renders each store as ordered `hex(key)=hex(value)` lines and compares
//! the two renderings position-by-position. This is NOT a key-aligned or
//! sequence-alignment diff: one inserted or deleted line shifts every
//! subsequent position, so everything after the insertion point reads as
//! mismatched even when the content is identical. That limitation is part
//! of this check's contract; it exists as a cheap structural sanity check
//! for the case where the key-level merge diff found nothing yet the root
//! hashes still differ.

use crate::error::Result;
use crate::store::OrderedKeyStream;
use serde::{Deserialize, Serialize};

/// One mismatched line position. `None` on a side means that side's
/// rendering ended before this position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeMismatch {
    pub position: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub left: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub right: Option<String>,
}

/// Positional comparison of the two renderings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeDiff {
    pub lines_left: u64,
    pub lines_right: u64,
    /// First mismatching positions, capped at the configured limit.
    pub mismatches: Vec<ShapeMismatch>,
    /// True when more mismatches existed than were recorded.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub truncated: bool,
}

impl ShapeDiff {
    pub fn is_identical(&self) -> bool {
        self.mismatches.is_empty() && !self.truncated && self.lines_left == self.lines_right
    }
}

fn render_line(key: &[u8], value: &[u8]) -> String {
    format!("{}={}", hex::encode(key), hex::encode(value))
}

/// Walks both streams in lock-step, recording up to `mismatch_limit`
/// positions where the renderings disagree. Total line counts are always
/// exact, even past the mismatch cap.
pub fn shape_diff_streams<L, R>(
    left: &mut L,
    right: &mut R,
    mismatch_limit: usize,
) -> Result<ShapeDiff>
where
    L: OrderedKeyStream + ?Sized,
    R: OrderedKeyStream + ?Sized,
{
    let mut lines_left = 0u64;
    let mut lines_right = 0u64;
    let mut mismatches = Vec::new();
    let mut truncated = false;
    let mut position = 0u64;

    loop {
        let l = left.next_entry()?;
        let r = right.next_entry()?;

        if l.is_some() {
            lines_left += 1;
        }
        if r.is_some() {
            lines_right += 1;
        }

        match (l, r) {
            (None, None) => break,
            (l, r) => {
                let left_line = l.map(|(k, v)| render_line(&k, &v));
                let right_line = r.map(|(k, v)| render_line(&k, &v));
                if left_line != right_line {
                    if mismatches.len() < mismatch_limit {
                        mismatches.push(ShapeMismatch {
                            position,
                            left: left_line,
                            right: right_line,
                        });
                    } else {
                        truncated = true;
                    }
                }
            }
        }
        position += 1;
    }

    Ok(ShapeDiff {
        lines_left,
        lines_right,
        mismatches,
        truncated,
    })
}
