//! Comparison report data model and assembly
//!
//! Everything the comparison produces is a plain value object: built once,
//! attached to its parent, never mutated afterwards. Binary keys, values and
//! hashes cross the JSON boundary as lowercase hex.

use crate::shape::ShapeDiff;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Byte string serialized as lowercase hex on the wire.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HexBytes(pub Vec<u8>);

impl HexBytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    /// Lowercase hex rendering, as used in reports and log lines.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl std::fmt::Debug for HexBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HexBytes({})", self.to_hex())
    }
}

impl std::fmt::Display for HexBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Vec<u8>> for HexBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for HexBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl Serialize for HexBytes {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s)
            .map(HexBytes)
            .map_err(serde::de::Error::custom)
    }
}

/// How a single key diverges between the two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyDiffKind {
    KeyOnlyLeft,
    KeyOnlyRight,
    ValueDiffers,
}

/// One divergent key.
///
/// `key_only_left` carries only `value_left`, `key_only_right` only
/// `value_right`; `value_differs` always carries both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDiff {
    pub kind: KeyDiffKind,
    pub key: HexBytes,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value_left: Option<HexBytes>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value_right: Option<HexBytes>,
}

impl KeyDiff {
    pub fn key_only_left(key: &[u8], value: &[u8]) -> Self {
        Self {
            kind: KeyDiffKind::KeyOnlyLeft,
            key: key.into(),
            value_left: Some(value.into()),
            value_right: None,
        }
    }

    pub fn key_only_right(key: &[u8], value: &[u8]) -> Self {
        Self {
            kind: KeyDiffKind::KeyOnlyRight,
            key: key.into(),
            value_left: None,
            value_right: Some(value.into()),
        }
    }

    pub fn value_differs(key: &[u8], value_left: &[u8], value_right: &[u8]) -> Self {
        Self {
            kind: KeyDiffKind::ValueDiffers,
            key: key.into(),
            value_left: Some(value_left.into()),
            value_right: Some(value_right.into()),
        }
    }
}

/// Classification of one named store across the two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreStatus {
    Match,
    Differ,
    MissingInLeft,
    MissingInRight,
}

impl StoreStatus {
    /// True for any status other than `Match`.
    pub fn is_divergent(self) -> bool {
        !matches!(self, StoreStatus::Match)
    }

    pub fn is_missing(self) -> bool {
        matches!(self, StoreStatus::MissingInLeft | StoreStatus::MissingInRight)
    }
}

/// Per-store comparison result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDiff {
    pub name: String,
    pub status: StoreStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hash_left: Option<HexBytes>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hash_right: Option<HexBytes>,
    /// Divergent keys, populated only for `differ` stores, capped at the
    /// configured limit.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub key_diffs: Vec<KeyDiff>,
    /// True when the key diff hit the configured limit before exhausting
    /// both streams.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub truncated: bool,
    /// True when iteration failed mid-stream; the diffs collected up to the
    /// failure are retained.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub partial: bool,
    /// Small sample of keys from the side that has the store, for missing
    /// stores only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sample_keys: Option<Vec<HexBytes>>,
    /// Human-readable explanation for incomparable stores, mid-stream
    /// aborts and hash/content anomalies.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub note: Option<String>,
    /// Coarse positional shape diff, attached when requested or when the
    /// key-level diff came back empty despite differing hashes.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub shape: Option<ShapeDiff>,
}

impl StoreDiff {
    pub fn new(
        name: impl Into<String>,
        status: StoreStatus,
        hash_left: Option<Vec<u8>>,
        hash_right: Option<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            status,
            hash_left: hash_left.map(HexBytes),
            hash_right: hash_right.map(HexBytes),
            key_diffs: Vec::new(),
            truncated: false,
            partial: false,
            sample_keys: None,
            note: None,
            shape: None,
        }
    }
}

/// Summary tallies over all store statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub total: usize,
    pub matching: usize,
    pub differing: usize,
    pub missing: usize,
    pub is_identical: bool,
}

/// Top-level comparison result, serializable as the JSON wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub format_version: String,
    pub generated_at: DateTime<Utc>,
    pub version_left: i64,
    pub version_right: i64,
    pub summary: DiffSummary,
    /// Per-store results in ascending store-name order.
    pub diffs: Vec<StoreDiff>,
}

impl ComparisonReport {
    pub fn is_identical(&self) -> bool {
        self.summary.is_identical
    }
}

/// Folds per-store results into one report.
///
/// Entries are sorted by store name so reports for identical inputs are
/// reproducible regardless of the iteration order of the underlying sets.
pub fn assemble_report(
    version_left: i64,
    version_right: i64,
    mut diffs: Vec<StoreDiff>,
) -> ComparisonReport {
    diffs.sort_by(|a, b| a.name.cmp(&b.name));

    let total = diffs.len();
    let matching = diffs
        .iter()
        .filter(|d| d.status == StoreStatus::Match)
        .count();
    let differing = diffs
        .iter()
        .filter(|d| d.status == StoreStatus::Differ)
        .count();
    let missing = diffs.iter().filter(|d| d.status.is_missing()).count();

    ComparisonReport {
        format_version: crate::FORMAT_VERSION.to_string(),
        generated_at: Utc::now(),
        version_left,
        version_right,
        summary: DiffSummary {
            total,
            matching,
            differing,
            missing,
            is_identical: differing == 0 && missing == 0,
        },
        diffs,
    }
}
