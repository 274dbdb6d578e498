//! # storediff
//!
//! A snapshot comparison tool for versioned multi-store state databases:
//! compares two snapshots of a set of named, hash-addressed ordered stores
//! sharing one commit version, and reports exactly where they diverge.

pub mod acquire;
pub mod cli;
pub mod commands;
pub mod error;
pub mod hashcmp;
pub mod merge_diff;
pub mod output;
pub mod progress;
pub mod report;
pub mod resolver;
pub mod server;
pub mod shape;
pub mod snapshot;
pub mod store;

pub use error::{Result, StorediffError};
pub use report::{ComparisonReport, KeyDiff, KeyDiffKind, StoreDiff, StoreStatus};
pub use resolver::{compare_store_sets, CancelToken, DiffOptions};
pub use store::{IterationCapability, MemoryStoreSet, OrderedKeyStream, StoreSet};

/// Current format version for storediff manifests and reports
pub const FORMAT_VERSION: &str = "1.0.0";

/// Default cap on divergent keys reported per store
pub const DEFAULT_KEY_DIFF_LIMIT: usize = 10;

/// Default number of keys sampled from stores present on only one side
pub const DEFAULT_SAMPLE_KEYS: usize = 3;

/// Default cap on positions recorded by the coarse shape diff
pub const DEFAULT_SHAPE_MISMATCH_LIMIT: usize = 20;
