//! Root hash classification across two store sets
//!
//! Pure comparison over two `name -> root hash` mappings: the union of
//! store names, sorted ascending, each classified as matching, differing,
//! or present on only one side. Hash equality is byte-exact; hashes are
//! opaque engine-provided values.

use crate::report::{StoreDiff, StoreStatus};
use crate::store::StoreSet;
use std::collections::{BTreeMap, BTreeSet};

/// Classifies every store in the union of both mappings.
///
/// Output is ordered by ascending store name, making reports deterministic
/// and diffable across runs. No key-level detail is produced here.
pub fn classify_stores(
    left: &BTreeMap<String, Vec<u8>>,
    right: &BTreeMap<String, Vec<u8>>,
) -> Vec<StoreDiff> {
    let names: BTreeSet<&String> = left.keys().chain(right.keys()).collect();

    names
        .into_iter()
        .map(|name| {
            let hash_left = left.get(name).cloned();
            let hash_right = right.get(name).cloned();
            let status = match (&hash_left, &hash_right) {
                (Some(l), Some(r)) if l == r => StoreStatus::Match,
                (Some(_), Some(_)) => StoreStatus::Differ,
                (Some(_), None) => StoreStatus::MissingInRight,
                (None, Some(_)) => StoreStatus::MissingInLeft,
                (None, None) => unreachable!("name came from the union"),
            };
            StoreDiff::new(name.clone(), status, hash_left, hash_right)
        })
        .collect()
}

/// Convenience wrapper extracting the hash mappings from two opened sets.
pub fn classify_store_sets(left: &dyn StoreSet, right: &dyn StoreSet) -> Vec<StoreDiff> {
    classify_stores(&left.root_hashes(), &right.root_hashes())
}
