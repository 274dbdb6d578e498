//! Store set and ordered key stream abstractions
//!
//! A [`StoreSet`] is one opened snapshot of the storage engine at a single
//! commit version: a collection of named sub-stores, each summarized by a
//! root hash and readable as an ordered stream of key/value pairs. The
//! comparison engine consumes nothing but these two traits, so any backend
//! that can enumerate its stores in ascending key order can be diffed.

use crate::error::Result;
use std::collections::BTreeMap;

/// Forward iteration over a store's key/value pairs in ascending
/// byte-lexicographic key order.
///
/// Streams are single-pass; to restart, open a fresh stream from the owning
/// [`StoreSet`]. Dropping the stream releases its underlying resources.
pub trait OrderedKeyStream {
    /// Returns the next `(key, value)` pair, or `None` when exhausted.
    ///
    /// Keys must be strictly ascending with no duplicates within one stream.
    fn next_entry(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
}

/// How a named store can be iterated, resolved once when the store set is
/// opened rather than re-probed per comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationCapability {
    /// The store exposes a structural stream in natural tree-traversal order.
    Tree,
    /// The store exposes a plain sorted key/value stream.
    KeyValue,
    /// The store cannot be iterated (e.g. transient or in-memory only).
    Unsupported,
}

impl IterationCapability {
    /// True when the store can be walked in order at all.
    pub fn is_ordered(self) -> bool {
        !matches!(self, IterationCapability::Unsupported)
    }
}

/// One snapshot of the storage engine at one commit version.
///
/// Implementations are read-only for the duration of a comparison and safe
/// to share across worker threads; each worker opens its own streams.
pub trait StoreSet: Send + Sync {
    /// Commit version this set was opened at.
    fn version(&self) -> i64;

    /// Names of all sub-stores present in this snapshot.
    fn store_names(&self) -> Vec<String>;

    /// Root hash of the named store, or `None` if the store is absent.
    fn root_hash(&self, name: &str) -> Option<Vec<u8>>;

    /// Iteration capability of the named store. `Unsupported` for absent
    /// stores.
    fn capability(&self, name: &str) -> IterationCapability;

    /// Opens a generic sorted key/value stream over the named store.
    fn open_stream<'a>(&'a self, name: &str) -> Result<Box<dyn OrderedKeyStream + 'a>>;

    /// Opens a structural stream in tree-traversal order.
    ///
    /// For backends whose tree traversal coincides with sorted key order the
    /// default forwarding to [`open_stream`](Self::open_stream) is correct.
    fn open_tree_stream<'a>(&'a self, name: &str) -> Result<Box<dyn OrderedKeyStream + 'a>> {
        self.open_stream(name)
    }

    /// Collects `name -> root hash` for every store in this set.
    fn root_hashes(&self) -> BTreeMap<String, Vec<u8>> {
        let mut hashes = BTreeMap::new();
        for name in self.store_names() {
            if let Some(hash) = self.root_hash(&name) {
                hashes.insert(name, hash);
            }
        }
        hashes
    }
}

/// In-memory store set, used by tests and fixtures.
///
/// Root hashes are supplied by the caller rather than derived from
/// contents; the comparison engine treats hashes as opaque engine-provided
/// values, and fixtures exploit that to simulate hash/content mismatches.
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreSet {
    version: i64,
    stores: BTreeMap<String, MemoryStore>,
}

#[derive(Debug, Clone)]
struct MemoryStore {
    capability: IterationCapability,
    root_hash: Vec<u8>,
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStoreSet {
    pub fn new(version: i64) -> Self {
        Self {
            version,
            stores: BTreeMap::new(),
        }
    }

    /// Adds a store with an explicit root hash and capability.
    pub fn insert_store(
        &mut self,
        name: impl Into<String>,
        capability: IterationCapability,
        root_hash: Vec<u8>,
        entries: Vec<(Vec<u8>, Vec<u8>)>,
    ) {
        self.stores.insert(
            name.into(),
            MemoryStore {
                capability,
                root_hash,
                entries: entries.into_iter().collect(),
            },
        );
    }

    /// Adds a plain key/value store, deriving a stand-in root hash from the
    /// sorted entries so identical contents yield identical hashes.
    pub fn insert_kv_store(&mut self, name: impl Into<String>, mut entries: Vec<(Vec<u8>, Vec<u8>)>) {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let hash = crate::snapshot::store_root_hash(&entries);
        self.insert_store(name, IterationCapability::KeyValue, hash, entries);
    }
}

impl StoreSet for MemoryStoreSet {
    fn version(&self) -> i64 {
        self.version
    }

    fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    fn root_hash(&self, name: &str) -> Option<Vec<u8>> {
        self.stores.get(name).map(|s| s.root_hash.clone())
    }

    fn capability(&self, name: &str) -> IterationCapability {
        self.stores
            .get(name)
            .map(|s| s.capability)
            .unwrap_or(IterationCapability::Unsupported)
    }

    fn open_stream<'a>(&'a self, name: &str) -> Result<Box<dyn OrderedKeyStream + 'a>> {
        let store = self
            .stores
            .get(name)
            .ok_or_else(|| crate::error::StorediffError::unsupported_store(name))?;
        if !store.capability.is_ordered() {
            return Err(crate::error::StorediffError::unsupported_store(name));
        }
        Ok(Box::new(MemoryKeyStream {
            iter: store.entries.iter(),
        }))
    }
}

struct MemoryKeyStream<'a> {
    iter: std::collections::btree_map::Iter<'a, Vec<u8>, Vec<u8>>,
}

impl OrderedKeyStream for MemoryKeyStream<'_> {
    fn next_entry(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        Ok(self.iter.next().map(|(k, v)| (k.clone(), v.clone())))
    }
}
