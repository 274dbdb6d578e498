//! On-disk snapshot format and store set provider
//!
//! A snapshot directory holds one `manifest.json` describing the committed
//! versions and the root hash of every store at each version, plus one data
//! file per store and version:
//!
//! ```text
//! <dir>/manifest.json
//! <dir>/stores/<version>/<name>.jsonl
//! ```
//!
//! Data files carry one `{"k": <hex>, "v": <hex>}` object per line in
//! ascending key order, so a store can be streamed through a buffered
//! reader without ever materializing it. Root hashes are recorded in the
//! manifest when the snapshot is written and are never recomputed on the
//! comparison path.

use crate::error::{Result, StorediffError};
use crate::report::HexBytes;
use crate::store::{IterationCapability, OrderedKeyStream, StoreSet};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Manifest file name inside a snapshot directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Top-level snapshot manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub format_version: String,
    pub created_at: DateTime<Utc>,
    pub commits: Vec<CommitInfo>,
}

/// One committed version and its store summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub version: i64,
    pub stores: Vec<StoreInfo>,
}

/// Name, kind and root hash of one store at one version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreInfo {
    pub name: String,
    pub kind: StoreKind,
    pub root_hash: HexBytes,
}

/// Backend kind of a store, fixed when the snapshot is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Hash-addressed ordered tree; iterable in tree-traversal order.
    Tree,
    /// Plain sorted key/value store.
    Kv,
    /// In-memory or scratch store; carries a hash but cannot be iterated.
    Transient,
}

impl StoreKind {
    pub fn capability(self) -> IterationCapability {
        match self {
            StoreKind::Tree => IterationCapability::Tree,
            StoreKind::Kv => IterationCapability::KeyValue,
            StoreKind::Transient => IterationCapability::Unsupported,
        }
    }
}

/// One line of a store data file.
#[derive(Debug, Serialize, Deserialize)]
struct JsonlEntry {
    k: String,
    v: String,
}

/// Chained content hash over an ordered entry list, used when writing
/// snapshots. Separators keep `("ab","c")` and `("a","bc")` distinct.
pub fn store_root_hash(entries: &[(Vec<u8>, Vec<u8>)]) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new();
    for (key, value) in entries {
        hasher.update(key);
        hasher.update(b"|");
        hasher.update(value);
        hasher.update(b"||");
    }
    hasher.finalize().as_bytes().to_vec()
}

/// A snapshot directory opened at one commit version.
#[derive(Debug)]
pub struct DirStoreSet {
    root: PathBuf,
    version: i64,
    stores: IndexMap<String, StoreInfo>,
}

impl DirStoreSet {
    /// Opens a snapshot directory at `wanted_version`, or at the latest
    /// committed version when `None`.
    pub fn open(dir: &Path, wanted_version: Option<i64>) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(StorediffError::store_open(format!(
                "no {} in {}",
                MANIFEST_FILE,
                dir.display()
            )));
        }

        let content = fs::read_to_string(&manifest_path)?;
        let manifest: SnapshotManifest = serde_json::from_str(&content).map_err(|e| {
            StorediffError::store_open(format!(
                "malformed manifest in {}: {}",
                dir.display(),
                e
            ))
        })?;

        let commit = match wanted_version {
            Some(version) => manifest
                .commits
                .iter()
                .find(|c| c.version == version)
                .ok_or(StorediffError::VersionNotFound { version })?,
            None => manifest
                .commits
                .iter()
                .max_by_key(|c| c.version)
                .ok_or_else(|| {
                    StorediffError::store_open(format!(
                        "snapshot {} has no committed versions",
                        dir.display()
                    ))
                })?,
        };

        let stores = commit
            .stores
            .iter()
            .map(|info| (info.name.clone(), info.clone()))
            .collect();

        log::debug!(
            "opened snapshot {} at version {}",
            dir.display(),
            commit.version
        );

        Ok(Self {
            root: dir.to_path_buf(),
            version: commit.version,
            stores,
        })
    }

    /// Store summaries at the opened version, in manifest order.
    pub fn store_infos(&self) -> impl Iterator<Item = &StoreInfo> {
        self.stores.values()
    }

    fn data_path(&self, name: &str) -> PathBuf {
        self.root
            .join("stores")
            .join(self.version.to_string())
            .join(format!("{}.jsonl", name))
    }
}

impl StoreSet for DirStoreSet {
    fn version(&self) -> i64 {
        self.version
    }

    fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    fn root_hash(&self, name: &str) -> Option<Vec<u8>> {
        self.stores.get(name).map(|s| s.root_hash.0.clone())
    }

    fn capability(&self, name: &str) -> IterationCapability {
        self.stores
            .get(name)
            .map(|s| s.kind.capability())
            .unwrap_or(IterationCapability::Unsupported)
    }

    fn open_stream<'a>(&'a self, name: &str) -> Result<Box<dyn OrderedKeyStream + 'a>> {
        let info = self
            .stores
            .get(name)
            .ok_or_else(|| StorediffError::unsupported_store(name))?;
        if !info.kind.capability().is_ordered() {
            return Err(StorediffError::unsupported_store(name));
        }

        let path = self.data_path(name);
        let file = File::open(&path).map_err(|e| {
            StorediffError::store_open(format!(
                "missing data file for store '{}' ({}): {}",
                name,
                path.display(),
                e
            ))
        })?;

        Ok(Box::new(JsonlKeyStream {
            store: name.to_string(),
            reader: BufReader::new(file),
            line_no: 0,
        }))
    }
}

/// Lazily decodes one data file line per `next_entry` call.
struct JsonlKeyStream {
    store: String,
    reader: BufReader<File>,
    line_no: u64,
}

impl JsonlKeyStream {
    fn decode_line(&self, line: &str) -> Result<(Vec<u8>, Vec<u8>)> {
        let entry: JsonlEntry = serde_json::from_str(line).map_err(|e| {
            StorediffError::stream(
                &self.store,
                format!("malformed entry at line {}: {}", self.line_no, e),
            )
        })?;
        let key = hex::decode(&entry.k).map_err(|e| {
            StorediffError::stream(
                &self.store,
                format!("bad key hex at line {}: {}", self.line_no, e),
            )
        })?;
        let value = hex::decode(&entry.v).map_err(|e| {
            StorediffError::stream(
                &self.store,
                format!("bad value hex at line {}: {}", self.line_no, e),
            )
        })?;
        Ok((key, value))
    }
}

impl OrderedKeyStream for JsonlKeyStream {
    fn next_entry(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .map_err(|e| StorediffError::stream(&self.store, e.to_string()))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return self.decode_line(trimmed).map(Some);
        }
    }
}

/// Authors a snapshot directory in the on-disk format.
///
/// Used by fixtures and by operators producing comparable snapshots from
/// engine exports; the comparison path itself only reads.
pub struct SnapshotWriter {
    root: PathBuf,
    commits: IndexMap<i64, Vec<StoreInfo>>,
}

impl SnapshotWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            commits: IndexMap::new(),
        }
    }

    /// Writes one store's data file at `version` and records its manifest
    /// entry. Entries are sorted by key before writing; the root hash is
    /// computed over the sorted entries. Transient stores record a hash but
    /// no data file.
    pub fn write_store(
        &mut self,
        version: i64,
        name: &str,
        kind: StoreKind,
        mut entries: Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Result<HexBytes> {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let root_hash = HexBytes(store_root_hash(&entries));

        if kind != StoreKind::Transient {
            let dir = self.root.join("stores").join(version.to_string());
            fs::create_dir_all(&dir)?;
            let file = File::create(dir.join(format!("{}.jsonl", name)))?;
            let mut writer = BufWriter::new(file);
            for (key, value) in &entries {
                let line = serde_json::to_string(&JsonlEntry {
                    k: hex::encode(key),
                    v: hex::encode(value),
                })?;
                writeln!(writer, "{}", line)?;
            }
            writer.flush()?;
        }

        self.commits.entry(version).or_default().push(StoreInfo {
            name: name.to_string(),
            kind,
            root_hash: root_hash.clone(),
        });

        Ok(root_hash)
    }

    /// Overrides the recorded root hash of an already written store, for
    /// constructing snapshots with deliberately inconsistent hashes.
    pub fn override_root_hash(&mut self, version: i64, name: &str, hash: Vec<u8>) {
        if let Some(stores) = self.commits.get_mut(&version) {
            if let Some(info) = stores.iter_mut().find(|s| s.name == name) {
                info.root_hash = HexBytes(hash);
            }
        }
    }

    /// Writes the manifest and finishes the snapshot.
    pub fn finish(self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let manifest = SnapshotManifest {
            format_version: crate::FORMAT_VERSION.to_string(),
            created_at: Utc::now(),
            commits: self
                .commits
                .into_iter()
                .map(|(version, stores)| CommitInfo { version, stores })
                .collect(),
        };
        let content = serde_json::to_string_pretty(&manifest)?;
        fs::write(self.root.join(MANIFEST_FILE), content)?;
        Ok(())
    }
}
