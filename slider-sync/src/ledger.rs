//! Ledger: durable record of every item already captured at a destination.
//!
//! The ledger lives on the store at [`LEDGER_PATH`]. A run materializes it
//! into a local working copy on [`Ledger::open`], queries and appends in
//! memory, and flushes it back with [`Ledger::checkpoint`] / [`Ledger::close`].
//!
//! Two on-store shapes are readable:
//!
//! ```text
//! versioned   {"version":1,"synced_at":"…","entries":[{"path","content_hash","last_update"}]}
//! legacy      {"_default":{"1":{"path","hashvalue","lastupdate"}, …}}
//! ```
//!
//! Only the versioned shape is ever written.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use slider_core::{ItemPath, LedgerEntry};

use crate::error::{sync_io_err, SyncError};
use crate::store::Store;

/// Folder holding the ledger on the store.
pub const LEDGER_FOLDER: &str = ".db/";

/// Store-relative location of the ledger document.
pub const LEDGER_PATH: &str = ".db/files.json";

/// Current on-store format version.
pub const LEDGER_VERSION: u32 = 1;

const WORKING_DIR: &str = "slider-ledger";

// ---------------------------------------------------------------------------
// On-store shapes
// ---------------------------------------------------------------------------

/// Versioned ledger document as written to the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerFile {
    pub version: u32,
    pub synced_at: DateTime<Utc>,
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LedgerCompat {
    Versioned(VersionedCompat),
    Legacy(LegacyCompat),
}

#[derive(Debug, Deserialize)]
struct VersionedCompat {
    version: u32,
    synced_at: Option<DateTime<Utc>>,
    entries: Vec<LedgerEntry>,
}

#[derive(Debug, Deserialize)]
struct LegacyCompat {
    #[serde(rename = "_default")]
    table: BTreeMap<String, LegacyRow>,
}

#[derive(Debug, Deserialize)]
struct LegacyRow {
    path: String,
    hashvalue: String,
    #[serde(default)]
    lastupdate: Option<String>,
}

/// A parsed ledger document, before it is indexed.
#[derive(Debug)]
struct Parsed {
    synced_at: Option<DateTime<Utc>>,
    entries: Vec<LedgerEntry>,
    legacy: bool,
}

fn parse(bytes: &[u8]) -> Result<Parsed, SyncError> {
    match serde_json::from_slice::<LedgerCompat>(bytes)? {
        LedgerCompat::Versioned(doc) => {
            if doc.version > LEDGER_VERSION {
                return Err(SyncError::ledger(format!(
                    "ledger version {} is newer than supported version {LEDGER_VERSION}",
                    doc.version
                )));
            }
            Ok(Parsed {
                synced_at: doc.synced_at,
                entries: doc.entries,
                legacy: false,
            })
        }
        LedgerCompat::Legacy(doc) => {
            // Row ids are decimal insertion counters; keep insertion order.
            let mut rows: Vec<(u64, LegacyRow)> = doc
                .table
                .into_iter()
                .map(|(id, row)| (id.parse().unwrap_or(u64::MAX), row))
                .collect();
            rows.sort_by_key(|(id, _)| *id);
            let entries = rows
                .into_iter()
                .map(|(_, row)| LedgerEntry {
                    path: ItemPath::from(row.path),
                    content_hash: row.hashvalue,
                    last_update: row.lastupdate,
                })
                .collect();
            Ok(Parsed {
                synced_at: None,
                entries,
                legacy: true,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// In-memory ledger with path and hash indexes.
///
/// At most one entry exists per path; a hash may be shared by several paths.
#[derive(Debug)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
    by_path: HashMap<ItemPath, usize>,
    by_hash: HashMap<String, Vec<usize>>,
    synced_at: Option<DateTime<Utc>>,
    working_copy: Option<PathBuf>,
}

impl Ledger {
    /// Empty ledger without a working copy. Flushing it only uploads.
    pub fn in_memory() -> Self {
        Self {
            entries: Vec::new(),
            by_path: HashMap::new(),
            by_hash: HashMap::new(),
            synced_at: None,
            working_copy: None,
        }
    }

    fn from_entries(entries: Vec<LedgerEntry>, synced_at: Option<DateTime<Utc>>) -> Self {
        let mut ledger = Self::in_memory();
        ledger.synced_at = synced_at;
        for entry in entries {
            ledger.insert(entry.path, entry.content_hash, entry.last_update);
        }
        ledger
    }

    /// Materialize the destination's ledger into `work_dir`.
    ///
    /// A destination without a ledger gets the `.db/` folder and starts
    /// empty. Any fetch, parse or write failure is
    /// [`SyncError::LedgerUnavailable`].
    pub fn open(store: &dyn Store, work_dir: &Path) -> Result<Self, SyncError> {
        let ledger_path = ItemPath::from(LEDGER_PATH);
        let exists = store.exists(&ledger_path).map_err(SyncError::ledger)?;

        let mut ledger = if exists {
            let bytes = store.download_file(&ledger_path).map_err(SyncError::ledger)?;
            let parsed = parse(&bytes).map_err(|e| match e {
                e @ SyncError::LedgerUnavailable { .. } => e,
                other => SyncError::ledger(format!("cannot parse {LEDGER_PATH}: {other}")),
            })?;
            tracing::debug!(
                entries = parsed.entries.len(),
                legacy = parsed.legacy,
                "ledger loaded"
            );
            Self::from_entries(parsed.entries, parsed.synced_at)
        } else {
            store
                .create_folder(&ItemPath::folder(LEDGER_FOLDER))
                .map_err(SyncError::ledger)?;
            tracing::debug!("no ledger at destination; starting empty");
            Self::in_memory()
        };

        let working_copy = work_dir.join(WORKING_DIR).join("files.json");
        ledger.working_copy = Some(working_copy);
        ledger.write_working_copy().map_err(SyncError::ledger)?;
        Ok(ledger)
    }

    /// Read-only view of the destination's ledger; `None` if it has none.
    pub fn inspect(store: &dyn Store) -> Result<Option<LedgerSummary>, SyncError> {
        let ledger_path = ItemPath::from(LEDGER_PATH);
        if !store.exists(&ledger_path).map_err(SyncError::ledger)? {
            return Ok(None);
        }
        let bytes = store.download_file(&ledger_path).map_err(SyncError::ledger)?;
        let parsed = parse(&bytes)?;
        let ledger = Self::from_entries(parsed.entries, parsed.synced_at);
        Ok(Some(LedgerSummary {
            entries: ledger.len(),
            synced_at: ledger.synced_at,
            legacy: parsed.legacy,
        }))
    }

    pub fn lookup_by_hash(&self, hash: &str) -> Option<&LedgerEntry> {
        self.by_hash
            .get(hash)
            .and_then(|idxs| idxs.first())
            .map(|&i| &self.entries[i])
    }

    pub fn lookup_by_path(&self, path: &ItemPath) -> Option<&LedgerEntry> {
        self.by_path.get(path).map(|&i| &self.entries[i])
    }

    /// Conjunctive match on path and modification marker.
    pub fn lookup_by_path_and_update(&self, path: &ItemPath, last_update: &str) -> Option<&LedgerEntry> {
        self.lookup_by_path(path)
            .filter(|e| e.last_update.as_deref() == Some(last_update))
    }

    /// Append an entry, or replace the one already recorded for `path`.
    pub fn insert(&mut self, path: ItemPath, content_hash: String, last_update: Option<String>) {
        let entry = LedgerEntry {
            path: path.clone(),
            content_hash,
            last_update,
        };
        match self.by_path.get(&path).copied() {
            Some(idx) => {
                let old_hash = std::mem::take(&mut self.entries[idx].content_hash);
                if let Some(idxs) = self.by_hash.get_mut(&old_hash) {
                    idxs.retain(|&i| i != idx);
                    if idxs.is_empty() {
                        self.by_hash.remove(&old_hash);
                    }
                }
                self.by_hash
                    .entry(entry.content_hash.clone())
                    .or_default()
                    .push(idx);
                self.entries[idx] = entry;
            }
            None => {
                let idx = self.entries.len();
                self.by_hash
                    .entry(entry.content_hash.clone())
                    .or_default()
                    .push(idx);
                self.by_path.insert(path, idx);
                self.entries.push(entry);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Timestamp of the last successful flush, if known.
    pub fn synced_at(&self) -> Option<DateTime<Utc>> {
        self.synced_at
    }

    /// Persist the current state to the store without closing.
    pub fn checkpoint(&mut self, store: &dyn Store) -> Result<(), SyncError> {
        self.synced_at = Some(Utc::now());
        self.write_working_copy().map_err(SyncError::ledger)?;
        let bytes = serde_json::to_vec_pretty(&self.document())?;
        store
            .save_file(&ItemPath::from(LEDGER_PATH), &bytes, true)
            .map_err(|source| SyncError::StoreWriteFailure {
                path: ItemPath::from(LEDGER_PATH),
                source,
            })?;
        tracing::debug!(entries = self.entries.len(), "ledger flushed");
        Ok(())
    }

    /// Flush to the store and discard the working copy.
    ///
    /// The working copy is removed even when the flush fails.
    pub fn close(mut self, store: &dyn Store) -> Result<(), SyncError> {
        let flushed = self.checkpoint(store);
        if let Some(dir) = self.working_copy.as_ref().and_then(|p| p.parent()) {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                tracing::warn!(dir = %dir.display(), error = %e, "could not remove ledger working copy");
            }
        }
        flushed.map_err(|e| match e {
            e @ SyncError::LedgerUnavailable { .. } => e,
            other => SyncError::ledger(other),
        })
    }

    fn document(&self) -> LedgerFile {
        LedgerFile {
            version: LEDGER_VERSION,
            synced_at: self.synced_at.unwrap_or_else(Utc::now),
            entries: self.entries.clone(),
        }
    }

    /// Atomic `.tmp` + rename write of the working copy.
    fn write_working_copy(&self) -> Result<(), SyncError> {
        let Some(path) = self.working_copy.as_ref() else {
            return Ok(());
        };
        let Some(dir) = path.parent() else {
            return Err(sync_io_err(
                path,
                std::io::Error::other("invalid ledger working copy path"),
            ));
        };
        std::fs::create_dir_all(dir).map_err(|e| sync_io_err(dir, e))?;

        let json = serde_json::to_vec_pretty(&self.document())?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| sync_io_err(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| sync_io_err(path, e))?;
        Ok(())
    }
}

/// What `slider status` reports about a destination's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub entries: usize,
    pub synced_at: Option<DateTime<Utc>>,
    /// Still in the legacy shape; rewritten on the next sync.
    pub legacy: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
