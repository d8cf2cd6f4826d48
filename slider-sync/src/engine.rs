//! Crawl-and-sync engine.
//!
//! Walks the source tree depth-first and pre-order. Each file is classified
//! by the first matching rule:
//!
//! 1. listed/probed size at or above `max_file_size`: `skipped`
//! 2. ledger knows `(path, last_modified)`: `already_synced`, nothing fetched
//! 3. content hash known to the ledger: `already_synced`, bytes discarded
//! 4. path known with another hash: `update`, stored as `<stem>_UP<hash4>.<ext>`
//! 5. otherwise `new`, or `safe_overwrite` when the store already had an
//!    unrelated object at the path
//!
//! Per-item failures become `failed` lines; only a failed root listing
//! aborts the walk.

use std::collections::HashMap;

use sha1::{Digest, Sha1};

use slider_core::{CourseMatcher, ItemPath, NodeKind, Outcome, RemoteNode, SyncSettings};

use crate::changelog::ChangelogLine;
use crate::error::SyncError;
use crate::ledger::Ledger;
use crate::sanitize::{sanitize, sanitize_for_traversal, TraversalSegment};
use crate::source::SourceTree;
use crate::store::Store;

/// Extension used when neither the listing nor the content type names one.
pub const FALLBACK_EXTENSION: &str = "bin";

/// Lowercase hex SHA-1 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// Conventional extensions for types whose MIME registry entry lists a rarer
/// one first (`text/plain` would otherwise become `.asm`).
const PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    ("text/plain", "txt"),
    ("text/html", "html"),
    ("image/jpeg", "jpg"),
    ("audio/mpeg", "mp3"),
    ("application/vnd.ms-powerpoint", "ppt"),
    ("application/vnd.ms-excel", "xls"),
];

/// File extension for a `Content-Type` value, parameters ignored.
pub fn extension_for(content_type: Option<&str>) -> String {
    let Some(essence) = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
    else {
        return FALLBACK_EXTENSION.to_string();
    };
    if let Some((_, ext)) = PREFERRED_EXTENSIONS.iter().find(|(ty, _)| *ty == essence) {
        return ext.to_string();
    }
    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|exts| exts.first())
        .map(|ext| ext.to_string())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

// ---------------------------------------------------------------------------
// Events and run state
// ---------------------------------------------------------------------------

/// Progress notifications for a front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent<'a> {
    /// Entering a folder with content.
    FolderHeader { path: &'a ItemPath },
    /// A folder listing came back empty.
    EmptyFolder { path: &'a ItemPath },
    /// A top-level entry matched no course selector.
    NotSelected { name: &'a str },
    /// A file was classified.
    Item { outcome: Outcome, detail: &'a str },
}

impl SyncEvent<'_> {
    /// Stable prefix for printed lines.
    pub fn key(&self) -> &'static str {
        match self {
            SyncEvent::FolderHeader { .. } => "folder_path",
            SyncEvent::EmptyFolder { .. } => "no_files_in",
            SyncEvent::NotSelected { .. } => "not_selected",
            SyncEvent::Item { outcome, .. } => outcome.key(),
        }
    }
}

/// Everything one run accumulates.
#[derive(Debug, Default)]
pub struct RunState {
    pub new_count: usize,
    pub changelog: Vec<ChangelogLine>,
    /// Paths written this run, in order.
    pub downloads: Vec<ItemPath>,
    counts: HashMap<Outcome, usize>,
    /// Set while inside a passthrough folder; the next header stays unprinted.
    header_suppressed: bool,
    since_checkpoint: usize,
}

impl RunState {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// One traversal over a source into a store. Consumed by [`SyncEngine::run`].
pub struct SyncEngine<'a> {
    source: &'a dyn SourceTree,
    store: &'a dyn Store,
    ledger: &'a mut Ledger,
    courses: &'a CourseMatcher,
    settings: &'a SyncSettings,
    observer: Box<dyn FnMut(&SyncEvent<'_>) + 'a>,
    state: RunState,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        source: &'a dyn SourceTree,
        store: &'a dyn Store,
        ledger: &'a mut Ledger,
        courses: &'a CourseMatcher,
        settings: &'a SyncSettings,
    ) -> Self {
        Self {
            source,
            store,
            ledger,
            courses,
            settings,
            observer: Box::new(|_| {}),
            state: RunState::default(),
        }
    }

    pub fn with_observer(mut self, observer: impl FnMut(&SyncEvent<'_>) + 'a) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Walk every selected course.
    pub fn run(mut self) -> Result<RunState, SyncError> {
        let roots = self.source.list_root().map_err(SyncError::from_startup)?;
        let courses = self.courses;

        for node in &roots {
            let Some(folder) = courses.select(&node.name) else {
                tracing::info!(name = %node.name.trim(), "course not selected");
                self.emit(SyncEvent::NotSelected {
                    name: node.name.trim(),
                });
                continue;
            };
            let course = ItemPath::folder(&sanitize(folder));
            self.state.header_suppressed = false;
            match node.kind {
                NodeKind::Folder => self.crawl(node, course),
                NodeKind::File => self.sync_file(node, &course),
            }
        }
        Ok(self.state)
    }

    fn crawl(&mut self, folder: &RemoteNode, path: ItemPath) {
        let children = match self.source.list_children(folder) {
            Ok(children) => children,
            Err(e) => return self.record(Outcome::Failed, format!("{path} ({e})")),
        };

        if children.is_empty() {
            tracing::info!(%path, "empty folder");
            self.emit(SyncEvent::EmptyFolder { path: &path });
            return;
        }
        if !self.state.header_suppressed {
            self.emit(SyncEvent::FolderHeader { path: &path });
        }
        if let Err(e) = self.store.create_folder(&path) {
            return self.record(Outcome::Failed, format!("{path} ({e})"));
        }

        for child in &children {
            match child.kind {
                NodeKind::File => self.sync_file(child, &path),
                NodeKind::Folder => {
                    let segment = sanitize_for_traversal(&child.name, &self.settings.passthrough_label);
                    self.state.header_suppressed = segment == TraversalSegment::Suppressed;
                    self.crawl(child, path.push_segment(segment.as_str()));
                }
            }
        }
    }

    fn sync_file(&mut self, node: &RemoteNode, folder: &ItemPath) {
        match self.classify_and_store(node, folder) {
            Ok((outcome, detail)) => self.record(outcome, detail),
            Err(e) => {
                let detail = format!("{folder}{} ({e})", sanitize(&node.name));
                self.record(Outcome::Failed, detail);
            }
        }
    }

    fn classify_and_store(
        &mut self,
        node: &RemoteNode,
        folder: &ItemPath,
    ) -> Result<(Outcome, String), SyncError> {
        let probed = if node.extension_hint.is_none() || node.size_hint.is_none() {
            Some(self.source.probe_metadata(node)?)
        } else {
            None
        };
        let size = node
            .size_hint
            .or_else(|| probed.as_ref().and_then(|m| m.size_bytes));
        let extension = match node.extension_hint.as_deref() {
            Some(ext) => sanitize(ext.trim_start_matches('.')),
            None => extension_for(probed.as_ref().and_then(|m| m.content_type.as_deref())),
        };
        let path = folder.file(&sanitize(&node.name), &extension);

        if size.is_some_and(|s| s as f64 >= self.settings.max_file_size) {
            return Ok((Outcome::Skipped, path.to_string()));
        }
        if let Some(marker) = node.last_modified.as_deref() {
            if self.ledger.lookup_by_path_and_update(&path, marker).is_some() {
                return Ok((Outcome::AlreadySynced, path.to_string()));
            }
        }

        let bytes = self.source.fetch_content(node)?;
        let hash = content_hash(&bytes);
        if self.ledger.lookup_by_hash(&hash).is_some() {
            return Ok((Outcome::AlreadySynced, path.to_string()));
        }

        let (outcome, target, detail) = if self.ledger.lookup_by_path(&path).is_some() {
            let target = path.with_stem_suffix(&format!("_UP{}", &hash[..4]));
            let detail = target.to_string();
            (Outcome::Update, target, detail)
        } else {
            let outcome = if self.store.exists(&path)? {
                Outcome::SafeOverwrite
            } else {
                Outcome::New
            };
            let detail = format!("{path} from {}", node.url);
            (outcome, path, detail)
        };

        self.store
            .save_file(&target, &bytes, false)
            .map_err(|source| SyncError::StoreWriteFailure {
                path: target.clone(),
                source,
            })?;
        self.ledger
            .insert(target.clone(), hash, node.last_modified.clone());
        self.state.new_count += 1;
        self.state.downloads.push(target);
        self.maybe_checkpoint();
        Ok((outcome, detail))
    }

    fn maybe_checkpoint(&mut self) {
        let Some(every) = self.settings.checkpoint_every else {
            return;
        };
        self.state.since_checkpoint += 1;
        if self.state.since_checkpoint < every {
            return;
        }
        self.state.since_checkpoint = 0;
        if let Err(e) = self.ledger.checkpoint(self.store) {
            tracing::warn!(error = %e, "ledger checkpoint failed");
        }
    }

    fn record(&mut self, outcome: Outcome, detail: String) {
        match outcome {
            Outcome::Failed => tracing::warn!(outcome = outcome.key(), %detail, "item failed"),
            _ => tracing::info!(outcome = outcome.key(), %detail, "item"),
        }
        self.emit(SyncEvent::Item {
            outcome,
            detail: &detail,
        });
        *self.state.counts.entry(outcome).or_default() += 1;
        if outcome.is_download() || outcome == Outcome::Failed || self.settings.log_all {
            self.state.changelog.push(ChangelogLine::new(outcome, detail));
        }
    }

    fn emit(&mut self, event: SyncEvent<'_>) {
        (self.observer)(&event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
