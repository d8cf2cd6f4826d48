//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use slider_core::{ItemPath, LedgerEntry, RemoteMetadata, RemoteNode};
use slider_sync::ledger::{LedgerFile, LEDGER_PATH};
use slider_sync::{ChangelogLine, Notifier, NotifyError, SourceError, SourceTree, Store, StoreError};

/// Scriptable in-memory portal that counts what the engine asks for.
#[derive(Default)]
pub struct SpySource {
    root: Vec<RemoteNode>,
    children: HashMap<String, Vec<RemoteNode>>,
    bodies: RefCell<HashMap<String, Vec<u8>>>,
    content_types: HashMap<String, String>,
    head_sizes: HashMap<String, u64>,
    failing: RefCell<HashSet<String>>,
    pub reject_login: bool,
    pub fail_root: bool,
    fetches: Cell<usize>,
    probes: Cell<usize>,
}

impl SpySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn course(mut self, name: &str, url: &str) -> Self {
        self.root.push(RemoteNode::folder(name, url));
        self.children.entry(url.to_string()).or_default();
        self
    }

    pub fn folder(mut self, parent: &str, name: &str, url: &str) -> Self {
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(RemoteNode::folder(name, url));
        self.children.entry(url.to_string()).or_default();
        self
    }

    pub fn file(mut self, parent: &str, node: RemoteNode, body: &[u8]) -> Self {
        self.bodies.borrow_mut().insert(node.url.clone(), body.to_vec());
        self.children.entry(parent.to_string()).or_default().push(node);
        self
    }

    /// `Content-Type` answered by the metadata probe.
    pub fn content_type(mut self, url: &str, content_type: &str) -> Self {
        self.content_types.insert(url.to_string(), content_type.to_string());
        self
    }

    /// `Content-Length` answered by the metadata probe (default: body length).
    pub fn head_size(mut self, url: &str, size: u64) -> Self {
        self.head_sizes.insert(url.to_string(), size);
        self
    }

    pub fn set_body(&self, url: &str, body: &[u8]) {
        self.bodies.borrow_mut().insert(url.to_string(), body.to_vec());
    }

    pub fn fail_fetch(&self, url: &str, fail: bool) {
        let mut failing = self.failing.borrow_mut();
        if fail {
            failing.insert(url.to_string());
        } else {
            failing.remove(url);
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.get()
    }

    pub fn probes(&self) -> usize {
        self.probes.get()
    }

    pub fn reset_counters(&self) {
        self.fetches.set(0);
        self.probes.set(0);
    }
}

impl SourceTree for SpySource {
    fn authenticate(&self) -> Result<(), SourceError> {
        if self.reject_login {
            return Err(SourceError::Authentication("credentials were not accepted".into()));
        }
        Ok(())
    }

    fn list_root(&self) -> Result<Vec<RemoteNode>, SourceError> {
        if self.fail_root {
            return Err(SourceError::Connectivity("portal unreachable".into()));
        }
        Ok(self.root.clone())
    }

    fn list_children(&self, folder: &RemoteNode) -> Result<Vec<RemoteNode>, SourceError> {
        Ok(self.children.get(&folder.url).cloned().unwrap_or_default())
    }

    fn probe_metadata(&self, file: &RemoteNode) -> Result<RemoteMetadata, SourceError> {
        self.probes.set(self.probes.get() + 1);
        let body_len = self.bodies.borrow().get(&file.url).map(|b| b.len() as u64);
        Ok(RemoteMetadata {
            size_bytes: self.head_sizes.get(&file.url).copied().or(body_len),
            content_type: self.content_types.get(&file.url).cloned(),
        })
    }

    fn fetch_content(&self, file: &RemoteNode) -> Result<Vec<u8>, SourceError> {
        self.fetches.set(self.fetches.get() + 1);
        if self.failing.borrow().contains(&file.url) {
            return Err(SourceError::Http {
                url: file.url.clone(),
                status: 500,
            });
        }
        self.bodies
            .borrow()
            .get(&file.url)
            .cloned()
            .ok_or(SourceError::Http {
                url: file.url.clone(),
                status: 404,
            })
    }
}

/// Delegating store that counts ledger uploads and can refuse content writes.
pub struct CountingStore<S> {
    pub inner: S,
    ledger_saves: Cell<usize>,
    fail_content: Cell<bool>,
}

impl<S: Store> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            ledger_saves: Cell::new(0),
            fail_content: Cell::new(false),
        }
    }

    /// Make `save_file` fail for everything outside the `.db/` and
    /// `.changelog/` bookkeeping folders.
    pub fn fail_content_writes(&self, fail: bool) {
        self.fail_content.set(fail);
    }

    pub fn ledger_saves(&self) -> usize {
        self.ledger_saves.get()
    }
}

impl<S: Store> Store for CountingStore<S> {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn exists(&self, path: &ItemPath) -> Result<bool, StoreError> {
        self.inner.exists(path)
    }

    fn create_folder(&self, path: &ItemPath) -> Result<(), StoreError> {
        self.inner.create_folder(path)
    }

    fn save_file(&self, path: &ItemPath, bytes: &[u8], overwrite: bool) -> Result<(), StoreError> {
        if path.as_str() == LEDGER_PATH {
            self.ledger_saves.set(self.ledger_saves.get() + 1);
        } else if self.fail_content.get() && !path.as_str().starts_with('.') {
            return Err(StoreError::Transport("quota exceeded".into()));
        }
        self.inner.save_file(path, bytes, overwrite)
    }

    fn download_file(&self, path: &ItemPath) -> Result<Vec<u8>, StoreError> {
        self.inner.download_file(path)
    }

    fn move_file(&self, from: &ItemPath, to: &ItemPath) -> Result<ItemPath, StoreError> {
        self.inner.move_file(from, to)
    }
}

/// Records every summary it is asked to send.
#[derive(Default)]
pub struct SpyNotifier {
    pub sent: RefCell<Vec<(String, usize)>>,
}

impl Notifier for SpyNotifier {
    fn send(&self, summary: &str, _lines: &[ChangelogLine], new_count: usize) -> Result<(), NotifyError> {
        self.sent.borrow_mut().push((summary.to_string(), new_count));
        Ok(())
    }
}

/// Entries of the ledger persisted at a local destination.
pub fn persisted_ledger(dest: &Path) -> Vec<LedgerEntry> {
    let bytes = std::fs::read(dest.join(".db").join("files.json")).expect("ledger on disk");
    let doc: LedgerFile = serde_json::from_slice(&bytes).expect("versioned ledger");
    doc.entries
}
