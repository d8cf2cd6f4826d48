//! Remote object store.
//!
//! [`RemoteStore`] implements the [`Store`] contract on top of an
//! [`ObjectApi`], the raw request surface of a hosted file API (see
//! [`DropboxApi`](super::DropboxApi)). Payloads larger than `chunk_size` go
//! through an upload session:
//!
//! ```text
//! Idle ──start(first chunk)──▶ Open{cursor} ──append(chunk)*──▶ Open{cursor'}
//!                                   │
//!                                   └──finish(last chunk, commit)──▶ Finished
//! ```
//!
//! The object only becomes visible at `finish`; an abandoned session leaves
//! nothing behind.

use slider_core::ItemPath;

use crate::error::StoreError;
use crate::store::Store;

/// Conflict behaviour when committing an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail if an object already exists at the path.
    Add,
    /// Replace an existing object.
    Overwrite,
}

/// Position inside an open upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCursor {
    pub session_id: String,
    /// Bytes accepted by the server so far.
    pub offset: u64,
}

/// Where and how a finished upload is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub path: String,
    pub mode: WriteMode,
    pub mute: bool,
}

/// Raw request surface of a hosted file API. Paths are absolute API paths.
pub trait ObjectApi {
    fn exists(&self, path: &str) -> Result<bool, StoreError>;
    fn create_folder(&self, path: &str) -> Result<(), StoreError>;
    /// Single-request upload for payloads up to the chunk size.
    fn upload(&self, commit: &CommitInfo, bytes: &[u8]) -> Result<(), StoreError>;
    /// Open a session with the first chunk; returns the session id.
    fn session_start(&self, first: &[u8]) -> Result<String, StoreError>;
    fn session_append(&self, cursor: &SessionCursor, chunk: &[u8]) -> Result<(), StoreError>;
    fn session_finish(
        &self,
        cursor: &SessionCursor,
        last: &[u8],
        commit: &CommitInfo,
    ) -> Result<(), StoreError>;
    /// Move with auto-rename; returns the path actually used.
    fn move_object(&self, from: &str, to: &str) -> Result<String, StoreError>;
    fn download(&self, path: &str) -> Result<Vec<u8>, StoreError>;
}

// ---------------------------------------------------------------------------
// Upload session
// ---------------------------------------------------------------------------

enum SessionState {
    Idle,
    Open(SessionCursor),
    Finished,
}

/// One chunked upload. Owns its cursor; never outlives the `save_file` call.
struct UploadSession<'a> {
    api: &'a dyn ObjectApi,
    commit: CommitInfo,
    state: SessionState,
}

impl<'a> UploadSession<'a> {
    fn new(api: &'a dyn ObjectApi, commit: CommitInfo) -> Self {
        Self {
            api,
            commit,
            state: SessionState::Idle,
        }
    }

    fn push(&mut self, chunk: &[u8], is_last: bool) -> Result<(), StoreError> {
        self.state = match std::mem::replace(&mut self.state, SessionState::Finished) {
            SessionState::Idle => {
                let session_id = self.api.session_start(chunk)?;
                tracing::debug!(path = %self.commit.path, %session_id, "upload session started");
                SessionState::Open(SessionCursor {
                    session_id,
                    offset: chunk.len() as u64,
                })
            }
            SessionState::Open(cursor) if is_last => {
                self.api.session_finish(&cursor, chunk, &self.commit)?;
                SessionState::Finished
            }
            SessionState::Open(mut cursor) => {
                self.api.session_append(&cursor, chunk)?;
                cursor.offset += chunk.len() as u64;
                SessionState::Open(cursor)
            }
            SessionState::Finished => {
                return Err(StoreError::Transport(format!(
                    "upload session for {} already finished",
                    self.commit.path
                )))
            }
        };
        Ok(())
    }

    /// Commit if the last chunk went out as the opening `start`.
    fn close(self) -> Result<(), StoreError> {
        match self.state {
            SessionState::Open(cursor) => self.api.session_finish(&cursor, &[], &self.commit),
            SessionState::Finished => Ok(()),
            SessionState::Idle => Err(StoreError::Transport(format!(
                "upload session for {} never started",
                self.commit.path
            ))),
        }
    }
}

fn upload_chunked(
    api: &dyn ObjectApi,
    commit: CommitInfo,
    bytes: &[u8],
    chunk_size: usize,
) -> Result<(), StoreError> {
    let mut session = UploadSession::new(api, commit);
    let mut chunks = bytes.chunks(chunk_size).peekable();
    while let Some(chunk) = chunks.next() {
        let is_last = chunks.peek().is_none();
        session.push(chunk, is_last)?;
    }
    session.close()
}

// ---------------------------------------------------------------------------
// RemoteStore
// ---------------------------------------------------------------------------

/// [`Store`] over an [`ObjectApi`], rooted at `base_path`.
pub struct RemoteStore {
    api: Box<dyn ObjectApi>,
    base_path: String,
    chunk_size: usize,
}

impl RemoteStore {
    /// `base_path` is normalized to `/a/b` form (empty for the API root).
    pub fn new(api: Box<dyn ObjectApi>, base_path: &str, chunk_size: usize) -> Self {
        let trimmed = base_path.trim_matches('/');
        let base_path = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        Self {
            api,
            base_path,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Absolute API path of a store-relative path.
    pub fn remote_path(&self, path: &ItemPath) -> String {
        if path.is_root() {
            return self.base_path.clone();
        }
        format!("{}/{}", self.base_path, path.trimmed())
    }

    fn relative(&self, remote: &str) -> ItemPath {
        let rest = remote.strip_prefix(&self.base_path).unwrap_or(remote);
        ItemPath::from(rest.trim_start_matches('/'))
    }
}

impl Store for RemoteStore {
    fn describe(&self) -> String {
        format!("remote:{}", if self.base_path.is_empty() { "/" } else { &self.base_path })
    }

    fn exists(&self, path: &ItemPath) -> Result<bool, StoreError> {
        if path.is_root() && self.base_path.is_empty() {
            return Ok(true);
        }
        self.api.exists(&self.remote_path(path))
    }

    fn create_folder(&self, path: &ItemPath) -> Result<(), StoreError> {
        if self.exists(path)? {
            return Ok(());
        }
        self.api.create_folder(&self.remote_path(path))
    }

    fn save_file(&self, path: &ItemPath, bytes: &[u8], overwrite: bool) -> Result<(), StoreError> {
        if !overwrite {
            self.displace(path)?;
        }
        let commit = CommitInfo {
            path: self.remote_path(path),
            mode: if overwrite {
                WriteMode::Overwrite
            } else {
                WriteMode::Add
            },
            mute: overwrite,
        };
        if bytes.len() > self.chunk_size {
            tracing::debug!(path = %commit.path, bytes = bytes.len(), "chunked upload");
            upload_chunked(self.api.as_ref(), commit, bytes, self.chunk_size)
        } else {
            self.api.upload(&commit, bytes)
        }
    }

    fn download_file(&self, path: &ItemPath) -> Result<Vec<u8>, StoreError> {
        self.api.download(&self.remote_path(path))
    }

    fn move_file(&self, from: &ItemPath, to: &ItemPath) -> Result<ItemPath, StoreError> {
        let moved = self
            .api
            .move_object(&self.remote_path(from), &self.remote_path(to))?;
        Ok(self.relative(&moved))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
