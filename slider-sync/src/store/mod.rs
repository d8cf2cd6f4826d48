//! Destination stores.
//!
//! The engine only ever holds a `&dyn Store`; the concrete variant is picked
//! once from configuration by [`open`].
//!
//! | variant                  | backing                                   |
//! |--------------------------|-------------------------------------------|
//! | [`LocalStore`]           | directory on the local filesystem         |
//! | [`RemoteStore`]          | HTTP object store with chunked uploads    |

pub mod dropbox;
pub mod local;
pub mod remote;

pub use dropbox::DropboxApi;
pub use local::LocalStore;
pub use remote::{CommitInfo, ObjectApi, RemoteStore, SessionCursor, WriteMode};

use std::time::Duration;

use slider_core::{DestinationConfig, ItemPath};

use crate::error::{StoreError, SyncError};

/// Capability interface of a synchronization destination.
///
/// Paths are store-relative. Every failure is a typed [`StoreError`]; no
/// operation silently does nothing.
pub trait Store {
    /// Human-readable destination, used in run summaries.
    fn describe(&self) -> String;

    fn exists(&self, path: &ItemPath) -> Result<bool, StoreError>;

    /// Create `path` and any missing parents. No-op if it already exists.
    fn create_folder(&self, path: &ItemPath) -> Result<(), StoreError>;

    /// Persist `bytes` at `path`.
    ///
    /// With `overwrite == false` an existing object at `path` is first
    /// displaced into the overwritten side-folder (see [`Store::displace`]).
    /// The object becomes visible to `exists`/`download_file` only once fully
    /// written.
    fn save_file(&self, path: &ItemPath, bytes: &[u8], overwrite: bool) -> Result<(), StoreError>;

    fn download_file(&self, path: &ItemPath) -> Result<Vec<u8>, StoreError>;

    /// Move `from` to `to`, returning the path actually used. An occupied `to`
    /// is disambiguated (`name (1).ext`, …) rather than replaced.
    fn move_file(&self, from: &ItemPath, to: &ItemPath) -> Result<ItemPath, StoreError>;

    /// Move an existing object at `path` into `.overwritten/`, mirroring its
    /// relative path. Returns where it went, or `None` if nothing was there.
    fn displace(&self, path: &ItemPath) -> Result<Option<ItemPath>, StoreError> {
        if !self.exists(path)? {
            return Ok(None);
        }
        let target = path.overwritten();
        self.create_folder(&target.parent())?;
        let moved = self.move_file(path, &target)?;
        tracing::info!(from = %path, to = %moved, "displaced existing object");
        Ok(Some(moved))
    }
}

/// Build the store described by `destination`.
///
/// For remote destinations the token is verified up front; a rejected token
/// is an [`SyncError::AuthenticationFailure`].
pub fn open(destination: &DestinationConfig, timeout: Duration) -> Result<Box<dyn Store>, SyncError> {
    match destination {
        DestinationConfig::Local { path } => Ok(Box::new(LocalStore::new(path.clone()))),
        DestinationConfig::Remote {
            base_path,
            token,
            chunk_size,
        } => {
            let api = DropboxApi::new(token.clone(), timeout);
            match api.verify_token() {
                Ok(()) => {}
                Err(StoreError::Api { status: 401, body }) => {
                    return Err(SyncError::AuthenticationFailure(format!(
                        "store token rejected: {body}"
                    )))
                }
                Err(StoreError::Transport(msg)) => return Err(SyncError::ConnectivityFailure(msg)),
                Err(other) => return Err(SyncError::Store(other)),
            }
            Ok(Box::new(RemoteStore::new(
                Box::new(api),
                base_path,
                *chunk_size as usize,
            )))
        }
    }
}
