//! Error types for slider-sync.
//!
//! [`SyncError`] is the run-level taxonomy: `AuthenticationFailure`,
//! `ConnectivityFailure` and `LedgerUnavailable` abort a run;
//! `StoreWriteFailure` and per-item source errors are caught at the item
//! boundary by the engine.

use std::path::PathBuf;

use thiserror::Error;

use slider_core::ItemPath;

/// Failures reported by a [`Store`](crate::store::Store).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Local filesystem failure, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The request never produced a response (DNS, TLS, timeout, …).
    #[error("store transport error: {0}")]
    Transport(String),

    /// The remote API answered with an error status.
    #[error("store API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// The object does not exist.
    #[error("no object at {path}")]
    NotFound { path: ItemPath },

    /// Malformed API payload.
    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures reported by a [`SourceTree`](crate::source::SourceTree).
#[derive(Debug, Error)]
pub enum SourceError {
    /// Credentials rejected by the portal.
    #[error("authentication rejected: {0}")]
    Authentication(String),

    /// The portal could not be reached.
    #[error("connection failed: {0}")]
    Connectivity(String),

    /// The portal answered with an error status.
    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    /// A required response header was absent or malformed.
    #[error("missing or invalid header '{header}' for {url}")]
    MissingHeader { url: String, header: &'static str },

    /// Malformed listing payload.
    #[error("listing JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a response body failed.
    #[error("I/O error reading {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures delivering a run summary. Logged by the pipeline, never fatal.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The mail program could not be started or fed.
    #[error("could not run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The mail program ran but reported failure.
    #[error("{program} exited with {status}")]
    Exit {
        program: PathBuf,
        status: std::process::ExitStatus,
    },
}

/// All errors that can arise from a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Portal or store rejected our credentials. Fatal, raised before traversal.
    #[error("authentication failed: {0}")]
    AuthenticationFailure(String),

    /// Portal unreachable during start-up. Fatal.
    #[error("connectivity failure: {0}")]
    ConnectivityFailure(String),

    /// The ledger could not be fetched, parsed or written. Fatal: without it
    /// idempotence cannot be guaranteed.
    #[error("ledger unavailable: {reason}")]
    LedgerUnavailable { reason: String },

    /// Content could not be persisted; the item stays unrecorded.
    #[error("failed to store {path}: {source}")]
    StoreWriteFailure {
        path: ItemPath,
        #[source]
        source: StoreError,
    },

    /// Any other store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Any other source failure.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// A local I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be turned into a run.
    #[error("configuration error: {0}")]
    Config(#[from] slider_core::ConfigError),

    /// JSON serialization/deserialization error (ledger).
    #[error("ledger JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Map a start-up source failure onto the fatal taxonomy.
    pub fn from_startup(err: SourceError) -> Self {
        match err {
            SourceError::Authentication(msg) => SyncError::AuthenticationFailure(msg),
            SourceError::Connectivity(msg) => SyncError::ConnectivityFailure(msg),
            other => SyncError::Source(other),
        }
    }

    pub(crate) fn ledger(reason: impl std::fmt::Display) -> Self {
        SyncError::LedgerUnavailable {
            reason: reason.to_string(),
        }
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn sync_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_errors_map_to_fatal_variants() {
        let auth = SyncError::from_startup(SourceError::Authentication("bad password".into()));
        assert!(matches!(auth, SyncError::AuthenticationFailure(_)));

        let conn = SyncError::from_startup(SourceError::Connectivity("dns".into()));
        assert!(matches!(conn, SyncError::ConnectivityFailure(_)));

        let other = SyncError::from_startup(SourceError::Http {
            url: "u".into(),
            status: 500,
        });
        assert!(matches!(other, SyncError::Source(_)));
    }

    #[test]
    fn store_write_failure_names_path() {
        let err = SyncError::StoreWriteFailure {
            path: ItemPath::from("Course/a.pdf"),
            source: StoreError::Transport("reset".into()),
        };
        assert!(err.to_string().contains("Course/a.pdf"));
    }
}
