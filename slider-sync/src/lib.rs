//! # slider-sync
//!
//! Crawl-and-sync engine: walks a remote course tree and mirrors it into a
//! local or remote store, deduplicating by content hash against a persisted
//! ledger.
//!
//! Call [`pipeline::run`] for a configured run, or [`pipeline::run_with`] to
//! supply your own source, store and notifier.

pub mod changelog;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod pipeline;
pub mod sanitize;
pub mod source;
pub mod store;

pub use changelog::ChangelogLine;
pub use engine::{RunState, SyncEngine, SyncEvent};
pub use error::{NotifyError, SourceError, StoreError, SyncError};
pub use ledger::{Ledger, LedgerSummary};
pub use notify::{Notifier, SendmailNotifier};
pub use pipeline::{run, run_with, RunReport};
pub use source::{HttpIndexSource, SourceTree};
pub use store::{LocalStore, RemoteStore, Store};
