//! Slider core library: domain types, course selection, configuration.
//!
//! - [`types`]: remote nodes, destination paths, ledger rows, outcomes
//! - [`courses`]: ordered regex allow-list for top-level courses
//! - [`config`]: `~/.slider/config.yaml` load / save / init
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod courses;
pub mod error;
pub mod types;

pub use config::{Config, DestinationConfig, NotifyConfig, SourceConfig, SyncSettings};
pub use courses::{CourseMatcher, CourseSelector};
pub use error::ConfigError;
pub use types::{
    normalize_timestamp, ItemPath, LedgerEntry, NodeKind, Outcome, RemoteMetadata, RemoteNode,
};
