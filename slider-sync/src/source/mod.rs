//! Remote tree providers.
//!
//! The engine walks whatever a [`SourceTree`] yields. Authentication,
//! pagination and page formats stay behind this trait.

pub mod http;

pub use http::HttpIndexSource;

use slider_core::{RemoteMetadata, RemoteNode};

use crate::error::SourceError;

/// Contract of a remote hierarchical listing.
pub trait SourceTree {
    /// Establish a session. Called once, before any listing.
    fn authenticate(&self) -> Result<(), SourceError>;

    /// Top-level entries (courses).
    fn list_root(&self) -> Result<Vec<RemoteNode>, SourceError>;

    /// Immediate children of a folder node, in provider order.
    fn list_children(&self, folder: &RemoteNode) -> Result<Vec<RemoteNode>, SourceError>;

    /// Size and content type without fetching the body.
    fn probe_metadata(&self, file: &RemoteNode) -> Result<RemoteMetadata, SourceError>;

    fn fetch_content(&self, file: &RemoteNode) -> Result<Vec<u8>, SourceError>;
}
