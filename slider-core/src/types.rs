//! Domain types shared by the crawler, the ledger and the stores.
//!
//! Destination paths are store-relative `/`-separated strings wrapped in
//! [`ItemPath`]; they address local files and remote objects alike, so they
//! are never `PathBuf`.

use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Side-folder that receives pre-existing objects displaced by a new download.
pub const OVERWRITTEN_FOLDER: &str = ".overwritten/";

/// Normalized remote modification marker format (`YYYYMMDDHHMM`).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

// ---------------------------------------------------------------------------
// ItemPath
// ---------------------------------------------------------------------------

/// A sanitized, store-relative destination path.
///
/// Folder paths carry a trailing `/` (`Course/Slides/`), file paths do not
/// (`Course/Slides/intro.pdf`). The empty path is the destination root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemPath(pub String);

impl ItemPath {
    pub fn root() -> Self {
        Self(String::new())
    }

    /// A folder path for `name`, guaranteed to end with `/`.
    pub fn folder(name: &str) -> Self {
        let mut s = name.trim_start_matches('/').to_string();
        if !s.is_empty() && !s.ends_with('/') {
            s.push('/');
        }
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_folder(&self) -> bool {
        self.0.is_empty() || self.0.ends_with('/')
    }

    /// Append a traversal segment (already terminated by `/`, or empty).
    pub fn push_segment(&self, segment: &str) -> Self {
        Self(format!("{}{}", self.0, segment))
    }

    /// File path `<self><stem>.<extension>` inside this folder.
    pub fn file(&self, stem: &str, extension: &str) -> Self {
        Self(format!("{}{}.{}", self.0, stem, extension))
    }

    /// Path without the trailing folder separator.
    pub fn trimmed(&self) -> &str {
        self.0.trim_end_matches('/')
    }

    /// Non-empty `/`-separated components.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Enclosing folder (`Course/a.pdf` → `Course/`).
    pub fn parent(&self) -> Self {
        let trimmed = self.trimmed();
        match trimmed.rfind('/') {
            Some(idx) => Self(trimmed[..=idx].to_string()),
            None => Self::root(),
        }
    }

    /// Last component without trailing separator.
    pub fn file_name(&self) -> &str {
        let trimmed = self.trimmed();
        match trimmed.rfind('/') {
            Some(idx) => &trimmed[idx + 1..],
            None => trimmed,
        }
    }

    /// Split the file name into stem and extension (`a.tar.gz` → `a.tar`, `gz`).
    pub fn split_extension(&self) -> (&str, Option<&str>) {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => (name, None),
            Some(idx) => (&name[..idx], Some(&name[idx + 1..])),
        }
    }

    /// Same file name with `suffix` inserted before the extension.
    pub fn with_stem_suffix(&self, suffix: &str) -> Self {
        let parent = self.parent();
        match self.split_extension() {
            (stem, Some(ext)) => parent.file(&format!("{stem}{suffix}"), ext),
            (stem, None) => Self(format!("{}{}{}", parent.0, stem, suffix)),
        }
    }

    /// Mirror of this path inside [`OVERWRITTEN_FOLDER`].
    pub fn overwritten(&self) -> Self {
        Self(format!("{OVERWRITTEN_FOLDER}{}", self.0))
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ItemPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemPath {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Remote tree
// ---------------------------------------------------------------------------

/// Whether a remote entry is descended into or downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    File,
}

/// One entry encountered during traversal. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNode {
    /// Display label as shown by the portal (untrusted).
    pub name: String,
    pub kind: NodeKind,
    /// Locator used to list children (folders) or fetch content (files).
    pub url: String,
    /// Explicit extension listed by the portal, without the dot.
    pub extension_hint: Option<String>,
    /// Size listed by the portal, in bytes.
    pub size_hint: Option<u64>,
    /// Normalized `YYYYMMDDHHMM` modification marker.
    pub last_modified: Option<String>,
}

impl RemoteNode {
    pub fn folder(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Folder,
            url: url.into(),
            extension_hint: None,
            size_hint: None,
            last_modified: None,
        }
    }

    pub fn file(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::File,
            ..Self::folder(name, url)
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension_hint = Some(extension.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }

    pub fn with_last_modified(mut self, marker: impl Into<String>) -> Self {
        self.last_modified = Some(marker.into());
        self
    }
}

/// Result of a metadata-only probe (`HEAD`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteMetadata {
    pub size_bytes: Option<u64>,
    pub content_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Ledger rows and outcomes
// ---------------------------------------------------------------------------

/// One row of durable synchronization state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub path: ItemPath,
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
}

/// Per-item classification produced by the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Skipped,
    AlreadySynced,
    New,
    Update,
    SafeOverwrite,
    Failed,
}

impl Outcome {
    /// Stable machine-parsable prefix used in logs and changelogs.
    pub fn key(&self) -> &'static str {
        match self {
            Outcome::Skipped => "skipped",
            Outcome::AlreadySynced => "already_synced",
            Outcome::New => "new",
            Outcome::Update => "update",
            Outcome::SafeOverwrite => "safe_overwrite",
            Outcome::Failed => "failed",
        }
    }

    /// `true` for outcomes that persisted new content to the store.
    pub fn is_download(&self) -> bool {
        matches!(self, Outcome::New | Outcome::Update | Outcome::SafeOverwrite)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Normalize a remote modification date to the sortable `YYYYMMDDHHMM` form.
///
/// Accepts the portal listing form (`22. May 2019, 14:15`), RFC 3339,
/// RFC 2822 and already-normalized markers. Returns `None` for anything else.
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.len() == 12 && raw.bytes().all(|b| b.is_ascii_digit()) {
        return Some(raw.to_string());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%d. %b %Y, %H:%M") {
        return Some(dt.format(TIMESTAMP_FORMAT).to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc().format(TIMESTAMP_FORMAT).to_string());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.naive_utc().format(TIMESTAMP_FORMAT).to_string());
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
