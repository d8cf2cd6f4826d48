//! Per-run changelog artifact.
//!
//! One text object per run under `.changelog/`, named by local run time:
//!
//! ```text
//! # Changelog from 2019-05-22_14-15-00
//! -------------------------------------
//! new: Course/report.pdf from https://portal/download/7
//! update: Course/notes_UP3f2a.pdf
//! ```

use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;

use slider_core::{ItemPath, Outcome};

use crate::error::SyncError;
use crate::store::Store;

pub const CHANGELOG_FOLDER: &str = ".changelog/";

/// Run-stamp format used in the file name and header.
pub const STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// One `kind: detail` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogLine {
    pub outcome: Outcome,
    pub detail: String,
}

impl ChangelogLine {
    pub fn new(outcome: Outcome, detail: impl Into<String>) -> Self {
        Self {
            outcome,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ChangelogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.outcome.key(), self.detail)
    }
}

/// `.changelog/changelog_<stamp>.txt`
pub fn changelog_path(stamp: &str) -> ItemPath {
    ItemPath::from(format!("{CHANGELOG_FOLDER}changelog_{stamp}.txt"))
}

/// Header, a dashed rule as long as the header line including its newline,
/// then one line per entry.
pub fn render(stamp: &str, lines: &[ChangelogLine]) -> String {
    let header = format!("# Changelog from {stamp}\n");
    let rule = "-".repeat(header.chars().count());
    let mut out = format!("{header}{rule}\n");
    for line in lines {
        out.push_str(&line.to_string());
        out.push('\n');
    }
    out
}

/// Persist `lines` to the store. Nothing is written for an empty run.
pub fn write(
    store: &dyn Store,
    lines: &[ChangelogLine],
    at: DateTime<Local>,
) -> Result<Option<ItemPath>, SyncError> {
    if lines.is_empty() {
        return Ok(None);
    }
    let stamp = at.format(STAMP_FORMAT).to_string();
    let path = changelog_path(&stamp);
    store
        .save_file(&path, render(&stamp, lines).as_bytes(), false)
        .map_err(|source| SyncError::StoreWriteFailure {
            path: path.clone(),
            source,
        })?;
    tracing::debug!(%path, lines = lines.len(), "changelog written");
    Ok(Some(path))
}
