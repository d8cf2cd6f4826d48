//! Path-safe names from portal display labels.
//!
//! Two transforms share one reserved character class (`! @ # $ / \ : ; * ? < > |`):
//! - [`sanitize`] removes the characters; used for file leaf names.
//! - [`sanitize_for_traversal`] replaces them with `_` and terminates the
//!   segment with `/`; used for intermediate folders while descending.

/// Characters never allowed in a destination path component.
pub const RESERVED: &[char] = &['!', '@', '#', '$', '/', '\\', ':', ';', '*', '?', '<', '>', '|'];

/// Component used when a label sanitizes to nothing.
pub const EMPTY_COMPONENT: &str = "_";

/// Outcome of sanitizing a folder label during descent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalSegment {
    /// A `/`-terminated segment to append to the folder path.
    Named(String),
    /// The passthrough label: contributes nothing to the path, and the
    /// folder header for the next level must not be printed.
    Suppressed,
}

impl TraversalSegment {
    /// Text to append to the current folder path.
    pub fn as_str(&self) -> &str {
        match self {
            TraversalSegment::Named(s) => s,
            TraversalSegment::Suppressed => "",
        }
    }
}

/// Leaf-name transform: `&` → `and`, reserved characters removed, trimmed.
///
/// Total and idempotent; never returns an empty string.
pub fn sanitize(label: &str) -> String {
    let replaced = label.replace('&', "and");
    let stripped: String = replaced.chars().filter(|c| !RESERVED.contains(c)).collect();
    let trimmed = stripped.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        return EMPTY_COMPONENT.to_string();
    }
    trimmed.to_string()
}

/// Folder-segment transform used while building intermediate paths.
///
/// Reserved characters become `_`, the segment gets a trailing `/`. A label
/// equal to `passthrough_label` yields [`TraversalSegment::Suppressed`].
pub fn sanitize_for_traversal(label: &str, passthrough_label: &str) -> TraversalSegment {
    let replaced: String = label
        .chars()
        .map(|c| if RESERVED.contains(&c) { '_' } else { c })
        .collect();
    if replaced == passthrough_label {
        return TraversalSegment::Suppressed;
    }
    let segment = if replaced.trim().is_empty() || replaced.trim().chars().all(|c| c == '.') {
        EMPTY_COMPONENT.to_string()
    } else {
        replaced
    };
    TraversalSegment::Named(format!("{segment}/"))
}
