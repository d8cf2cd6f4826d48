//! Generic HTTP index provider.
//!
//! Speaks a small JSON listing protocol: every folder URL answers `GET` with
//! either a bare array or `{"children": [...]}` of
//! `{name, kind?, url, extension?, size?, last_modified?}`. The session is
//! cookie-based; an optional form login establishes it.

use std::io::Read;
use std::time::Duration;

use serde::Deserialize;

use slider_core::{normalize_timestamp, NodeKind, RemoteMetadata, RemoteNode, SourceConfig};

use crate::error::SourceError;
use crate::source::SourceTree;

/// URL fragment that marks a downloadable entry when `kind` is not listed.
const DOWNLOAD_MARKER: &str = "download";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListingDoc {
    Bare(Vec<ListingItem>),
    Wrapped { children: Vec<ListingItem> },
}

#[derive(Debug, Deserialize)]
struct ListingItem {
    name: String,
    #[serde(default)]
    kind: Option<NodeKind>,
    url: String,
    #[serde(default)]
    extension: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    last_modified: Option<String>,
}

/// [`SourceTree`] over an HTTP JSON index with a cookie session.
pub struct HttpIndexSource {
    agent: ureq::Agent,
    root_url: String,
    login_url: Option<String>,
    username: String,
    password: String,
    auth_failure_marker: Option<String>,
}

impl HttpIndexSource {
    pub fn new(config: &SourceConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            agent,
            root_url: config.root_url.clone(),
            login_url: config.login_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            auth_failure_marker: config.auth_failure_marker.clone(),
        }
    }

    /// Absolute URL for a listed locator.
    pub fn resolve(&self, url: &str) -> String {
        resolve_against(&self.root_url, url)
    }

    fn list(&self, url: &str) -> Result<Vec<RemoteNode>, SourceError> {
        let url = self.resolve(url);
        let body = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| map_ureq(&url, e))?
            .into_string()
            .map_err(|source| SourceError::Io {
                url: url.clone(),
                source,
            })?;
        let nodes = parse_listing(&body)?;
        tracing::debug!(%url, children = nodes.len(), "listed");
        Ok(nodes)
    }
}

impl SourceTree for HttpIndexSource {
    fn authenticate(&self) -> Result<(), SourceError> {
        let response = match &self.login_url {
            Some(login_url) => {
                let login_url = self.resolve(login_url);
                self.agent
                    .post(&login_url)
                    .send_form(&[
                        ("username", self.username.as_str()),
                        ("password", self.password.as_str()),
                    ])
                    .map_err(|e| map_login(&login_url, e))?
            }
            None => self
                .agent
                .get(&self.root_url)
                .call()
                .map_err(|e| map_login(&self.root_url, e))?,
        };

        if let Some(marker) = self.auth_failure_marker.as_deref() {
            let body = response.into_string().map_err(|source| SourceError::Io {
                url: self.root_url.clone(),
                source,
            })?;
            // The portal answers 200 even for rejected credentials.
            if body.contains(marker) {
                return Err(SourceError::Authentication(
                    "credentials were not accepted".to_string(),
                ));
            }
        }
        tracing::info!(user = %self.username, "authenticated");
        Ok(())
    }

    fn list_root(&self) -> Result<Vec<RemoteNode>, SourceError> {
        let root = self.root_url.clone();
        self.list(&root)
    }

    fn list_children(&self, folder: &RemoteNode) -> Result<Vec<RemoteNode>, SourceError> {
        self.list(&folder.url)
    }

    fn probe_metadata(&self, file: &RemoteNode) -> Result<RemoteMetadata, SourceError> {
        let url = self.resolve(&file.url);
        let response = self
            .agent
            .head(&url)
            .set("Accept-Encoding", "identity")
            .call()
            .map_err(|e| map_ureq(&url, e))?;

        let size_bytes = match response.header("content-length") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| SourceError::MissingHeader {
                url: url.clone(),
                header: "content-length",
            })?),
            None => None,
        };
        let content_type = response.header("content-type").map(str::to_string);
        Ok(RemoteMetadata {
            size_bytes,
            content_type,
        })
    }

    fn fetch_content(&self, file: &RemoteNode) -> Result<Vec<u8>, SourceError> {
        let url = self.resolve(&file.url);
        let response = self.agent.get(&url).call().map_err(|e| map_ureq(&url, e))?;
        let mut buf = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut buf)
            .map_err(|source| SourceError::Io { url, source })?;
        Ok(buf)
    }
}

/// Decode a listing body into nodes, inferring `kind` from the URL when absent.
pub fn parse_listing(body: &str) -> Result<Vec<RemoteNode>, SourceError> {
    let items = match serde_json::from_str::<ListingDoc>(body)? {
        ListingDoc::Bare(items) => items,
        ListingDoc::Wrapped { children } => children,
    };
    Ok(items.into_iter().map(into_node).collect())
}

fn into_node(item: ListingItem) -> RemoteNode {
    let kind = item.kind.unwrap_or(if item.url.contains(DOWNLOAD_MARKER) {
        NodeKind::File
    } else {
        NodeKind::Folder
    });
    let last_modified = item.last_modified.as_deref().and_then(|raw| {
        let normalized = normalize_timestamp(raw);
        if normalized.is_none() {
            tracing::debug!(name = %item.name, raw, "unrecognized modification date");
        }
        normalized
    });
    RemoteNode {
        name: item.name,
        kind,
        url: item.url,
        extension_hint: item.extension.filter(|e| !e.trim().is_empty()),
        size_hint: item.size,
        last_modified,
    }
}

fn resolve_against(root_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    if let Some(rest) = url.strip_prefix('/') {
        return format!("{}/{rest}", origin(root_url));
    }
    format!("{}/{url}", root_url.trim_end_matches('/'))
}

/// `scheme://host[:port]` of an absolute URL.
fn origin(url: &str) -> &str {
    let after_scheme = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[after_scheme..].find('/') {
        Some(i) => &url[..after_scheme + i],
        None => url,
    }
}

fn map_ureq(url: &str, err: ureq::Error) -> SourceError {
    match err {
        ureq::Error::Status(status, _) => SourceError::Http {
            url: url.to_string(),
            status,
        },
        ureq::Error::Transport(t) => SourceError::Connectivity(t.to_string()),
    }
}

/// Any error status on login counts as rejected credentials.
fn map_login(url: &str, err: ureq::Error) -> SourceError {
    match err {
        ureq::Error::Status(status, _) => {
            SourceError::Authentication(format!("HTTP {status} from {url}"))
        }
        other => map_ureq(url, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://portal.example/", "course/1", "https://portal.example/course/1")]
    #[case("https://portal.example/root", "course/1", "https://portal.example/root/course/1")]
    #[case("https://portal.example/root/", "/dl/7", "https://portal.example/dl/7")]
    #[case("https://portal.example", "/dl/7", "https://portal.example/dl/7")]
    #[case("https://portal.example/", "http://cdn.example/x", "http://cdn.example/x")]
    fn resolves_relative_urls(#[case] root: &str, #[case] url: &str, #[case] expected: &str) {
        assert_eq!(resolve_against(root, url), expected);
    }

    #[test]
    fn parses_bare_listing_and_infers_kind() {
        let nodes = parse_listing(
            r#"[
                {"name": "Lineare Algebra", "url": "/course/12"},
                {"name": "Blatt 1", "url": "/download/99", "size": 2048,
                 "last_modified": "22. May 2019, 14:15"}
            ]"#,
        )
        .unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].kind, NodeKind::Folder);
        assert_eq!(nodes[1].kind, NodeKind::File);
        assert_eq!(nodes[1].size_hint, Some(2048));
        assert_eq!(nodes[1].last_modified.as_deref(), Some("201905221415"));
    }

    #[test]
    fn parses_wrapped_listing_with_explicit_kind() {
        let nodes = parse_listing(
            r#"{"children": [
                {"name": "notes", "kind": "file", "url": "/f/1", "extension": "pdf",
                 "last_modified": "not a date"},
                {"name": "Files", "kind": "folder", "url": "/download-area"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(nodes[0].kind, NodeKind::File);
        assert_eq!(nodes[0].extension_hint.as_deref(), Some("pdf"));
        assert_eq!(nodes[0].last_modified, None);
        assert_eq!(nodes[1].kind, NodeKind::Folder);
    }

    #[test]
    fn blank_extension_counts_as_absent() {
        let nodes =
            parse_listing(r#"[{"name": "x", "url": "/download/1", "extension": " "}]"#).unwrap();
        assert_eq!(nodes[0].extension_hint, None);
    }

    #[test]
    fn malformed_listing_is_json_error() {
        assert!(matches!(
            parse_listing("<html>login</html>"),
            Err(SourceError::Json(_))
        ));
    }

    #[rstest]
    #[case(401)]
    #[case(403)]
    #[case(500)]
    fn login_error_status_is_authentication(#[case] status: u16) {
        let response = ureq::Response::new(status, "Error", "").unwrap();
        let err = map_login("https://portal.example/login", ureq::Error::Status(status, response));
        assert!(matches!(err, SourceError::Authentication(msg) if msg.contains(&status.to_string())));
    }
}
