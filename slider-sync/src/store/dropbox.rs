//! Dropbox v2 HTTP API behind [`ObjectApi`].
//!
//! RPC endpoints take a JSON body; content endpoints carry their arguments in
//! the `Dropbox-API-Arg` header and the payload as an octet stream.

use std::io::Read;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use slider_core::ItemPath;

use crate::error::StoreError;
use crate::store::remote::{CommitInfo, ObjectApi, SessionCursor, WriteMode};

const RPC_BASE: &str = "https://api.dropboxapi.com/2";
const CONTENT_BASE: &str = "https://content.dropboxapi.com/2";

/// Blocking Dropbox client authenticated with a bearer token.
pub struct DropboxApi {
    agent: ureq::Agent,
    token: String,
}

#[derive(Deserialize)]
struct SessionStart {
    session_id: String,
}

#[derive(Deserialize)]
struct MoveResult {
    metadata: MovedMetadata,
}

#[derive(Deserialize)]
struct MovedMetadata {
    path_display: Option<String>,
}

impl DropboxApi {
    pub fn new(token: String, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent, token }
    }

    /// Cheap authenticated call; a rejected token surfaces as HTTP 401.
    pub fn verify_token(&self) -> Result<(), StoreError> {
        self.agent
            .post(&format!("{RPC_BASE}/users/get_current_account"))
            .set("Authorization", &self.bearer())
            .call()
            .map_err(map_ureq)?;
        Ok(())
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn rpc(&self, endpoint: &str, body: Value) -> Result<ureq::Response, StoreError> {
        self.agent
            .post(&format!("{RPC_BASE}/{endpoint}"))
            .set("Authorization", &self.bearer())
            .send_json(body)
            .map_err(map_ureq)
    }

    fn content(&self, endpoint: &str, arg: Value, bytes: &[u8]) -> Result<ureq::Response, StoreError> {
        self.agent
            .post(&format!("{CONTENT_BASE}/{endpoint}"))
            .set("Authorization", &self.bearer())
            .set("Dropbox-API-Arg", &header_safe_json(&arg))
            .set("Content-Type", "application/octet-stream")
            .send_bytes(bytes)
            .map_err(map_ureq)
    }
}

impl ObjectApi for DropboxApi {
    fn exists(&self, path: &str) -> Result<bool, StoreError> {
        match self.rpc("files/get_metadata", json!({ "path": path })) {
            Ok(_) => Ok(true),
            Err(StoreError::Api { status: 409, body }) if body.contains("not_found") => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn create_folder(&self, path: &str) -> Result<(), StoreError> {
        match self.rpc(
            "files/create_folder_v2",
            json!({ "path": path, "autorename": false }),
        ) {
            Ok(_) => Ok(()),
            // Raced with another writer; the folder is there either way.
            Err(StoreError::Api { status: 409, body }) if body.contains("conflict/folder") => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn upload(&self, commit: &CommitInfo, bytes: &[u8]) -> Result<(), StoreError> {
        self.content("files/upload", commit_arg(commit), bytes)?;
        Ok(())
    }

    fn session_start(&self, first: &[u8]) -> Result<String, StoreError> {
        let resp = self.content("files/upload_session/start", json!({ "close": false }), first)?;
        let started: SessionStart = resp
            .into_json()
            .map_err(|e| StoreError::Transport(format!("upload session start: {e}")))?;
        Ok(started.session_id)
    }

    fn session_append(&self, cursor: &SessionCursor, chunk: &[u8]) -> Result<(), StoreError> {
        self.content(
            "files/upload_session/append_v2",
            json!({ "cursor": cursor_arg(cursor), "close": false }),
            chunk,
        )?;
        Ok(())
    }

    fn session_finish(
        &self,
        cursor: &SessionCursor,
        last: &[u8],
        commit: &CommitInfo,
    ) -> Result<(), StoreError> {
        self.content(
            "files/upload_session/finish",
            json!({ "cursor": cursor_arg(cursor), "commit": commit_arg(commit) }),
            last,
        )?;
        Ok(())
    }

    fn move_object(&self, from: &str, to: &str) -> Result<String, StoreError> {
        let resp = self.rpc(
            "files/move_v2",
            json!({ "from_path": from, "to_path": to, "autorename": true }),
        )?;
        let moved: MoveResult = resp
            .into_json()
            .map_err(|e| StoreError::Transport(format!("move result: {e}")))?;
        Ok(moved.metadata.path_display.unwrap_or_else(|| to.to_string()))
    }

    fn download(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let resp = match self.content("files/download", json!({ "path": path }), &[]) {
            Ok(resp) => resp,
            Err(StoreError::Api { status: 409, body }) if body.contains("not_found") => {
                return Err(StoreError::NotFound {
                    path: ItemPath::from(path.trim_start_matches('/')),
                })
            }
            Err(e) => return Err(e),
        };
        let mut buf = Vec::new();
        resp.into_reader()
            .read_to_end(&mut buf)
            .map_err(|e| StoreError::Transport(format!("download {path}: {e}")))?;
        Ok(buf)
    }
}

fn commit_arg(commit: &CommitInfo) -> Value {
    let mode = match commit.mode {
        WriteMode::Add => "add",
        WriteMode::Overwrite => "overwrite",
    };
    json!({
        "path": commit.path,
        "mode": mode,
        "autorename": false,
        "mute": commit.mute,
    })
}

fn cursor_arg(cursor: &SessionCursor) -> Value {
    json!({ "session_id": cursor.session_id, "offset": cursor.offset })
}

fn map_ureq(err: ureq::Error) -> StoreError {
    match err {
        ureq::Error::Status(status, resp) => StoreError::Api {
            status,
            body: resp.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(t) => StoreError::Transport(t.to_string()),
    }
}

/// JSON for an HTTP header: non-ASCII characters escaped as `\uXXXX`.
fn header_safe_json(value: &Value) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() && c != '\x7f' {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}
