//! Run summaries and mail notification.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use slider_core::NotifyConfig;

use crate::changelog::ChangelogLine;
use crate::error::NotifyError;

/// One-line run summary, also used as the mail subject.
pub fn summary(new_count: usize, destination: &str) -> String {
    match new_count {
        0 => "Files were already up to date.".to_string(),
        1 => format!("1 new file downloaded to {destination}."),
        n => format!("{n} new files downloaded to {destination}."),
    }
}

/// Delivers the summary of a run with new downloads.
pub trait Notifier {
    fn send(&self, summary: &str, lines: &[ChangelogLine], new_count: usize) -> Result<(), NotifyError>;
}

/// Pipes an RFC 5322 message into a local `sendmail`.
#[derive(Debug, Clone)]
pub struct SendmailNotifier {
    program: PathBuf,
    to: String,
    from: Option<String>,
}

impl SendmailNotifier {
    pub fn new(program: impl Into<PathBuf>, to: impl Into<String>, from: Option<String>) -> Self {
        Self {
            program: program.into(),
            to: to.into(),
            from,
        }
    }

    /// `None` when notification is disabled or has no recipient.
    pub fn from_config(config: &NotifyConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let to = config.to.as_deref().filter(|t| !t.trim().is_empty())?;
        Some(Self::new(config.sendmail.clone(), to, config.from.clone()))
    }

    fn compose(&self, summary: &str, lines: &[ChangelogLine], new_count: usize) -> String {
        let mut msg = format!("To: {}\n", self.to);
        if let Some(from) = &self.from {
            msg.push_str(&format!("From: {from}\n"));
        }
        msg.push_str(&format!("Subject: {summary}\n"));
        msg.push_str("Content-Type: text/plain; charset=utf-8\n\n");
        msg.push_str(&format!("{new_count} new download(s).\n\n"));
        for line in lines {
            msg.push_str(&line.to_string());
            msg.push('\n');
        }
        msg
    }
}

impl Notifier for SendmailNotifier {
    fn send(&self, summary: &str, lines: &[ChangelogLine], new_count: usize) -> Result<(), NotifyError> {
        let spawn_err = |source| NotifyError::Spawn {
            program: self.program.clone(),
            source,
        };
        let mut child = Command::new(&self.program)
            .args(["-t", "-oi"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(spawn_err)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(self.compose(summary, lines, new_count).as_bytes())
                .map_err(spawn_err)?;
        }
        let status = child.wait().map_err(spawn_err)?;
        if !status.success() {
            return Err(NotifyError::Exit {
                program: self.program.clone(),
                status,
            });
        }
        tracing::info!(to = %self.to, "notification sent");
        Ok(())
    }
}
