//! Sync pipeline entrypoint used by the CLI.
//!
//! authenticate → open ledger → traverse → close ledger → write changelog →
//! notify. The ledger is closed even when the traversal fails, so progress
//! made before the failure is kept.

use std::time::Duration;

use chrono::Local;

use slider_core::{Config, CourseMatcher, ItemPath, SyncSettings};

use crate::changelog::{self, ChangelogLine, CHANGELOG_FOLDER};
use crate::engine::{SyncEngine, SyncEvent};
use crate::error::SyncError;
use crate::ledger::Ledger;
use crate::notify::{self, Notifier, SendmailNotifier};
use crate::source::{HttpIndexSource, SourceTree};
use crate::store::{self, Store};

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Human-readable destination (`Store::describe`).
    pub destination: String,
    pub new_count: usize,
    pub downloads: Vec<ItemPath>,
    pub changelog: Vec<ChangelogLine>,
    /// Where the changelog was written, if anything was recorded.
    pub changelog_path: Option<ItemPath>,
    /// `Files were already up to date.` / `N new file(s) downloaded to …`
    pub summary: String,
}

/// Run against the destinations and source named in `config`.
///
/// `remote` selects the configured remote destination for this run.
pub fn run(
    config: &Config,
    remote: bool,
    observer: impl FnMut(&SyncEvent<'_>),
) -> Result<RunReport, SyncError> {
    let courses = config.course_matcher().map_err(|e| aborted(e.into()))?;
    let destination = config
        .select_destination(remote)
        .map_err(|e| aborted(e.into()))?;
    let timeout = Duration::from_secs(config.source.timeout_secs);

    let store = store::open(destination, timeout).map_err(aborted)?;
    let source = HttpIndexSource::new(&config.source);
    let notifier = SendmailNotifier::from_config(&config.notify);

    run_with(
        &source,
        store.as_ref(),
        &courses,
        &config.sync,
        notifier.as_ref().map(|n| n as &dyn Notifier),
        observer,
    )
}

/// Pipeline over explicit collaborators.
pub fn run_with(
    source: &dyn SourceTree,
    store: &dyn Store,
    courses: &CourseMatcher,
    settings: &SyncSettings,
    notifier: Option<&dyn Notifier>,
    observer: impl FnMut(&SyncEvent<'_>),
) -> Result<RunReport, SyncError> {
    source
        .authenticate()
        .map_err(|e| aborted(SyncError::from_startup(e)))?;

    store
        .create_folder(&ItemPath::folder(CHANGELOG_FOLDER))
        .map_err(|e| aborted(SyncError::Store(e)))?;
    let work_dir = settings.work_dir.clone().unwrap_or_else(std::env::temp_dir);
    let mut ledger = Ledger::open(store, &work_dir).map_err(aborted)?;

    let traversal = SyncEngine::new(source, store, &mut ledger, courses, settings)
        .with_observer(observer)
        .run();
    let closed = ledger.close(store);
    let state = traversal.map_err(aborted)?;
    closed.map_err(aborted)?;

    let changelog_path = match changelog::write(store, &state.changelog, Local::now()) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(error = %e, "changelog not written");
            None
        }
    };

    let destination = store.describe();
    let summary = notify::summary(state.new_count, &destination);
    if state.new_count > 0 {
        if let Some(notifier) = notifier {
            if let Err(e) = notifier.send(&summary, &state.changelog, state.new_count) {
                tracing::warn!(error = %e, "notification failed");
            }
        }
    }
    tracing::info!(new = state.new_count, %destination, "run finished");

    Ok(RunReport {
        destination,
        new_count: state.new_count,
        downloads: state.downloads,
        changelog: state.changelog,
        changelog_path,
        summary,
    })
}

/// Log a run-level failure before it is returned to the caller.
fn aborted(err: SyncError) -> SyncError {
    tracing::error!(error = %err, "sync run aborted");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::store::LocalStore;
    use slider_core::{RemoteMetadata, RemoteNode};
    use std::io;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct RejectingSource;

    impl SourceTree for RejectingSource {
        fn authenticate(&self) -> Result<(), SourceError> {
            Err(SourceError::Authentication("wrong password".into()))
        }

        fn list_root(&self) -> Result<Vec<RemoteNode>, SourceError> {
            Ok(vec![])
        }

        fn list_children(&self, _folder: &RemoteNode) -> Result<Vec<RemoteNode>, SourceError> {
            Ok(vec![])
        }

        fn probe_metadata(&self, _file: &RemoteNode) -> Result<RemoteMetadata, SourceError> {
            Ok(RemoteMetadata::default())
        }

        fn fetch_content(&self, _file: &RemoteNode) -> Result<Vec<u8>, SourceError> {
            Ok(vec![])
        }
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn aborted_run_is_logged_at_error() {
        let dest = TempDir::new().unwrap();
        let store = LocalStore::new(dest.path());
        let courses = CourseMatcher::compile(&[]).unwrap();
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let result = tracing::subscriber::with_default(subscriber, || {
            run_with(&RejectingSource, &store, &courses, &SyncSettings::default(), None, |_| {})
        });

        assert!(matches!(result, Err(SyncError::AuthenticationFailure(_))));
        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("ERROR"), "logs: {logs}");
        assert!(logs.contains("sync run aborted"));
        assert!(logs.contains("wrong password"));
    }
}
