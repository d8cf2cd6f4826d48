//! `slider sync`: one crawl-and-sync run.

use anyhow::{Context, Result};
use clap::Args;
use colored::{ColoredString, Colorize};

use slider_core::{config, Config, Outcome};
use slider_sync::{pipeline, SyncEvent};

/// Arguments for `slider sync`. Flags override the config for this run only.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Sync into the configured remote destination.
    #[arg(long, short = 'd')]
    pub remote: bool,

    /// Also record skipped and already-synced files in the changelog.
    #[arg(long, short = 'l')]
    pub log_all: bool,

    /// Mail a summary when new files were downloaded.
    #[arg(long, short = 'm')]
    pub mail: bool,

    /// Skip files of at least this many bytes.
    #[arg(long, short = 'x', value_name = "BYTES")]
    pub max_size: Option<f64>,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let mut config = config::load().context("failed to load config; run `slider init` first")?;
        self.apply(&mut config);
        config.validate().context("invalid option")?;

        let report = pipeline::run(&config, self.remote, print_event).context("sync failed")?;

        if let Some(path) = &report.changelog_path {
            println!("{} {path}", "changelog:".bright_black());
        }
        println!("{}", report.summary.bold());
        Ok(())
    }

    fn apply(&self, config: &mut Config) {
        if self.log_all {
            config.sync.log_all = true;
        }
        if self.mail {
            config.notify.enabled = true;
            if config.notify.to.is_none() {
                tracing::warn!("--mail given but notify.to is not configured");
            }
        }
        if let Some(max) = self.max_size {
            config.sync.max_file_size = max;
        }
    }
}

fn print_event(event: &SyncEvent<'_>) {
    let key = event.key();
    match event {
        SyncEvent::FolderHeader { path } => println!("{}: {}", key.bold(), path),
        SyncEvent::EmptyFolder { path } => println!("{}: {}", key.bright_black(), path),
        SyncEvent::NotSelected { name } => println!("{}: {}", key.bright_black(), name),
        SyncEvent::Item { outcome, detail } => println!("{}: {}", paint(*outcome, key), detail),
    }
}

fn paint(outcome: Outcome, key: &str) -> ColoredString {
    match outcome {
        Outcome::New => key.green(),
        Outcome::Update => key.cyan(),
        Outcome::SafeOverwrite => key.yellow(),
        Outcome::Failed => key.red().bold(),
        Outcome::Skipped | Outcome::AlreadySynced => key.bright_black(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slider_core::{DestinationConfig, NotifyConfig, SourceConfig, SyncSettings};

    fn config() -> Config {
        Config {
            version: 1,
            source: SourceConfig {
                root_url: "https://portal.example.org/tree".into(),
                login_url: None,
                username: String::new(),
                password: String::new(),
                auth_failure_marker: None,
                timeout_secs: 5,
            },
            courses: vec![],
            destination: DestinationConfig::Local { path: "/tmp/uni".into() },
            alternate_destination: None,
            sync: SyncSettings::default(),
            notify: NotifyConfig::default(),
        }
    }

    #[test]
    fn flags_override_config_for_one_run() {
        let args = SyncArgs {
            remote: false,
            log_all: true,
            mail: true,
            max_size: Some(1024.0),
        };
        let mut config = config();
        args.apply(&mut config);
        assert!(config.sync.log_all);
        assert!(config.notify.enabled);
        assert_eq!(config.sync.max_file_size, 1024.0);
    }

    #[test]
    fn absent_flags_leave_config_alone() {
        let args = SyncArgs {
            remote: false,
            log_all: false,
            mail: false,
            max_size: None,
        };
        let mut config = config();
        args.apply(&mut config);
        assert_eq!(config, self::config());
    }
}
