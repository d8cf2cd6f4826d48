//! `slider status`: what the destination's ledger records.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use slider_core::config;
use slider_sync::{store, Ledger, LedgerSummary};

/// Arguments for `slider status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Inspect the configured remote destination.
    #[arg(long, short = 'd')]
    pub remote: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    destination: String,
    /// `None` when the destination has never been synced.
    ledger: Option<LedgerSummary>,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "destination")]
    destination: String,
    #[tabled(rename = "files")]
    entries: usize,
    #[tabled(rename = "last sync")]
    last_sync: String,
    #[tabled(rename = "ledger format")]
    format: &'static str,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let config = config::load().context("failed to load config; run `slider init` first")?;
        let destination = config
            .select_destination(self.remote)
            .context("no destination to inspect")?;
        let timeout = Duration::from_secs(config.source.timeout_secs);
        let store = store::open(destination, timeout).context("cannot open destination")?;

        let report = StatusReport {
            destination: store.describe(),
            ledger: Ledger::inspect(store.as_ref()).context("cannot read ledger")?,
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(report, Utc::now());
        Ok(())
    }
}

fn print_table(report: StatusReport, now: DateTime<Utc>) {
    let Some(ledger) = report.ledger else {
        println!("{} has never been synced.", report.destination.bold());
        return;
    };

    let row = StatusRow {
        destination: report.destination,
        entries: ledger.entries,
        last_sync: ledger
            .synced_at
            .map(|at| format_age(at, now))
            .unwrap_or_else(|| "unknown".to_string()),
        format: if ledger.legacy { "legacy" } else { "v1" },
    };
    let mut table = Table::new([row]);
    table.with(Style::rounded());
    println!("{table}");

    if ledger.legacy {
        println!(
            "{}",
            "The ledger is rewritten in the current format on the next sync.".yellow()
        );
    }
}

/// Coarse relative time (`just now`, `5m ago`, `3h ago`, `2d ago`).
fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}
