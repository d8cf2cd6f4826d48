//! `slider init [--force]`

use anyhow::{Context, Result};
use clap::Args;

use slider_core::config;

/// Write a commented starter config.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Replace an existing config.
    #[arg(long, short = 'f')]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let path = config::init(self.force).context("failed to write starter config")?;
        println!("✓ Wrote {}", path.display());
        println!("  Fill in source credentials, courses and destination, then run `slider sync`.");
        Ok(())
    }
}
