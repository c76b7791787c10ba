//! Configuration Commands

use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;

use uisnap_harness::RunConfig;

use crate::output::print_success;

#[derive(Args, Debug)]
pub struct InitConfigArgs {
    /// Where to write the configuration
    #[arg(default_value = "uisnap.toml")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub fn init(args: InitConfigArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", args.path.display());
    }
    RunConfig::default().save(&args.path)?;
    print_success(&format!("Wrote default configuration to {}", args.path.display()));
    Ok(())
}
