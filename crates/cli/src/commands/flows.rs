//! Flow Listing Commands

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use uisnap_harness::{scenarios, Flow};

use crate::output::{print_list, FlowRow, OutputFormat};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Also list YAML flows found under this directory
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Only list flows with this tag
    #[arg(short, long)]
    pub tag: Option<String>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Built-in flow name
    pub flow: String,
}

fn collect(args: &ListArgs) -> Result<Vec<Flow>> {
    let mut flows = scenarios::all()?;
    if let Some(dir) = &args.dir {
        let loaded = Flow::load_all(dir).with_context(|| format!("loading flows from {}", dir.display()))?;
        flows.extend(loaded);
    }
    if let Some(tag) = &args.tag {
        flows = Flow::filter_by_tag(&flows, tag).into_iter().cloned().collect();
    }
    Ok(flows)
}

pub fn list(args: ListArgs, format: OutputFormat) -> Result<()> {
    let rows: Vec<FlowRow> = collect(&args)?.iter().map(FlowRow::from).collect();
    print_list(&rows, format);
    Ok(())
}

/// Print a built-in flow as YAML, ready to copy and edit
pub fn show(args: ShowArgs) -> Result<()> {
    let flow = scenarios::builtin(&args.flow)?;
    print!("{}", flow.to_yaml()?);
    Ok(())
}
