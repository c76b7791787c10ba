//! uisnap CLI - Main Entry Point
//!
//! Runs scripted capture flows against a web application and reports
//! which checkpoints were captured.

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{config, flows, run};

/// uisnap - scripted UI snapshots at named checkpoints
#[derive(Parser)]
#[command(name = "uisnap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a built-in or YAML flow
    Run(run::RunArgs),

    /// List built-in flows and the files they produce
    List(flows::ListArgs),

    /// Print a built-in flow as YAML
    Show(flows::ShowArgs),

    /// Write a default configuration file
    InitConfig(config::InitConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run(args) => {
            let strict = args.strict;
            let succeeded = run::execute(args, cli.format).await?;
            if strict && !succeeded {
                std::process::exit(1);
            }
        }
        Commands::List(args) => flows::list(args, cli.format)?,
        Commands::Show(args) => flows::show(args)?,
        Commands::InitConfig(args) => config::init(args)?,
    }

    Ok(())
}
