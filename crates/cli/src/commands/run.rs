//! Run Command

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::debug;

use uisnap_harness::config::Browser;
use uisnap_harness::flow::Viewport;
use uisnap_harness::runner::fixed_identity;
use uisnap_harness::{scenarios, Flow, FlowRunner, HarnessError, RunConfig};

use crate::output::{print_error, print_list, print_success, print_warning, CheckpointRow, OutputFormat};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Built-in flow name (see `uisnap list`)
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    pub flow: Option<String>,

    /// YAML flow file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, default_value = "uisnap.toml")]
    pub config: PathBuf,

    /// Base URL of the web frontend
    #[arg(long, env = "UISNAP_BASE_URL")]
    pub base_url: Option<String>,

    /// Base URL of the content API
    #[arg(long, env = "UISNAP_API_URL")]
    pub api_url: Option<String>,

    /// Directory for screenshots and run-result.json
    #[arg(short, long, env = "UISNAP_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Browser engine (chromium, firefox, webkit)
    #[arg(long)]
    pub browser: Option<Browser>,

    /// Viewport as WIDTHxHEIGHT; overrides the flow's own viewport
    #[arg(long)]
    pub viewport: Option<Viewport>,

    /// Log in as this existing user instead of the flow's identity
    #[arg(long, env = "UISNAP_USER", requires = "password")]
    pub user: Option<String>,

    /// Password for --user
    #[arg(long, env = "UISNAP_PASSWORD", hide_env_values = true, requires = "user")]
    pub password: Option<String>,

    /// Walk the flow without a browser, writing placeholder captures
    #[arg(long)]
    pub dry_run: bool,

    /// Exit non-zero when a checkpoint failed or the session did not start
    #[arg(long)]
    pub strict: bool,
}

impl RunArgs {
    /// Configuration file values with command-line overrides applied
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = RunConfig::load(&self.config)
            .with_context(|| format!("loading {}", self.config.display()))?;

        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(dir) = &self.output {
            config.output_dir = dir.clone();
        }
        if self.headed {
            config.headless = false;
        }
        if let Some(browser) = self.browser {
            config.browser = browser;
        }
        if let Some(viewport) = self.viewport {
            config.viewport = viewport;
        }
        if let (Some(user), Some(password)) = (&self.user, &self.password) {
            config.credentials = Some(fixed_identity(user, password));
        }

        config.validate()?;
        Ok(config)
    }

    fn load_flow(&self) -> Result<Flow> {
        let mut flow = match (&self.file, &self.flow) {
            (Some(path), _) => Flow::from_file(path).with_context(|| format!("loading {}", path.display()))?,
            (None, Some(name)) => scenarios::builtin(name)?,
            (None, None) => anyhow::bail!("either a flow name or --file is required"),
        };
        if self.viewport.is_some() {
            flow.viewport = self.viewport;
        }
        Ok(flow)
    }
}

/// Returns whether the run counts as successful under `--strict`
pub async fn execute(args: RunArgs, format: OutputFormat) -> Result<bool> {
    let config = args.run_config()?;
    let flow = args.load_flow()?;
    debug!("Loaded flow '{}' with checkpoints {:?}", flow.name, flow.checkpoints());

    let runner = if args.dry_run {
        print_warning("Dry run: no browser is launched, captures are placeholders");
        FlowRunner::dry_run(config)
    } else {
        FlowRunner::playwright(config)
    };

    let result = match runner.run(&flow).await {
        Ok(result) => result,
        Err(e @ HarnessError::SessionInit(_)) => {
            print_error(&e.reason());
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => {
            let rows: Vec<CheckpointRow> = result.checkpoints.iter().map(CheckpointRow::from).collect();
            print_list(&rows, format);
            if let Some(err) = &result.teardown_error {
                print_warning(&format!("Browser did not close cleanly: {}", err));
            }
            let summary = format!(
                "{}: {} captured, {} failed in {} ms (record: {})",
                result.flow,
                result.captured(),
                result.failed(),
                result.duration_ms,
                runner.config().result_path().display()
            );
            if result.all_captured() {
                print_success(&summary);
            } else {
                print_warning(&summary);
            }
        }
    }

    Ok(result.all_captured())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn test_overrides_apply_on_top_of_defaults() {
        let dir = std::env::temp_dir().join("uisnap-absent-config.toml");
        let cli = Cli::parse_from([
            "uisnap",
            "login-dashboard",
            "--config",
            dir.to_str().unwrap(),
            "--base-url",
            "http://app.test",
            "--viewport",
            "800x600",
            "--user",
            "alice",
            "--password",
            "pw",
            "--headed",
        ]);
        let config = cli.run.run_config().unwrap();
        assert_eq!(config.base_url, "http://app.test");
        assert_eq!(config.viewport, Viewport { width: 800, height: 600 });
        assert!(!config.headless);
        assert_eq!(config.credentials, Some(fixed_identity("alice", "pw")));

        let flow = cli.run.load_flow().unwrap();
        assert_eq!(flow.viewport, Some(Viewport { width: 800, height: 600 }));
    }

    #[test]
    fn test_flow_name_and_file_conflict() {
        assert!(Cli::try_parse_from(["uisnap", "sns-tour", "--file", "x.yaml"]).is_err());
        assert!(Cli::try_parse_from(["uisnap"]).is_err());
    }

    #[test]
    fn test_user_and_password_come_together() {
        let err = Cli::try_parse_from(["uisnap", "login-dashboard", "--password", "pw"])
            .err()
            .expect("--password alone is rejected");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
        assert!(Cli::try_parse_from(["uisnap", "login-dashboard", "--user", "alice"]).is_err());
    }
}
