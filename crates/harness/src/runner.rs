//! Orchestrates one flow run: identity, session, stages and run record

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::artifacts::ArtifactStore;
use crate::config::RunConfig;
use crate::content::REACTION_EMOJIS;
use crate::credentials::{CredentialMode, Credentials};
use crate::driver::FlowDriver;
use crate::engine::{BrowserEngine, EngineFactory, LaunchOptions};
use crate::error::{HarnessError, HarnessResult};
use crate::flow::Flow;
use crate::playwright::PlaywrightEngine;
use crate::preflight::{self, Reachability};
use crate::result::RunResult;
use crate::scripted::ScriptedEngine;
use crate::sequencer::StepSequencer;
use crate::template::TemplateContext;

/// Runs flows against browser sessions created by an engine factory
pub struct FlowRunner {
    config: RunConfig,
    engines: Arc<dyn EngineFactory>,
}

impl FlowRunner {
    pub fn new(config: RunConfig, engines: Arc<dyn EngineFactory>) -> Self {
        Self { config, engines }
    }

    /// Runner driving a real browser through the Playwright bridge
    pub fn playwright(config: RunConfig) -> Self {
        let engine_config = config.engine.clone();
        let grace = config.timeouts.grace();
        Self::new(
            config,
            Arc::new(move || -> Box<dyn BrowserEngine> {
                Box::new(PlaywrightEngine::new(engine_config.clone(), grace))
            }),
        )
    }

    /// Runner that walks the flow without a browser, writing placeholder
    /// captures
    pub fn dry_run(config: RunConfig) -> Self {
        let config = RunConfig { preflight: false, ..config };
        Self::new(
            config,
            Arc::new(|| -> Box<dyn BrowserEngine> { Box::new(ScriptedEngine::new()) }),
        )
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Identity for a run of `flow`: the configured override, then the
    /// identity the flow asks for, then a fresh random user.
    pub fn credentials_for(&self, flow: &Flow) -> Credentials {
        let mode = self
            .config
            .credentials
            .clone()
            .or_else(|| flow.identity.clone())
            .unwrap_or_default();
        Credentials::from_mode(&mode)
    }

    /// Values bound to `${...}` placeholders for one run
    pub fn template_context(&self, flow: &Flow, credentials: &Credentials) -> HarnessResult<TemplateContext> {
        let mut ctx = TemplateContext::new();
        for (key, value) in &flow.vars {
            ctx.set(key.clone(), value.clone());
        }
        ctx.set("base_url", self.config.base_url());
        ctx.set("api_url", self.config.api_url());
        ctx.set("username", credentials.username.as_str());
        ctx.set("password", credentials.password.as_str());
        ctx.set("content", serde_json::to_value(&flow.content)?);
        ctx.set("emojis", serde_json::to_value(REACTION_EMOJIS)?);
        Ok(ctx)
    }

    /// Run one flow end to end.
    ///
    /// Step and checkpoint failures are recorded in the returned result.
    /// Only a session that cannot start is an error, and the session is
    /// closed before it is returned. The run record is written to
    /// `run-result.json` in the output directory.
    pub async fn run(&self, flow: &Flow) -> HarnessResult<RunResult> {
        flow.validate()?;

        if self.config.preflight {
            self.preflight().await;
        }

        let credentials = self.credentials_for(flow);
        info!("Using identity {}", credentials.username);
        let templates = self.template_context(flow, &credentials)?;
        let artifacts = ArtifactStore::open(&self.config.output_dir)?;

        let viewport = flow.viewport.unwrap_or(self.config.viewport);
        let options = LaunchOptions {
            browser: self.config.browser,
            headless: self.config.headless,
            timeout: self.config.timeouts.launch(),
        };

        let mut driver = FlowDriver::new(self.engines.create(), self.config.timeouts);

        let started = match driver.start(&options, viewport).await {
            Ok(()) => driver.dialog_policy(self.config.auto_accept_dialogs).await,
            Err(e) => Err(e),
        };
        if let Err(e) = started {
            error!("Session init failed: {}", e);
            driver.stop().await;
            return Err(match e {
                HarnessError::SessionInit(_) => e,
                other => HarnessError::SessionInit(other.to_string()),
            });
        }

        let mut result = StepSequencer::new(&artifacts, &templates).run(&mut driver, flow).await;
        driver.stop().await;

        result.username = Some(credentials.username.clone());
        result.teardown_error = driver.teardown_error().map(String::from);

        if let Err(e) = result.write(&self.config.result_path()) {
            warn!("Could not write run record: {}", e);
        }
        Ok(result)
    }

    async fn preflight(&self) {
        let url = self.config.base_url();
        match preflight::probe(url, self.config.timeouts.preflight()).await {
            Ok(Reachability::Reachable { status, attempts }) => {
                debug!("{} answered {} after {} attempt(s)", url, status, attempts)
            }
            Ok(Reachability::Unreachable { attempts, last_error }) => warn!(
                "{} is not reachable after {} attempt(s) ({}); running anyway",
                url, attempts, last_error
            ),
            Err(e) => warn!("Preflight probe of {} failed: {}", url, e),
        }
    }
}

/// Fixed identity for a runner, e.g. from `--user`/`--password`
pub fn fixed_identity(username: &str, password: &str) -> CredentialMode {
    CredentialMode::Fixed {
        username: username.to_string(),
        password: password.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::Stage;

    fn config(dir: &std::path::Path) -> RunConfig {
        RunConfig {
            output_dir: dir.to_path_buf(),
            preflight: false,
            ..Default::default()
        }
    }

    fn flow_with_identity(identity: Option<CredentialMode>) -> Flow {
        let mut flow = Flow::builder("id")
            .stage(Stage::checkpoint("home").screenshot("home"))
            .build()
            .unwrap();
        flow.identity = identity;
        flow
    }

    #[test]
    fn test_identity_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let seeded = fixed_identity("test@example.com", "secret");

        let runner = FlowRunner::dry_run(config(dir.path()));
        let creds = runner.credentials_for(&flow_with_identity(Some(seeded.clone())));
        assert_eq!(creds.username, "test@example.com");

        let creds = runner.credentials_for(&flow_with_identity(None));
        assert!(creds.username.starts_with("user_"));
        assert_eq!(creds.password, "password123");

        let runner = FlowRunner::dry_run(RunConfig {
            credentials: Some(fixed_identity("override", "pw")),
            ..config(dir.path())
        });
        let creds = runner.credentials_for(&flow_with_identity(Some(seeded)));
        assert_eq!(creds.username, "override");
    }

    #[test]
    fn test_template_context_binds_run_values() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FlowRunner::dry_run(RunConfig {
            base_url: "http://app.test/".to_string(),
            ..config(dir.path())
        });
        let flow = Flow::builder("ctx")
            .var("base_url", serde_json::json!("ignored"))
            .var("extra", serde_json::json!([1, 2]))
            .stage(Stage::checkpoint("home").screenshot("home"))
            .build()
            .unwrap();
        let ctx = runner
            .template_context(&flow, &Credentials::fixed("alice", "pw"))
            .unwrap();
        assert_eq!(ctx.get("base_url").unwrap(), "http://app.test");
        assert_eq!(ctx.get("username").unwrap(), "alice");
        assert_eq!(ctx.get("emojis").unwrap().as_array().unwrap().len(), 4);
        assert_eq!(ctx.get("extra").unwrap(), &serde_json::json!([1, 2]));
    }

    #[tokio::test]
    async fn test_dry_run_writes_record() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FlowRunner::dry_run(config(dir.path()));
        let flow = flow_with_identity(Some(fixed_identity("bob", "pw")));

        let result = runner.run(&flow).await.unwrap();
        assert!(result.all_captured());
        assert_eq!(result.username.as_deref(), Some("bob"));

        let stored = RunResult::read(&runner.config().result_path()).unwrap();
        assert_eq!(stored.run_id, result.run_id);
        let json = std::fs::read_to_string(runner.config().result_path()).unwrap();
        assert!(!json.contains("\"pw\""));
    }
}
