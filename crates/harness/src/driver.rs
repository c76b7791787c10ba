//! Browser session lifecycle and step primitives

use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::TimeoutConfig;
use crate::engine::{BrowserEngine, CaptureTarget, DialogPolicy, EngineError, EngineResult, LaunchOptions};
use crate::error::{HarnessError, HarnessResult};
use crate::flow::{Condition, Viewport};
use crate::sync::StateSynchronizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Engine created, nothing launched
    Idle,
    /// Browser, context and page are up
    Open,
    /// Start failed part way; resources may still need closing
    Broken,
    /// `stop` ran; the engine is released
    Closed,
}

/// Owns one browser session (browser + context + page) for one run
pub struct FlowDriver {
    engine: Box<dyn BrowserEngine>,
    sync: StateSynchronizer,
    timeouts: TimeoutConfig,
    state: SessionState,
    teardown_error: Option<String>,
}

impl FlowDriver {
    pub fn new(engine: Box<dyn BrowserEngine>, timeouts: TimeoutConfig) -> Self {
        Self {
            engine,
            sync: StateSynchronizer::new(timeouts),
            timeouts,
            state: SessionState::Idle,
            teardown_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Error swallowed while closing the session, if any
    pub fn teardown_error(&self) -> Option<&str> {
        self.teardown_error.as_deref()
    }

    /// Launch the browser, create an isolated context with `viewport` and
    /// open a page. Any failure is a `SessionInit` error; call [`stop`]
    /// afterwards regardless.
    ///
    /// [`stop`]: FlowDriver::stop
    pub async fn start(&mut self, options: &LaunchOptions, viewport: Viewport) -> HarnessResult<()> {
        if self.state != SessionState::Idle {
            return Err(HarnessError::SessionInit(format!("session is {:?}, not idle", self.state)));
        }

        info!(
            "Launching {} ({}, {}x{})",
            options.browser.as_str(),
            if options.headless { "headless" } else { "headed" },
            viewport.width,
            viewport.height
        );

        let grace = self.timeouts.grace();
        let started: EngineResult<()> = async {
            bounded(options.timeout + grace, "launch", self.engine.launch(options)).await?;
            bounded(options.timeout + grace, "new_context", self.engine.new_context(viewport)).await?;
            bounded(options.timeout + grace, "new_page", self.engine.new_page()).await
        }
        .await;

        match started {
            Ok(()) => {
                self.state = SessionState::Open;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Broken;
                Err(HarnessError::SessionInit(e.to_string()))
            }
        }
    }

    /// Settle every native dialog raised during the run: accept when
    /// `auto_accept`, dismiss otherwise. Unsettled dialogs block the page.
    pub async fn dialog_policy(&mut self, auto_accept: bool) -> HarnessResult<()> {
        let policy = if auto_accept { DialogPolicy::Accept } else { DialogPolicy::Dismiss };
        self.engine
            .on_dialog(policy)
            .await
            .map_err(|e| HarnessError::Engine(format!("registering dialog handler: {}", e)))?;
        debug!("Dialogs will be {}ed", policy.as_str().trim_end_matches('e'));
        Ok(())
    }

    /// Close the session. Never fails: teardown errors are logged and kept
    /// in [`teardown_error`]. Calling it again is a no-op.
    ///
    /// [`teardown_error`]: FlowDriver::teardown_error
    pub async fn stop(&mut self) {
        if self.state == SessionState::Closed {
            debug!("Session already closed");
            return;
        }

        let deadline = Duration::from_secs(10) + self.timeouts.grace();
        match bounded(deadline, "close", self.engine.close()).await {
            Ok(()) => info!("Browser session closed"),
            Err(e) => {
                warn!("Error while closing browser session: {}", e);
                self.teardown_error = Some(e.to_string());
            }
        }
        self.state = SessionState::Closed;
    }

    fn ensure_open(&self, step: &str) -> HarnessResult<()> {
        if self.state == SessionState::Open {
            Ok(())
        } else {
            Err(HarnessError::StepExecution {
                step: step.to_string(),
                reason: format!("session is {:?}", self.state),
            })
        }
    }

    fn action_deadline(&self) -> Duration {
        self.timeouts.action() + self.timeouts.grace()
    }

    pub async fn navigate(&mut self, url: &str) -> HarnessResult<()> {
        let step = format!("navigate:{}", url);
        self.ensure_open(&step)?;
        let timeout = self.timeouts.navigation();
        let deadline = timeout + self.timeouts.grace();
        bounded(deadline, "goto", self.engine.goto(url, timeout))
            .await
            .map_err(|e| step_error(step, e))
    }

    pub async fn fill(&mut self, selector: &str, value: &str) -> HarnessResult<()> {
        let step = format!("fill:{}", selector);
        self.ensure_open(&step)?;
        let deadline = self.action_deadline();
        bounded(deadline, "fill", self.engine.fill(selector, value, self.timeouts.action()))
            .await
            .map_err(|e| step_error(step, e))
    }

    pub async fn click(&mut self, selector: &str) -> HarnessResult<()> {
        let step = format!("click:{}", selector);
        self.ensure_open(&step)?;
        let deadline = self.action_deadline();
        bounded(deadline, "click", self.engine.click(selector, self.timeouts.action()))
            .await
            .map_err(|e| step_error(step, e))
    }

    pub async fn press(&mut self, selector: Option<&str>, key: &str) -> HarnessResult<()> {
        let step = format!("press:{}", key);
        self.ensure_open(&step)?;
        let deadline = self.action_deadline();
        bounded(deadline, "press", self.engine.press(selector, key, self.timeouts.action()))
            .await
            .map_err(|e| step_error(step, e))
    }

    /// Delegate to the state synchronizer
    pub async fn wait_for(&mut self, condition: &Condition, timeout_ms: Option<u64>) -> HarnessResult<()> {
        self.ensure_open(&format!("wait:{}", condition.describe()))?;
        self.sync
            .await_condition(self.engine.as_mut(), condition, timeout_ms)
            .await
    }

    /// Run a page function with a structured argument and return its result
    pub async fn evaluate(&mut self, script: &str, arg: &Value) -> HarnessResult<Value> {
        self.ensure_open("evaluate")?;
        let timeout = self.timeouts.navigation();
        let deadline = timeout + self.timeouts.grace();
        bounded(deadline, "evaluate", self.engine.evaluate(script, arg, timeout))
            .await
            .map_err(|e| step_error("evaluate".to_string(), e))
    }

    /// Write a screenshot of the page, or of the first element matching
    /// `target`, to `path`.
    pub async fn screenshot(
        &mut self,
        name: &str,
        path: &Path,
        target: Option<&str>,
        full_page: bool,
    ) -> HarnessResult<()> {
        self.ensure_open(&format!("screenshot:{}", name))
            .map_err(|e| HarnessError::Capture { name: name.to_string(), reason: e.detail() })?;
        let capture = CaptureTarget { selector: target, full_page };
        let deadline = self.action_deadline();
        bounded(deadline, "screenshot", self.engine.screenshot(path, capture, self.timeouts.action()))
            .await
            .map_err(|e| HarnessError::Capture {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Drop for FlowDriver {
    fn drop(&mut self) {
        if self.state != SessionState::Closed && self.state != SessionState::Idle {
            warn!("Browser session dropped without stop; engine resources are released on drop");
        }
    }
}

/// Host-side bound on one engine call
async fn bounded<T>(
    deadline: Duration,
    op: &str,
    fut: impl Future<Output = EngineResult<T>>,
) -> EngineResult<T> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| EngineError::Timeout(format!("{} exceeded {:?}", op, deadline)))?
}

fn step_error(step: String, e: EngineError) -> HarnessError {
    HarnessError::StepExecution {
        step,
        reason: e.to_string(),
    }
}
