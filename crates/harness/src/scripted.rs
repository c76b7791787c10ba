//! Scripted engine for dry runs and tests
//!
//! Every primitive succeeds unless a fault rule matches it. Screenshots are
//! written as flat placeholder PNGs of the viewport size, so a flow can be
//! exercised end to end without a browser.

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{
    BrowserEngine, CaptureTarget, DialogPolicy, EngineError, EngineResult, LaunchOptions, LoadState,
};
use crate::flow::{Viewport, WaitState};

/// How a matched primitive misbehaves
#[derive(Debug, Clone)]
pub enum Fault {
    /// The engine reports its own timeout immediately
    Timeout,
    /// The primitive is rejected with a message
    Fail(String),
    /// The primitive never answers at all
    Hang,
}

#[derive(Debug, Clone)]
struct FaultRule {
    op: String,
    needle: String,
    fault: Fault,
    remaining: Option<usize>,
}

type EvaluateHandler = Box<dyn FnMut(&str, &Value) -> EngineResult<Value> + Send>;

/// Shared record of the primitives an engine received, e.g. `click button`
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, entry: String) {
        self.0.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Number of entries starting with `op`
    pub fn count(&self, op: &str) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|e| e.split(' ').next() == Some(op))
            .count()
    }
}

pub struct ScriptedEngine {
    log: CallLog,
    rules: Vec<FaultRule>,
    launch_failure: Option<String>,
    dialog_selectors: Vec<String>,
    dialog_policy: Option<DialogPolicy>,
    viewport: Viewport,
    evaluate: Option<EvaluateHandler>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            log: CallLog::default(),
            rules: Vec::new(),
            launch_failure: None,
            dialog_selectors: Vec::new(),
            dialog_policy: None,
            viewport: Viewport::default(),
            evaluate: None,
        }
    }

    /// Handle to the call log, valid after the engine is boxed
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// Every call of `op` whose subject contains `needle` misbehaves
    pub fn fault(mut self, op: &str, needle: &str, fault: Fault) -> Self {
        self.rules.push(FaultRule {
            op: op.to_string(),
            needle: needle.to_string(),
            fault,
            remaining: None,
        });
        self
    }

    /// Only the first matching call misbehaves
    pub fn fault_once(mut self, op: &str, needle: &str, fault: Fault) -> Self {
        self.rules.push(FaultRule {
            op: op.to_string(),
            needle: needle.to_string(),
            fault,
            remaining: Some(1),
        });
        self
    }

    pub fn fail_launch(mut self, message: &str) -> Self {
        self.launch_failure = Some(message.to_string());
        self
    }

    /// Clicking a matching element raises a native confirmation dialog,
    /// which blocks the click unless the dialog policy settles it.
    pub fn dialog_on_click(mut self, needle: &str) -> Self {
        self.dialog_selectors.push(needle.to_string());
        self
    }

    pub fn on_evaluate<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&str, &Value) -> EngineResult<Value> + Send + 'static,
    {
        self.evaluate = Some(Box::new(handler));
        self
    }

    async fn primitive(&mut self, op: &str, subject: &str) -> EngineResult<()> {
        self.log.push(format!("{} {}", op, subject).trim_end().to_string());

        let matched = self
            .rules
            .iter_mut()
            .find(|r| r.op == op && subject.contains(&r.needle) && r.remaining != Some(0));

        let Some(rule) = matched else {
            return Ok(());
        };
        if let Some(n) = rule.remaining.as_mut() {
            *n -= 1;
        }

        match rule.fault.clone() {
            Fault::Timeout => Err(EngineError::Timeout(format!("{} {}", op, subject))),
            Fault::Fail(message) => Err(EngineError::Failed(message)),
            Fault::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl BrowserEngine for ScriptedEngine {
    async fn launch(&mut self, options: &LaunchOptions) -> EngineResult<()> {
        self.log.push(format!("launch {}", options.browser.as_str()));
        match &self.launch_failure {
            Some(message) => Err(EngineError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }

    async fn new_context(&mut self, viewport: Viewport) -> EngineResult<()> {
        self.viewport = viewport;
        let subject = format!("{}x{}", viewport.width, viewport.height);
        self.primitive("new_context", &subject).await
    }

    async fn new_page(&mut self) -> EngineResult<()> {
        self.primitive("new_page", "").await
    }

    async fn on_dialog(&mut self, policy: DialogPolicy) -> EngineResult<()> {
        self.dialog_policy = Some(policy);
        self.log.push(format!("on_dialog {}", policy.as_str()));
        Ok(())
    }

    async fn goto(&mut self, url: &str, _timeout: Duration) -> EngineResult<()> {
        self.primitive("goto", url).await
    }

    async fn fill(&mut self, selector: &str, value: &str, _timeout: Duration) -> EngineResult<()> {
        self.primitive("fill", &format!("{} = {}", selector, value)).await
    }

    async fn click(&mut self, selector: &str, timeout: Duration) -> EngineResult<()> {
        self.primitive("click", selector).await?;

        if self.dialog_selectors.iter().any(|n| selector.contains(n.as_str())) {
            match self.dialog_policy {
                Some(policy) => self.log.push(format!("dialog {}", policy.as_str())),
                None => {
                    // Nobody settles the dialog; the page stays blocked
                    tokio::time::sleep(timeout).await;
                    return Err(EngineError::Timeout(format!("click {} (dialog open)", selector)));
                }
            }
        }
        Ok(())
    }

    async fn press(&mut self, selector: Option<&str>, key: &str, _timeout: Duration) -> EngineResult<()> {
        let subject = match selector {
            Some(s) => format!("{} {}", s, key),
            None => key.to_string(),
        };
        self.primitive("press", &subject).await
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        state: WaitState,
        _timeout: Duration,
    ) -> EngineResult<()> {
        let subject = match state {
            WaitState::Visible => selector.to_string(),
            other => format!("{} [{}]", selector, other.as_str()),
        };
        self.primitive("wait_for_selector", &subject).await
    }

    async fn wait_for_url(&mut self, pattern: &str, _timeout: Duration) -> EngineResult<()> {
        self.primitive("wait_for_url", pattern).await
    }

    async fn wait_for_load_state(&mut self, state: LoadState, _timeout: Duration) -> EngineResult<()> {
        self.primitive("wait_for_load_state", state.as_str()).await
    }

    async fn evaluate(&mut self, script: &str, arg: &Value, _timeout: Duration) -> EngineResult<Value> {
        self.primitive("evaluate", script).await?;
        match self.evaluate.as_mut() {
            Some(handler) => handler(script, arg),
            None => Ok(Value::Null),
        }
    }

    async fn screenshot(
        &mut self,
        path: &Path,
        target: CaptureTarget<'_>,
        _timeout: Duration,
    ) -> EngineResult<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.primitive("screenshot", &name).await?;

        let (width, height) = match target.selector {
            Some(_) => (self.viewport.width / 2, self.viewport.height / 4),
            None => (self.viewport.width, self.viewport.height),
        };
        RgbaImage::from_pixel(width.max(1), height.max(1), Rgba([236, 239, 244, 255]))
            .save(path)
            .map_err(|e| EngineError::Failed(format!("writing {}: {}", path.display(), e)))
    }

    async fn close(&mut self) -> EngineResult<()> {
        self.primitive("close", "").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[tokio::test]
    async fn test_fault_once_only_fires_once() {
        let mut engine = ScriptedEngine::new().fault_once("click", "submit", Fault::Fail("detached".into()));
        let log = engine.log();
        assert!(engine.click("button.submit", Duration::from_millis(10)).await.is_err());
        assert!(engine.click("button.submit", Duration::from_millis(10)).await.is_ok());
        assert_eq!(log.count("click"), 2);
    }

    #[tokio::test]
    async fn test_screenshot_writes_png_of_viewport_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let mut engine = ScriptedEngine::new();
        engine.new_context(Viewport { width: 64, height: 48 }).await.unwrap();
        engine
            .screenshot(&path, CaptureTarget { selector: None, full_page: false }, Duration::from_secs(1))
            .await
            .unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (64, 48));
    }

    #[tokio::test]
    async fn test_unsettled_dialog_blocks_until_timeout() {
        let mut engine = ScriptedEngine::new().dialog_on_click("delete");
        let err = engine.click("button.delete", Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, EngineError::Timeout(_)));

        engine.on_dialog(DialogPolicy::Accept).await.unwrap();
        engine.click("button.delete", Duration::from_millis(20)).await.unwrap();
        assert_eq!(engine.log().count("dialog"), 1);
    }

    #[test_case(WaitState::Visible => "wait_for_selector .toast" ; "visible is the bare selector")]
    #[test_case(WaitState::Hidden => "wait_for_selector .toast [hidden]" ; "hidden")]
    #[test_case(WaitState::Attached => "wait_for_selector .toast [attached]" ; "attached")]
    #[test_case(WaitState::Detached => "wait_for_selector .toast [detached]" ; "detached")]
    fn test_wait_state_reaches_log(state: WaitState) -> String {
        let mut engine = ScriptedEngine::new();
        let log = engine.log();
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(engine.wait_for_selector(".toast", state, Duration::from_millis(10)))
            .unwrap();
        log.entries().remove(0)
    }

    #[tokio::test]
    async fn test_hang_never_answers() {
        let mut engine = ScriptedEngine::new().fault("goto", "slow", Fault::Hang);
        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            engine.goto("http://slow.test", Duration::from_millis(1)),
        )
        .await;
        assert!(outcome.is_err());
    }
}
