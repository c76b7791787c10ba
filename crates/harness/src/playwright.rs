//! Playwright browser automation over a Node bridge process
//!
//! The bridge script is staged into a temporary directory and run with
//! `node`. Requests and responses are single JSON lines correlated by id,
//! so a late answer to a request the host already gave up on is skipped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::engine::{
    BrowserEngine, CaptureTarget, DialogPolicy, EngineError, EngineResult, LaunchOptions, LoadState,
};
use crate::flow::{Viewport, WaitState};

const BRIDGE_SCRIPT: &str = include_str!("../assets/bridge.cjs");

/// Time allowed for the bridge to exit after stdin closes
const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    op: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct Response {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<BridgeFailure>,
}

#[derive(Debug, Deserialize)]
struct BridgeFailure {
    name: String,
    message: String,
}

struct BridgeProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    // Holds the staged script alive until the process is gone
    _script_dir: tempfile::TempDir,
}

/// Engine backed by a Playwright bridge process
pub struct PlaywrightEngine {
    config: EngineConfig,
    grace: Duration,
    bridge: Option<BridgeProcess>,
    next_id: u64,
}

impl PlaywrightEngine {
    pub fn new(config: EngineConfig, grace: Duration) -> Self {
        Self {
            config,
            grace,
            bridge: None,
            next_id: 0,
        }
    }

    fn spawn_bridge(&self) -> EngineResult<BridgeProcess> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.cjs");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        debug!("Starting Playwright bridge: {}", script_path.display());

        let mut cmd = Command::new(&self.config.node_binary);
        cmd.arg(&script_path)
            .current_dir(script_dir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(node_path) = &self.config.node_path {
            cmd.env("NODE_PATH", node_path.join("node_modules"));
        }

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::Unavailable(format!(
                    "'{}' not found. Install Node.js and run: npm install playwright && npx playwright install",
                    self.config.node_binary
                ))
            } else {
                EngineError::Io(e)
            }
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Unavailable("bridge stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Unavailable("bridge stdout not captured".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("{}", line);
                }
            });
        }

        Ok(BridgeProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            _script_dir: script_dir,
        })
    }

    /// Send one request and wait for its response, bounded by the engine
    /// timeout plus the host grace period.
    async fn call(&mut self, op: &str, params: Value, timeout: Duration) -> EngineResult<Value> {
        self.next_id += 1;
        let id = self.next_id;
        let bridge = self
            .bridge
            .as_mut()
            .ok_or_else(|| EngineError::Failed(format!("{}: browser is not running", op)))?;

        let mut line = serde_json::to_string(&Request { id, op, params })
            .map_err(|e| EngineError::Failed(format!("{}: {}", op, e)))?;
        line.push('\n');

        let resp = tokio::time::timeout(timeout + self.grace, exchange(bridge, &line, id))
            .await
            .map_err(|_| EngineError::Timeout(format!("{} (no answer from bridge)", op)))??;

        if resp.ok {
            return Ok(resp.value);
        }

        let failure = resp.error.unwrap_or(BridgeFailure {
            name: "Error".to_string(),
            message: "unknown bridge failure".to_string(),
        });
        if failure.name == "TimeoutError" {
            Err(EngineError::Timeout(first_line(&failure.message)))
        } else {
            Err(EngineError::Failed(first_line(&failure.message)))
        }
    }
}

async fn exchange(bridge: &mut BridgeProcess, line: &str, id: u64) -> EngineResult<Response> {
    bridge.stdin.write_all(line.as_bytes()).await?;
    bridge.stdin.flush().await?;

    loop {
        let Some(raw) = bridge.stdout.next_line().await? else {
            return Err(EngineError::Unavailable("bridge exited".to_string()));
        };
        match serde_json::from_str::<Response>(&raw) {
            Ok(resp) if resp.id == id => return Ok(resp),
            Ok(resp) => debug!("Skipping stale bridge response {}", resp.id),
            Err(_) => debug!("bridge: {}", raw),
        }
    }
}

/// Playwright messages carry a multi-line call log; the first line is the reason
fn first_line(message: &str) -> String {
    message.lines().next().unwrap_or(message).trim().to_string()
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[async_trait]
impl BrowserEngine for PlaywrightEngine {
    async fn launch(&mut self, options: &LaunchOptions) -> EngineResult<()> {
        if self.bridge.is_none() {
            self.bridge = Some(self.spawn_bridge()?);
        }
        let params = json!({
            "browser": options.browser.as_str(),
            "headless": options.headless,
            "timeout": millis(options.timeout),
        });
        self.call("launch", params, options.timeout).await.map(|_| ())
    }

    async fn new_context(&mut self, viewport: Viewport) -> EngineResult<()> {
        let params = json!({ "width": viewport.width, "height": viewport.height });
        self.call("new_context", params, Duration::from_secs(10)).await.map(|_| ())
    }

    async fn new_page(&mut self) -> EngineResult<()> {
        self.call("new_page", json!({}), Duration::from_secs(10)).await.map(|_| ())
    }

    async fn on_dialog(&mut self, policy: DialogPolicy) -> EngineResult<()> {
        self.call("on_dialog", json!({ "policy": policy.as_str() }), Duration::from_secs(1))
            .await
            .map(|_| ())
    }

    async fn goto(&mut self, url: &str, timeout: Duration) -> EngineResult<()> {
        self.call("goto", json!({ "url": url, "timeout": millis(timeout) }), timeout)
            .await
            .map(|_| ())
    }

    async fn fill(&mut self, selector: &str, value: &str, timeout: Duration) -> EngineResult<()> {
        let params = json!({ "selector": selector, "value": value, "timeout": millis(timeout) });
        self.call("fill", params, timeout).await.map(|_| ())
    }

    async fn click(&mut self, selector: &str, timeout: Duration) -> EngineResult<()> {
        let params = json!({ "selector": selector, "timeout": millis(timeout) });
        self.call("click", params, timeout).await.map(|_| ())
    }

    async fn press(&mut self, selector: Option<&str>, key: &str, timeout: Duration) -> EngineResult<()> {
        let params = json!({ "selector": selector, "key": key, "timeout": millis(timeout) });
        self.call("press", params, timeout).await.map(|_| ())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> EngineResult<()> {
        let params = json!({
            "selector": selector,
            "state": state.as_str(),
            "timeout": millis(timeout),
        });
        self.call("wait_for_selector", params, timeout).await.map(|_| ())
    }

    async fn wait_for_url(&mut self, pattern: &str, timeout: Duration) -> EngineResult<()> {
        let params = json!({ "pattern": pattern, "timeout": millis(timeout) });
        self.call("wait_for_url", params, timeout).await.map(|_| ())
    }

    async fn wait_for_load_state(&mut self, state: LoadState, timeout: Duration) -> EngineResult<()> {
        let params = json!({ "state": state.as_str(), "timeout": millis(timeout) });
        self.call("wait_for_load_state", params, timeout).await.map(|_| ())
    }

    async fn evaluate(&mut self, script: &str, arg: &Value, timeout: Duration) -> EngineResult<Value> {
        let params = json!({ "script": script, "arg": arg });
        self.call("evaluate", params, timeout).await
    }

    async fn screenshot(
        &mut self,
        path: &Path,
        target: CaptureTarget<'_>,
        timeout: Duration,
    ) -> EngineResult<()> {
        let params = json!({
            "path": path.to_string_lossy(),
            "selector": target.selector,
            "full_page": target.full_page,
            "timeout": millis(timeout),
        });
        self.call("screenshot", params, timeout).await.map(|_| ())
    }

    async fn close(&mut self) -> EngineResult<()> {
        if self.bridge.is_none() {
            return Ok(());
        }

        let closed = self.call("close", json!({}), Duration::from_secs(10)).await;

        if let Some(mut bridge) = self.bridge.take() {
            // Closing stdin lets the bridge exit on its own
            drop(bridge.stdin);
            match tokio::time::timeout(EXIT_TIMEOUT, bridge.child.wait()).await {
                Ok(Ok(status)) => debug!("Playwright bridge exited: {}", status),
                Ok(Err(e)) => warn!("Waiting for Playwright bridge failed: {}", e),
                Err(_) => {
                    warn!("Playwright bridge did not exit, killing it");
                    bridge.child.kill().await?;
                }
            }
        }

        closed.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line_of_playwright_message() {
        let msg = "Timeout 5000ms exceeded.\n=========================== logs ===========================\nwaiting for locator";
        assert_eq!(first_line(msg), "Timeout 5000ms exceeded.");
    }

    #[test]
    fn test_response_parsing() {
        let ok: Response = serde_json::from_str(r#"{"id":3,"ok":true,"value":[201,500]}"#).unwrap();
        assert!(ok.ok);
        assert_eq!(ok.value, json!([201, 500]));

        let err: Response = serde_json::from_str(
            r#"{"id":4,"ok":false,"error":{"name":"TimeoutError","message":"Timeout 10000ms exceeded."}}"#,
        )
        .unwrap();
        assert_eq!(err.error.unwrap().name, "TimeoutError");
    }

    #[test]
    fn test_bridge_script_covers_every_primitive() {
        for op in [
            "launch",
            "new_context",
            "new_page",
            "on_dialog",
            "goto",
            "fill",
            "click",
            "press",
            "wait_for_selector",
            "wait_for_url",
            "wait_for_load_state",
            "evaluate",
            "screenshot",
            "close",
        ] {
            assert!(BRIDGE_SCRIPT.contains(&format!("async {}(", op)), "missing op {}", op);
        }
    }

    #[test]
    fn test_bridge_evaluates_without_page_eval() {
        assert!(!BRIDGE_SCRIPT.contains("(0, eval)"));
        assert!(BRIDGE_SCRIPT.contains("requirePage().evaluate(fn, arg)"));
    }

    #[test]
    fn test_bridge_serializes_requests() {
        assert!(BRIDGE_SCRIPT.contains("queue = queue.then(() => handle(line))"));
        assert!(!BRIDGE_SCRIPT.contains("    handle(line);\n  }\n});"));
    }

    #[tokio::test]
    async fn test_missing_node_is_unavailable() {
        let mut engine = PlaywrightEngine::new(
            EngineConfig {
                node_binary: "/nonexistent/uisnap-node".to_string(),
                node_path: None,
            },
            Duration::from_millis(100),
        );
        let options = LaunchOptions {
            browser: crate::config::Browser::Chromium,
            headless: true,
            timeout: Duration::from_secs(1),
        };
        let err = engine.launch(&options).await.unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
        // Closing a never-started engine is a no-op
        engine.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_primitives_before_launch_fail() {
        let mut engine = PlaywrightEngine::new(EngineConfig::default(), Duration::from_millis(100));
        let err = engine.click("button", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, EngineError::Failed(_)));
    }
}
