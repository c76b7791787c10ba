//! Browser automation engine boundary
//!
//! The executor treats the automation engine as an opaque driver. Every
//! primitive suspends the calling step until the engine answers, and fails
//! with [`EngineError::Timeout`] when its own deadline passes.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::config::Browser;
use crate::flow::{Viewport, WaitState};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Failed(String),

    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Options for launching the browser process
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub browser: Browser,
    pub headless: bool,
    pub timeout: Duration,
}

/// What to do with native dialogs raised by the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogPolicy {
    Accept,
    Dismiss,
}

impl DialogPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DialogPolicy::Accept => "accept",
            DialogPolicy::Dismiss => "dismiss",
        }
    }
}

/// Load states the engine can wait for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Load => "load",
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

/// Target of a screenshot
#[derive(Debug, Clone, Copy)]
pub struct CaptureTarget<'a> {
    /// Element selector; `None` captures the page
    pub selector: Option<&'a str>,
    pub full_page: bool,
}

/// Primitives of a browser automation engine.
///
/// One engine instance backs exactly one session: `launch`, then
/// `new_context`, then `new_page`, then page primitives, then `close`.
#[async_trait]
pub trait BrowserEngine: Send {
    async fn launch(&mut self, options: &LaunchOptions) -> EngineResult<()>;

    async fn new_context(&mut self, viewport: Viewport) -> EngineResult<()>;

    async fn new_page(&mut self) -> EngineResult<()>;

    async fn on_dialog(&mut self, policy: DialogPolicy) -> EngineResult<()>;

    async fn goto(&mut self, url: &str, timeout: Duration) -> EngineResult<()>;

    async fn fill(&mut self, selector: &str, value: &str, timeout: Duration) -> EngineResult<()>;

    async fn click(&mut self, selector: &str, timeout: Duration) -> EngineResult<()>;

    async fn press(&mut self, selector: Option<&str>, key: &str, timeout: Duration) -> EngineResult<()>;

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> EngineResult<()>;

    async fn wait_for_url(&mut self, pattern: &str, timeout: Duration) -> EngineResult<()>;

    async fn wait_for_load_state(&mut self, state: LoadState, timeout: Duration) -> EngineResult<()>;

    /// Runs `script` (function source) in the page with `arg` as its only
    /// parameter and returns the JSON-serializable result.
    async fn evaluate(
        &mut self,
        script: &str,
        arg: &serde_json::Value,
        timeout: Duration,
    ) -> EngineResult<serde_json::Value>;

    async fn screenshot(
        &mut self,
        path: &Path,
        target: CaptureTarget<'_>,
        timeout: Duration,
    ) -> EngineResult<()>;

    async fn close(&mut self) -> EngineResult<()>;
}

/// Builds a fresh engine per run so sessions never share state
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Box<dyn BrowserEngine>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> Box<dyn BrowserEngine> + Send + Sync,
{
    fn create(&self) -> Box<dyn BrowserEngine> {
        self()
    }
}
