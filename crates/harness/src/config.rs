//! Run configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::credentials::CredentialMode;
use crate::error::{HarnessError, HarnessResult};
use crate::flow::Viewport;

/// Configuration for one flow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Base URL of the web frontend
    pub base_url: String,

    /// Base URL of the JSON content API
    pub api_url: String,

    /// Directory for screenshots and the run record
    pub output_dir: PathBuf,

    /// Default viewport; flows may override it
    pub viewport: Viewport,

    /// Run the browser without a window
    pub headless: bool,

    /// Browser engine to launch
    pub browser: Browser,

    /// Accept native dialogs (alert/confirm) automatically
    pub auto_accept_dialogs: bool,

    /// Probe `base_url` before launching the browser
    pub preflight: bool,

    pub timeouts: TimeoutConfig,

    /// Identity override; `None` defers to the flow, then to a random user
    pub credentials: Option<CredentialMode>,

    pub engine: EngineConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5173".to_string(),
            api_url: "http://localhost:8000".to_string(),
            output_dir: PathBuf::from("screenshots"),
            viewport: Viewport::default(),
            headless: true,
            browser: Browser::Chromium,
            auto_accept_dialogs: true,
            preflight: true,
            timeouts: TimeoutConfig::default(),
            credentials: None,
            engine: EngineConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(HarnessError::Config(format!("unknown browser '{}'", other))),
        }
    }
}

/// Per-condition timeouts, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Selector and text conditions
    pub ui_ms: u64,
    /// URL and network-idle conditions, and page loads
    pub navigation_ms: u64,
    /// Fill, click, press, evaluate and screenshot
    pub action_ms: u64,
    /// Extra time the host waits for the engine past its own timeout
    pub grace_ms: u64,
    /// Browser launch and context creation
    pub launch_ms: u64,
    /// Preflight reachability probe
    pub preflight_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            ui_ms: 5_000,
            navigation_ms: 10_000,
            action_ms: 5_000,
            grace_ms: 2_000,
            launch_ms: 30_000,
            preflight_ms: 3_000,
        }
    }
}

impl TimeoutConfig {
    pub fn ui(&self) -> Duration {
        Duration::from_millis(self.ui_ms)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn action(&self) -> Duration {
        Duration::from_millis(self.action_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn launch(&self) -> Duration {
        Duration::from_millis(self.launch_ms)
    }

    pub fn preflight(&self) -> Duration {
        Duration::from_millis(self.preflight_ms)
    }
}

/// Settings of the Playwright bridge process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Node.js executable used to run the bridge
    pub node_binary: String,

    /// Directory whose `node_modules` provides `playwright`
    pub node_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_binary: "node".to_string(),
            node_path: None,
        }
    }
}

impl RunConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> HarnessResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> HarnessResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> HarnessResult<()> {
        for (key, url) in [("base_url", &self.base_url), ("api_url", &self.api_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(HarnessError::Config(format!("{} must be an http(s) URL, got '{}'", key, url)));
            }
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(HarnessError::Config("viewport dimensions must be positive".to_string()));
        }
        let t = &self.timeouts;
        if t.ui_ms == 0 || t.navigation_ms == 0 || t.action_ms == 0 {
            return Err(HarnessError::Config("timeouts must be positive".to_string()));
        }
        Ok(())
    }

    /// `base_url` without a trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// `api_url` without a trailing slash
    pub fn api_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    /// Path of the run record
    pub fn result_path(&self) -> PathBuf {
        self.output_dir.join("run-result.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RunConfig::default();
        config.validate().unwrap();
        assert_eq!(config.timeouts.ui_ms, 5_000);
        assert_eq!(config.timeouts.navigation_ms, 10_000);
        assert!(config.auto_accept_dialogs);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf/uisnap.toml");
        let config = RunConfig {
            base_url: "http://127.0.0.1:8000".to_string(),
            credentials: Some(CredentialMode::Fixed {
                username: "test@example.com".to_string(),
                password: "test@example.com".to_string(),
            }),
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(RunConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uisnap.toml");
        std::fs::write(&path, "base_url = \"http://app.test/\"\n[timeouts]\nui_ms = 8000\n").unwrap();
        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.base_url(), "http://app.test");
        assert_eq!(config.timeouts.ui_ms, 8_000);
        assert_eq!(config.timeouts.navigation_ms, 10_000);
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config = RunConfig {
            api_url: "localhost:8000".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
