//! Declarative flow definitions
//!
//! A [`Flow`] is an ordered list of [`Stage`]s. A stage is the unit of
//! failure isolation: when one of its steps fails the rest of the stage is
//! skipped and the next stage runs. Stages tagged with a checkpoint produce
//! one entry in the run result.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::content::ContentItem;
use crate::credentials::CredentialMode;
use crate::error::{HarnessError, HarnessResult};

/// A complete flow, built in code or parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    /// Unique name for this flow
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering flows
    #[serde(default)]
    pub tags: Vec<String>,

    /// Viewport override for this flow
    #[serde(default)]
    pub viewport: Option<Viewport>,

    /// Identity the flow expects, e.g. a seeded account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<CredentialMode>,

    /// Content table bound to `${content}`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<ContentItem>,

    /// Extra template values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, serde_json::Value>,

    /// Stages to execute in order
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport { width: 1280, height: 800 }
    }
}

impl std::str::FromStr for Viewport {
    type Err = HarnessError;

    /// Parses `WIDTHxHEIGHT`, e.g. `1280x720`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| HarnessError::Config(format!("viewport must be WIDTHxHEIGHT, got '{}'", s)))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| HarnessError::Config(format!("invalid viewport dimension '{}'", v)))
        };
        Ok(Viewport { width: parse(w)?, height: parse(h)? })
    }
}

/// A guarded group of steps
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stage {
    /// Checkpoint label; tagged stages are reported in the run result
    #[serde(default)]
    pub checkpoint: Option<String>,

    pub steps: Vec<FlowStep>,
}

/// A single step in a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FlowStep {
    /// Navigate to a URL
    Navigate { url: String },

    /// Fill an input field
    Fill { selector: String, value: String },

    /// Click an element
    Click { selector: String },

    /// Press a key, on an element or on the page keyboard
    Press {
        #[serde(default)]
        selector: Option<String>,
        key: String,
    },

    /// Block until a condition holds
    WaitFor {
        condition: Condition,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Run a function in the page with a structured argument.
    ///
    /// `script` is either inline JavaScript function source or
    /// `builtin:<name>` for one of the bundled page scripts.
    Evaluate {
        script: String,
        #[serde(default)]
        arg: serde_json::Value,
    },

    /// Take a screenshot named `<name>.png`
    Screenshot {
        name: String,
        /// Selector of the element to capture instead of the page
        #[serde(default)]
        target: Option<String>,
        #[serde(default)]
        full_page: bool,
        /// Allow overwriting an earlier capture of the same name
        #[serde(default)]
        recapture: bool,
    },

    /// Wait for a fixed amount of time (use sparingly)
    Sleep { ms: u64 },

    /// Log a message
    Log { message: String },
}

/// Observable page state the synchronizer can wait for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// Element matching a selector reaches a state
    Selector {
        selector: String,
        #[serde(default)]
        state: WaitState,
    },
    /// Element containing the text is visible
    Text { text: String },
    /// Page URL matches a glob such as `**/dashboard`
    Url { pattern: String },
    /// No network activity for the engine's idle window
    NetworkIdle,
    /// Fixed delay
    Duration { ms: u64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

impl Condition {
    pub fn selector(selector: &str) -> Self {
        Condition::Selector {
            selector: selector.to_string(),
            state: WaitState::Visible,
        }
    }

    pub fn text(text: &str) -> Self {
        Condition::Text { text: text.to_string() }
    }

    pub fn url(pattern: &str) -> Self {
        Condition::Url { pattern: pattern.to_string() }
    }

    /// Description used in timeout errors
    pub fn describe(&self) -> String {
        match self {
            Condition::Selector { selector, state: WaitState::Visible } => selector.clone(),
            Condition::Selector { selector, state } => format!("{} ({})", selector, state.as_str()),
            Condition::Text { text } => format!("text={}", text),
            Condition::Url { pattern } => format!("url {}", pattern),
            Condition::NetworkIdle => "network idle".to_string(),
            Condition::Duration { ms } => format!("{}ms", ms),
        }
    }

    /// Whether the condition follows a navigation and gets the longer default
    pub fn is_navigation(&self) -> bool {
        matches!(self, Condition::Url { .. } | Condition::NetworkIdle)
    }
}

impl FlowStep {
    /// Short name used in logs and step records
    pub fn label(&self) -> String {
        match self {
            FlowStep::Navigate { url } => format!("navigate:{}", url),
            FlowStep::Fill { selector, .. } => format!("fill:{}", selector),
            FlowStep::Click { selector } => format!("click:{}", selector),
            FlowStep::Press { key, .. } => format!("press:{}", key),
            FlowStep::WaitFor { condition, .. } => format!("wait:{}", condition.describe()),
            FlowStep::Evaluate { script, .. } => match script.strip_prefix("builtin:") {
                Some(name) => format!("evaluate:{}", name),
                None => "evaluate".to_string(),
            },
            FlowStep::Screenshot { name, .. } => format!("screenshot:{}", name),
            FlowStep::Sleep { ms } => format!("sleep:{}ms", ms),
            FlowStep::Log { message } => {
                let cut: String = message.chars().take(30).collect();
                format!("log:{}", cut)
            }
        }
    }
}

impl Stage {
    /// Untagged stage; failures are logged but not reported as checkpoints
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checkpoint(name: &str) -> Self {
        Self {
            checkpoint: Some(name.to_string()),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: FlowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn navigate(self, url: &str) -> Self {
        self.step(FlowStep::Navigate { url: url.to_string() })
    }

    pub fn fill(self, selector: &str, value: &str) -> Self {
        self.step(FlowStep::Fill {
            selector: selector.to_string(),
            value: value.to_string(),
        })
    }

    pub fn click(self, selector: &str) -> Self {
        self.step(FlowStep::Click { selector: selector.to_string() })
    }

    pub fn press(self, selector: Option<&str>, key: &str) -> Self {
        self.step(FlowStep::Press {
            selector: selector.map(String::from),
            key: key.to_string(),
        })
    }

    pub fn wait_for(self, condition: Condition) -> Self {
        self.step(FlowStep::WaitFor { condition, timeout_ms: None })
    }

    pub fn wait_for_within(self, condition: Condition, timeout_ms: u64) -> Self {
        self.step(FlowStep::WaitFor {
            condition,
            timeout_ms: Some(timeout_ms),
        })
    }

    pub fn evaluate(self, script: &str, arg: serde_json::Value) -> Self {
        self.step(FlowStep::Evaluate {
            script: script.to_string(),
            arg,
        })
    }

    pub fn screenshot(self, name: &str) -> Self {
        self.step(FlowStep::Screenshot {
            name: name.to_string(),
            target: None,
            full_page: false,
            recapture: false,
        })
    }

    /// Screenshot of a single element
    pub fn screenshot_of(self, name: &str, target: &str) -> Self {
        self.step(FlowStep::Screenshot {
            name: name.to_string(),
            target: Some(target.to_string()),
            full_page: false,
            recapture: false,
        })
    }

    pub fn sleep(self, ms: u64) -> Self {
        self.step(FlowStep::Sleep { ms })
    }

    pub fn log(self, message: &str) -> Self {
        self.step(FlowStep::Log { message: message.to_string() })
    }

    fn screenshot_names(&self) -> impl Iterator<Item = (&str, bool)> {
        self.steps.iter().filter_map(|s| match s {
            FlowStep::Screenshot { name, recapture, .. } => Some((name.as_str(), *recapture)),
            _ => None,
        })
    }
}

/// Builder for flows defined in code
#[derive(Debug, Clone)]
pub struct FlowBuilder {
    flow: Flow,
}

impl FlowBuilder {
    pub fn description(mut self, description: &str) -> Self {
        self.flow.description = description.to_string();
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.flow.tags.push(tag.to_string());
        self
    }

    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.flow.viewport = Some(Viewport { width, height });
        self
    }

    pub fn identity(mut self, identity: CredentialMode) -> Self {
        self.flow.identity = Some(identity);
        self
    }

    pub fn content(mut self, items: Vec<ContentItem>) -> Self {
        self.flow.content = items;
        self
    }

    pub fn var(mut self, key: &str, value: serde_json::Value) -> Self {
        self.flow.vars.insert(key.to_string(), value);
        self
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.flow.stages.push(stage);
        self
    }

    pub fn build(self) -> HarnessResult<Flow> {
        self.flow.validate()?;
        Ok(self.flow)
    }
}

/// Prefix reserved for fallback captures of failed checkpoints
pub const ERROR_ARTIFACT_PREFIX: &str = "error_";

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl Flow {
    pub fn builder(name: &str) -> FlowBuilder {
        FlowBuilder {
            flow: Flow {
                name: name.to_string(),
                description: String::new(),
                tags: Vec::new(),
                viewport: None,
                identity: None,
                content: Vec::new(),
                vars: BTreeMap::new(),
                stages: Vec::new(),
            },
        }
    }

    /// Parse a flow from a YAML string
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        let flow: Self = serde_yaml::from_str(yaml)?;
        flow.validate()?;
        Ok(flow)
    }

    /// Parse a flow from a YAML file
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            HarnessError::Yaml(inner) => {
                HarnessError::FlowParse(format!("{}: {}", path.display(), inner))
            }
            other => other,
        })
    }

    /// Load all flows from a directory
    pub fn load_all(dir: &Path) -> HarnessResult<Vec<Self>> {
        let mut flows = Vec::new();

        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        for path in paths {
            flows.push(Self::from_file(&path)?);
        }

        Ok(flows)
    }

    /// Filter flows by tag
    pub fn filter_by_tag<'a>(flows: &'a [Self], tag: &str) -> Vec<&'a Self> {
        flows.iter().filter(|f| f.tags.iter().any(|t| t == tag)).collect()
    }

    /// Check structural rules before anything runs
    pub fn validate(&self) -> HarnessResult<()> {
        let invalid = |reason: String| HarnessError::InvalidFlow {
            flow: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("flow name is empty".to_string()));
        }
        if self.stages.is_empty() {
            return Err(invalid("flow has no stages".to_string()));
        }

        let mut checkpoints = HashSet::new();
        let mut screenshots = HashSet::new();

        for (i, stage) in self.stages.iter().enumerate() {
            if stage.steps.is_empty() {
                return Err(invalid(format!("stage {} has no steps", i + 1)));
            }

            if let Some(cp) = &stage.checkpoint {
                if !is_safe_name(cp) {
                    return Err(invalid(format!("checkpoint '{}' is not a safe file name", cp)));
                }
                if !checkpoints.insert(cp.as_str()) {
                    return Err(invalid(format!("checkpoint '{}' is declared twice", cp)));
                }
                if stage.screenshot_names().next().is_none() {
                    return Err(invalid(format!("checkpoint '{}' takes no screenshot", cp)));
                }
            }

            for (name, recapture) in stage.screenshot_names() {
                if !is_safe_name(name) {
                    return Err(invalid(format!("screenshot '{}' is not a safe file name", name)));
                }
                if name.starts_with(ERROR_ARTIFACT_PREFIX) {
                    return Err(invalid(format!(
                        "screenshot '{}' uses the reserved '{}' prefix",
                        name, ERROR_ARTIFACT_PREFIX
                    )));
                }
                if !screenshots.insert(name) && !recapture {
                    return Err(invalid(format!(
                        "screenshot '{}' is captured twice without recapture",
                        name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Checkpoint labels in execution order
    pub fn checkpoints(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter_map(|s| s.checkpoint.as_deref())
            .collect()
    }

    /// File names a fully successful run produces, in capture order
    pub fn artifact_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.stages
            .iter()
            .flat_map(|s| s.screenshot_names())
            .filter(|(name, _)| seen.insert(*name))
            .map(|(name, _)| format!("{}.png", name))
            .collect()
    }

    /// Total number of steps across all stages
    pub fn step_count(&self) -> usize {
        self.stages.iter().map(|s| s.steps.len()).sum()
    }

    pub fn to_yaml(&self) -> HarnessResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
