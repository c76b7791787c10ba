//! Error types for the flow executor

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Session could not start: {0}")]
    SessionInit(String),

    #[error("Step failed: {step} - {reason}")]
    StepExecution { step: String, reason: String },

    #[error("Timeout waiting for: {0}")]
    WaitTimeout(String),

    #[error("Capture failed for '{name}': {reason}")]
    Capture { name: String, reason: String },

    #[error("Flow parse error: {0}")]
    FlowParse(String),

    #[error("Invalid flow '{flow}': {reason}")]
    InvalidFlow { flow: String, reason: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl HarnessError {
    /// Stable taxonomy name used as the prefix of recorded failure reasons.
    pub fn kind(&self) -> &'static str {
        match self {
            HarnessError::SessionInit(_) => "SessionInitError",
            HarnessError::WaitTimeout(_) => "WaitTimeoutError",
            HarnessError::Capture { .. } => "CaptureError",
            HarnessError::StepExecution { .. } => "StepExecutionError",
            HarnessError::Template(_) => "TemplateError",
            _ => "StepExecutionError",
        }
    }

    /// Short detail without the display prefix, e.g. the selector that timed out.
    pub fn detail(&self) -> String {
        match self {
            HarnessError::SessionInit(d)
            | HarnessError::WaitTimeout(d)
            | HarnessError::Template(d) => d.clone(),
            HarnessError::StepExecution { step, reason } => format!("{} - {}", step, reason),
            HarnessError::Capture { name, reason } => format!("{}: {}", name, reason),
            other => other.to_string(),
        }
    }

    /// `"<Kind>: <detail>"`, the form stored in a failed checkpoint.
    pub fn reason(&self) -> String {
        format!("{}: {}", self.kind(), self.detail())
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
