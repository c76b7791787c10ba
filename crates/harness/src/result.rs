//! Run records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::error::HarnessResult;

/// Outcome of one checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckpointOutcome {
    Captured { path: PathBuf },
    Failed { reason: String },
}

impl CheckpointOutcome {
    pub fn is_captured(&self) -> bool {
        matches!(self, CheckpointOutcome::Captured { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub name: String,
    pub outcome: CheckpointOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Failed,
    /// Not attempted because an earlier step of the stage failed
    Skipped,
}

/// A file written during the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub path: PathBuf,
    pub sha256: String,
    /// Written by the fallback capture of a failed checkpoint
    #[serde(default)]
    pub fallback: bool,
}

/// One line of the step log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based stage number
    pub stage: usize,
    /// 1-based step number within the stage
    pub step: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,
    pub label: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    /// Value returned by an evaluate step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
}

/// Result of running one flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub flow: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Identity used by the run; the password is never recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Checkpoint outcomes in execution order
    pub checkpoints: Vec<CheckpointEntry>,
    pub steps: Vec<StepRecord>,
    /// Fallback captures written for failed checkpoints
    #[serde(default)]
    pub fallbacks: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teardown_error: Option<String>,
}

impl RunResult {
    pub fn new(flow: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            flow: flow.to_string(),
            started_at: Utc::now(),
            duration_ms: 0,
            username: None,
            checkpoints: Vec::new(),
            steps: Vec::new(),
            fallbacks: Vec::new(),
            teardown_error: None,
        }
    }

    /// Append a checkpoint outcome; entries are never rewritten
    pub fn record(&mut self, name: &str, outcome: CheckpointOutcome) {
        self.checkpoints.push(CheckpointEntry {
            name: name.to_string(),
            outcome,
        });
    }

    /// Latest outcome recorded for a checkpoint
    pub fn get(&self, name: &str) -> Option<&CheckpointOutcome> {
        self.checkpoints
            .iter()
            .rev()
            .find(|e| e.name == name)
            .map(|e| &e.outcome)
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn captured(&self) -> usize {
        self.checkpoints.iter().filter(|e| e.outcome.is_captured()).count()
    }

    pub fn failed(&self) -> usize {
        self.checkpoints.len() - self.captured()
    }

    /// Every checkpoint captured
    pub fn all_captured(&self) -> bool {
        self.failed() == 0
    }

    /// Names of the non-fallback artifacts written, in capture order
    pub fn artifact_names(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter_map(|s| s.artifact.as_ref())
            .filter_map(|a| a.path.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect()
    }

    /// Write the record as pretty JSON
    pub fn write(&self, path: &Path) -> HarnessResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;

        info!("Run record written to: {}", path.display());
        Ok(())
    }

    pub fn read(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
