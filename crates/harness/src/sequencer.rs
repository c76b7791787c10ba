//! Stage-by-stage execution of a flow with per-stage failure isolation

use serde_json::Value;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::artifacts::ArtifactStore;
use crate::driver::FlowDriver;
use crate::error::{HarnessError, HarnessResult};
use crate::flow::{Condition, Flow, FlowStep, Stage, ERROR_ARTIFACT_PREFIX};
use crate::result::{Artifact, CheckpointOutcome, RunResult, StepRecord, StepStatus};
use crate::scripts;
use crate::template::TemplateContext;

/// What a successful step left behind
#[derive(Debug, Default)]
struct StepOutput {
    artifact: Option<Artifact>,
    output: Option<Value>,
}

/// Runs the stages of a flow in order against one session.
///
/// A failing step ends its stage; the sequencer records the failure and
/// moves on to the next stage. A failed checkpoint gets one best-effort
/// `error_<checkpoint>.png` capture.
pub struct StepSequencer<'a> {
    artifacts: &'a ArtifactStore,
    templates: &'a TemplateContext,
}

impl<'a> StepSequencer<'a> {
    pub fn new(artifacts: &'a ArtifactStore, templates: &'a TemplateContext) -> Self {
        Self { artifacts, templates }
    }

    /// Run every stage. Always returns a result, even if every step failed.
    pub async fn run(&self, session: &mut FlowDriver, flow: &Flow) -> RunResult {
        let start = Instant::now();
        let mut result = RunResult::new(&flow.name);

        info!(
            "Running flow '{}' ({} stages, {} steps)",
            flow.name,
            flow.stages.len(),
            flow.step_count()
        );

        for (i, stage) in flow.stages.iter().enumerate() {
            self.run_stage(session, i + 1, stage, &mut result).await;
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Flow '{}' finished: {} captured, {} failed ({} ms)",
            flow.name,
            result.captured(),
            result.failed(),
            result.duration_ms
        );
        result
    }

    async fn run_stage(&self, session: &mut FlowDriver, number: usize, stage: &Stage, result: &mut RunResult) {
        let checkpoint = stage.checkpoint.as_deref();
        let mut failure: Option<HarnessError> = None;
        let mut last_capture: Option<PathBuf> = None;

        for (j, step) in stage.steps.iter().enumerate() {
            let mut record = StepRecord {
                stage: number,
                step: j + 1,
                checkpoint: checkpoint.map(String::from),
                label: step.label(),
                status: StepStatus::Skipped,
                duration_ms: 0,
                error: None,
                artifact: None,
                output: None,
            };

            if failure.is_some() {
                debug!("Skipping {} after earlier failure", record.label);
                result.steps.push(record);
                continue;
            }

            let started = Instant::now();
            let outcome = self.execute_step(session, step).await;
            record.duration_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(done) => {
                    record.status = StepStatus::Ok;
                    if let Some(artifact) = &done.artifact {
                        last_capture = Some(artifact.path.clone());
                    }
                    record.artifact = done.artifact;
                    record.output = done.output;
                }
                Err(e) => {
                    record.status = StepStatus::Failed;
                    record.error = Some(e.reason());
                    failure = Some(e);
                }
            }
            result.steps.push(record);
        }

        match (checkpoint, failure) {
            (Some(cp), None) => {
                let outcome = match last_capture {
                    Some(path) => CheckpointOutcome::Captured { path },
                    None => CheckpointOutcome::Failed {
                        reason: format!("CaptureError: {}: stage took no screenshot", cp),
                    },
                };
                result.record(cp, outcome);
            }
            (Some(cp), Some(e)) => {
                error!("Error in {}: {}", cp, e);
                result.record(cp, CheckpointOutcome::Failed { reason: e.reason() });
                self.fallback_capture(session, cp, result).await;
            }
            (None, Some(e)) => warn!("Error in stage {}: {}", number, e),
            (None, None) => {}
        }
    }

    async fn execute_step(&self, session: &mut FlowDriver, step: &FlowStep) -> HarnessResult<StepOutput> {
        // Substitution happens once, right before the step runs
        let step = self.templates.render_step(step)?;
        debug!("Executing step: {}", step.label());

        match &step {
            FlowStep::Navigate { url } => session.navigate(url).await?,
            FlowStep::Fill { selector, value } => session.fill(selector, value).await?,
            FlowStep::Click { selector } => session.click(selector).await?,
            FlowStep::Press { selector, key } => session.press(selector.as_deref(), key).await?,
            FlowStep::WaitFor { condition, timeout_ms } => session.wait_for(condition, *timeout_ms).await?,
            FlowStep::Sleep { ms } => session.wait_for(&Condition::Duration { ms: *ms }, None).await?,
            FlowStep::Log { message } => info!("[FLOW] {}", message),
            FlowStep::Evaluate { script, arg } => {
                let source = scripts::resolve(script)?;
                let value = session.evaluate(&source, arg).await?;
                debug!("evaluate returned {}", value);
                let output = (!value.is_null()).then_some(value);
                return Ok(StepOutput { artifact: None, output });
            }
            FlowStep::Screenshot { name, target, full_page, .. } => {
                let path = self.artifacts.path_for(name);
                session.screenshot(name, &path, target.as_deref(), *full_page).await?;
                let sha256 = self.artifacts.digest(&path).map_err(|e| HarnessError::Capture {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
                info!("Captured {}", path.display());
                return Ok(StepOutput {
                    artifact: Some(Artifact {
                        name: name.clone(),
                        path,
                        sha256,
                        fallback: false,
                    }),
                    output: None,
                });
            }
        }

        Ok(StepOutput::default())
    }

    /// Best-effort capture of the page state after a checkpoint failed.
    /// Failures here are logged and otherwise dropped.
    async fn fallback_capture(&self, session: &mut FlowDriver, checkpoint: &str, result: &mut RunResult) {
        let name = format!("{}{}", ERROR_ARTIFACT_PREFIX, checkpoint);
        let path = self.artifacts.error_path(checkpoint);

        if let Err(e) = session.screenshot(&name, &path, None, false).await {
            warn!("Fallback capture for '{}' failed: {}", checkpoint, e);
            return;
        }

        match self.artifacts.digest(&path) {
            Ok(sha256) => {
                info!("Captured {}", path.display());
                result.fallbacks.push(Artifact {
                    name,
                    path,
                    sha256,
                    fallback: true,
                });
            }
            Err(e) => warn!("Fallback capture for '{}' unreadable: {}", checkpoint, e),
        }
    }
}
