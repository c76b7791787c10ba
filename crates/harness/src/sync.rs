//! State synchronization before captures and data-dependent steps
//!
//! Each condition is handed to the engine's native waiting once. There is
//! no retry loop here. A host-side deadline (timeout plus grace) bounds the
//! wait even when the engine never answers.

use std::time::Duration;
use tracing::debug;

use crate::config::TimeoutConfig;
use crate::engine::{BrowserEngine, EngineError, LoadState};
use crate::error::{HarnessError, HarnessResult};
use crate::flow::{Condition, WaitState};

#[derive(Debug, Clone)]
pub struct StateSynchronizer {
    timeouts: TimeoutConfig,
}

impl StateSynchronizer {
    pub fn new(timeouts: TimeoutConfig) -> Self {
        Self { timeouts }
    }

    /// Timeout applied to a condition: the step's override, else the
    /// navigation default for URL and network-idle, else the UI default.
    pub fn timeout_for(&self, condition: &Condition, override_ms: Option<u64>) -> Duration {
        match override_ms {
            Some(ms) => Duration::from_millis(ms),
            None if condition.is_navigation() => self.timeouts.navigation(),
            None => self.timeouts.ui(),
        }
    }

    /// Block until `condition` holds or its timeout passes.
    pub async fn await_condition(
        &self,
        engine: &mut dyn BrowserEngine,
        condition: &Condition,
        override_ms: Option<u64>,
    ) -> HarnessResult<()> {
        if let Condition::Duration { ms } = condition {
            debug!("Fixed wait of {}ms (condition not observable)", ms);
            tokio::time::sleep(Duration::from_millis(*ms)).await;
            return Ok(());
        }

        let timeout = self.timeout_for(condition, override_ms);
        debug!("Waiting up to {:?} for {}", timeout, condition.describe());

        let wait = async {
            match condition {
                Condition::Selector { selector, state } => {
                    engine.wait_for_selector(selector, *state, timeout).await
                }
                Condition::Text { text } => {
                    engine
                        .wait_for_selector(&format!("text={}", text), WaitState::Visible, timeout)
                        .await
                }
                Condition::Url { pattern } => engine.wait_for_url(pattern, timeout).await,
                Condition::NetworkIdle => {
                    engine.wait_for_load_state(LoadState::NetworkIdle, timeout).await
                }
                Condition::Duration { .. } => Ok(()),
            }
        };

        match tokio::time::timeout(timeout + self.timeouts.grace(), wait).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(EngineError::Timeout(_))) | Err(_) => {
                Err(HarnessError::WaitTimeout(condition.describe()))
            }
            Ok(Err(e)) => Err(HarnessError::StepExecution {
                step: format!("wait:{}", condition.describe()),
                reason: e.to_string(),
            }),
        }
    }
}
