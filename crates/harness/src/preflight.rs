//! Reachability probe of the application under test

use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::HarnessResult;

/// Outcome of probing a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reachability {
    /// Any HTTP answer, including 4xx/5xx
    Reachable { status: u16, attempts: usize },
    Unreachable { attempts: usize, last_error: String },
}

impl Reachability {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Reachability::Reachable { .. })
    }
}

/// Poll `url` until it answers or `timeout` passes.
///
/// Any HTTP status counts as reachable; only connection-level failures are
/// retried. The flow runs either way, so this never fails the run.
pub async fn probe(url: &str, timeout: Duration) -> HarnessResult<Reachability> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let start = Instant::now();
    let mut attempts = 0;
    let mut last_error = String::new();

    loop {
        attempts += 1;

        match client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if !resp.status().is_success() {
                    debug!("Probe of {} returned {}", url, status);
                }
                return Ok(Reachability::Reachable { status, attempts });
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} to answer...", url);
                }
                // Connection refused is expected while the app is starting
                if !e.is_connect() {
                    warn!("Probe error: {}", e);
                }
                last_error = e.to_string();
            }
        }

        if start.elapsed() >= timeout {
            break;
        }
        sleep(Duration::from_millis(200)).await;
    }

    Ok(Reachability::Unreachable { attempts, last_error })
}
