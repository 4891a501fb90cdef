// src/probe/executor.rs
use super::{CheckOutcome, Probe, ProbeError, Target};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs one bounded probe and turns whatever happened into a `CheckOutcome`.
///
/// Failures never escape: a transport error or an expired deadline becomes an
/// outcome with the unreachable status and the time spent until the failure.
#[derive(Clone)]
pub struct ProbeExecutor {
    probe: Arc<dyn Probe>,
    timeout: Duration,
}

impl ProbeExecutor {
    pub fn new(probe: Arc<dyn Probe>) -> Self {
        Self {
            probe,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn execute(&self, target: Target) -> CheckOutcome {
        let start = Instant::now();
        let result = timeout(self.timeout, self.probe.get(&target)).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(status)) => {
                debug!("Probe {} answered {} in {}ms", target, status, latency_ms);
                CheckOutcome::reachable(target, status, latency_ms)
            }
            Ok(Err(e)) => {
                warn!("Probe {} failed after {}ms: {}", target, latency_ms, e);
                CheckOutcome::unreachable(target, latency_ms, e.to_string())
            }
            Err(_) => {
                let e = ProbeError::Timeout(self.timeout);
                warn!("Probe {} failed after {}ms: {}", target, latency_ms, e);
                CheckOutcome::unreachable(target, latency_ms, e.to_string())
            }
        }
    }
}
