use std::thread;
use std::time::{Duration, Instant};

use crate::config::HarnessConfig;
use crate::error::PageError;

/// Interval and deadline for one bounded-retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollConfig {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        PollConfig { timeout, interval }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        PollConfig::new(config.timeout(), config.poll_interval())
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig::from_config(&HarnessConfig::default())
    }
}

/// What a single probe observed.
pub enum Probe<T, O> {
    /// Condition holds
    Ready(T),
    /// Not yet; carries the observation for diagnostics
    Pending(O),
}

/// How a polling loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T, O> {
    Ready { value: T, elapsed: Duration, attempts: u32 },
    Expired { last: Option<O>, elapsed: Duration, attempts: u32 },
}

/// Run `probe` until it reports ready or the timeout passes.
///
/// The probe always runs at least once. Between attempts only the calling
/// thread sleeps. A fatal page error ends the loop immediately; stale node
/// errors count as a pending attempt.
pub fn poll_until<T, O, F>(config: PollConfig, mut probe: F) -> Result<PollOutcome<T, O>, PageError>
where
    F: FnMut() -> Result<Probe<T, O>, PageError>,
{
    let start = Instant::now();
    let mut attempts = 0u32;
    let mut last = None;

    loop {
        attempts += 1;
        match probe() {
            Ok(Probe::Ready(value)) => {
                return Ok(PollOutcome::Ready {
                    value,
                    elapsed: start.elapsed(),
                    attempts,
                });
            }
            Ok(Probe::Pending(observed)) => last = Some(observed),
            Err(PageError::StaleNode(node)) => {
                tracing::trace!(%node, "stale node while polling, retrying");
            }
            Err(e) => return Err(e),
        }

        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            return Ok(PollOutcome::Expired {
                last,
                elapsed,
                attempts,
            });
        }
        let remaining = config.timeout - elapsed;
        thread::sleep(config.interval.min(remaining));
    }
}
