use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::errors::RemoteError;
use crate::domain::models::MonitoringConfig;

/// Retries a call in place after a read timeout, allowing more time on each
/// attempt until the ceiling is passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutLadder {
    initial_secs: u64,
    increment_secs: u64,
    ceiling_secs: u64,
    retry: bool,
}

impl TimeoutLadder {
    pub const fn new(initial_secs: u64, increment_secs: u64, ceiling_secs: u64, retry: bool) -> Self {
        Self {
            initial_secs,
            increment_secs,
            ceiling_secs,
            retry,
        }
    }

    pub const fn from_config(config: &MonitoringConfig) -> Self {
        Self::new(
            config.request_timeout_secs,
            config.timeout_increment_secs,
            config.timeout_ceiling_secs,
            config.retry_on_timeout,
        )
    }

    pub const fn initial(&self) -> Duration {
        Duration::from_secs(self.initial_secs)
    }

    pub const fn ceiling_secs(&self) -> u64 {
        self.ceiling_secs
    }

    /// The timeout of every attempt the ladder will make, in order.
    pub fn steps(&self) -> Vec<Duration> {
        let mut steps = vec![Duration::from_secs(self.initial_secs)];
        if !self.retry || self.increment_secs == 0 {
            return steps;
        }
        let mut secs = self.initial_secs;
        while let Some(next) = secs.checked_add(self.increment_secs) {
            if next > self.ceiling_secs {
                break;
            }
            steps.push(Duration::from_secs(next));
            secs = next;
        }
        steps
    }

    /// Run `operation` with each timeout in turn.
    ///
    /// Only read timeouts move to the next step; any other error is returned
    /// at once. A timeout on the last step is returned as
    /// [`RemoteError::ReadTimeout`].
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, RemoteError>
    where
        F: FnMut(Duration) -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut last_timeout = Duration::from_secs(self.initial_secs);

        for (attempt, timeout) in self.steps().into_iter().enumerate() {
            match operation(timeout).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt, timeout_secs = timeout.as_secs(), "Call succeeded after read timeout");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_read_timeout() => {
                    warn!(
                        attempt = attempt + 1,
                        timeout_secs = timeout.as_secs(),
                        ceiling_secs = self.ceiling_secs,
                        "Read timeout"
                    );
                    last_timeout = timeout;
                }
                Err(err) => return Err(err),
            }
        }

        Err(RemoteError::ReadTimeout {
            timeout_secs: last_timeout.as_secs(),
            ceiling_secs: self.ceiling_secs,
        })
    }
}

impl Default for TimeoutLadder {
    fn default() -> Self {
        Self::from_config(&MonitoringConfig::default())
    }
}
