use crate::config::RetryPolicy;
use crate::errors::UploadError;
use std::time::Duration;
use tracing::{error, warn};

/// What the caller should do after a counted failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given duration, then move on to the next item.
    Backoff(Duration),
    /// The failure ceiling was exceeded; stop the whole run.
    Abort { failures: u32 },
}

/// Counts failures across both stages of a run and turns them into backoff waits.
#[derive(Debug, Clone)]
pub struct RetryController {
    policy: RetryPolicy,
    time_unit: Duration,
    failures: u32,
}

impl RetryController {
    pub fn new(policy: RetryPolicy, time_unit: Duration) -> Self {
        Self {
            policy,
            time_unit,
            failures: 0,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn record_failure(&mut self) -> RetryDecision {
        self.failures = self.failures.saturating_add(1);
        if self.failures > self.policy.max_failures {
            return RetryDecision::Abort {
                failures: self.failures,
            };
        }
        let units = u64::from(self.failures).saturating_mul(self.policy.backoff_units);
        RetryDecision::Backoff(
            self.time_unit
                .saturating_mul(u32::try_from(units).unwrap_or(u32::MAX)),
        )
    }

    pub fn record_success(&mut self) {
        if self.policy.reset_on_success {
            self.failures = 0;
        }
    }

    /// Records a failure and either sleeps out the backoff or returns the abort error.
    pub async fn backoff_or_abort(&mut self) -> Result<(), UploadError> {
        match self.record_failure() {
            RetryDecision::Backoff(wait) => {
                warn!(
                    "Failure {} of {} allowed; retrying in {:?}...",
                    self.failures, self.policy.max_failures, wait
                );
                tokio::time::sleep(wait).await;
                Ok(())
            }
            RetryDecision::Abort { failures } => {
                error!("Too many errors ({failures}), stopping.");
                Err(UploadError::TooManyFailures { failures })
            }
        }
    }
}
