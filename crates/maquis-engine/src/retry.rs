//! # Transient Retry
//!
//! Re-runs an operation when the store reports a failure that may clear up
//! on its own (locked database, exhausted pool, I/O hiccup).
//!
//! ```text
//! attempt 1 ── TRANSIENT ──► sleep(backoff) ──► attempt 2 ── ok ──► result
//!           └─ CONFLICT, NOT_FOUND, ... ───────────────────────────► error
//! ```
//!
//! Each attempt is a whole operation with its own transaction, and a failed
//! attempt rolled back before the next one starts.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::RetrySettings;
use crate::error::EngineResult;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(settings: &RetrySettings) -> Self {
        RetryPolicy {
            retries: settings.transient_retries,
            initial_backoff: settings.initial_backoff(),
            max_backoff: settings.max_backoff(),
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Runs `attempt` until it succeeds, fails with a non-transient error,
    /// or the retries are used up.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> EngineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        let mut backoff = self.create_backoff();
        let mut retried = 0u32;

        loop {
            match attempt().await {
                Err(err) if err.is_transient() && retried < self.retries => {
                    retried += 1;
                    let delay = backoff.next_backoff().unwrap_or(self.max_backoff);
                    warn!(operation, attempt = retried, ?delay, error = %err, "Transient failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                outcome => return outcome,
            }
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(&RetrySettings::default())
    }
}
