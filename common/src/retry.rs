//! Bounded exponential backoff for tier calls.
//!
//! Every operation that talks to a backend goes through [`with_retry`]
//! with a small attempt ceiling. The caller decides which errors are
//! transient; everything else propagates immediately.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry budget and backoff shape.
///
/// Serialized as part of the service configuration; durations are
/// expressed in milliseconds to keep the config format flat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff before the second attempt.
    pub initial_backoff_ms: u64,
    /// Ceiling on the backoff between attempts.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 50,
            max_backoff_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Runs `op`, retrying with exponential backoff while `transient`
/// classifies the error as retryable and the attempt budget lasts.
pub async fn with_retry<T, E, Fut, Op, C>(policy: &RetryPolicy, mut op: Op, transient: C) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut backoff = policy.initial_backoff();
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts && transient(&e) => {
                tracing::debug!(attempt, error = %e, "transient error, backing off");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(policy.max_backoff());
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
