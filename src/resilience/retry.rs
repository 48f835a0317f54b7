// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Reconnect backoff policy.
//!
//! The delay before retry `i` (1-indexed) grows by a fixed step and is capped:
//! `min(i * step, max_delay)`. With the defaults that is 100ms, 200ms, ... up to
//! 3s, and the supervisor gives up after 10 consecutive failed attempts.
//!
//! # Example
//!
//! ```
//! use resilient_store::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::default();
//! assert_eq!(policy.delay_for(1), Duration::from_millis(100));
//! assert_eq!(policy.delay_for(5), Duration::from_millis(500));
//! assert_eq!(policy.delay_for(50), Duration::from_secs(3));
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::storage::traits::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay added per retry
    pub step: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
    /// Consecutive failed attempts before giving up
    pub max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(100),
            max_delay: Duration::from_secs(3),
            max_attempts: 10,
        }
    }
}

impl RetryPolicy {
    /// Fast retry for tests (minimal delays)
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            step: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            max_attempts: 3,
        }
    }

    /// Delay to wait before retry number `retry` (1-indexed). Zero for `retry == 0`.
    #[must_use]
    pub fn delay_for(&self, retry: usize) -> Duration {
        let retry = u32::try_from(retry).unwrap_or(u32::MAX);
        self.step.saturating_mul(retry).min(self.max_delay)
    }

    /// Total time spent sleeping if every attempt fails.
    #[must_use]
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts).map(|i| self.delay_for(i)).sum()
    }
}

/// Run `operation` until it succeeds, the policy's attempt budget is spent, or it
/// returns an error that is not recoverable.
///
/// `failed_so_far` counts attempts already made elsewhere in this epoch, so a
/// caller that tried once inline passes `1` and the loop starts by sleeping the
/// delay for retry 1.
pub async fn retry<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    failed_so_far: usize,
    mut operation: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut failures = failed_so_far;

    loop {
        sleep(policy.delay_for(failures)).await;

        match operation().await {
            Ok(val) => {
                if failures > 0 {
                    info!("Operation '{}' succeeded after {} failed attempts", operation_name, failures);
                }
                return Ok(val);
            }
            Err(err) => {
                failures += 1;

                if !err.is_recoverable() || failures >= policy.max_attempts {
                    return Err(err);
                }

                warn!(
                    "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation_name,
                    failures,
                    policy.max_attempts,
                    err,
                    policy.delay_for(failures)
                );
            }
        }
    }
}
