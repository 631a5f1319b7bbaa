//! Rate-limit aware retry loop.
//!
//! Every provider call is turned into an explicit [`Attempt`] tag and the loop
//! inspects the tag:
//! - `Done`: return the value
//! - `RateLimited(d)`: sleep `d + 1s`, then repeat the same request
//! - `Failed`: give up immediately, no retry
//!
//! Whether the loop ever stops retrying rate limits is the [`RetryPolicy`].
//! Sleeping goes through [`Sleeper`] so tests can record it instead.

use crate::provider::ProviderError;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Attempts allowed per record during batch id resolution
pub const BATCH_MAX_ATTEMPTS: u32 = 5;

/// Added to every server-requested back-off
pub const RETRY_PADDING: Duration = Duration::from_secs(1);

/// Outcome of a single attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    Done(T),
    /// Server asked to wait this long before retrying
    RateLimited(Duration),
    Failed(String),
}

impl<T> From<Result<T, ProviderError>> for Attempt<T> {
    fn from(result: Result<T, ProviderError>) -> Self {
        match result {
            Ok(value) => Attempt::Done(value),
            Err(ProviderError::RateLimited { retry_after }) => Attempt::RateLimited(retry_after),
            Err(err) => Attempt::Failed(err.to_string()),
        }
    }
}

/// How many rate-limited attempts to tolerate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry rate limits forever (live lookups, metadata fetch)
    Unbounded,
    /// Stop after this many attempts in total
    Bounded(u32),
}

impl RetryPolicy {
    /// Policy used for batch id resolution
    pub fn batch() -> Self {
        RetryPolicy::Bounded(BATCH_MAX_ATTEMPTS)
    }

    fn allows(&self, attempts_made: u32) -> bool {
        match self {
            RetryPolicy::Unbounded => true,
            RetryPolicy::Bounded(max) => attempts_made < *max,
        }
    }
}

/// Why the loop gave up
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetryFailure {
    /// A non-rate-limit error; never retried
    #[error("{0}")]
    Failed(String),

    /// Every allowed attempt was rate limited
    #[error("Too many retries")]
    TooManyRetries { attempts: u32 },
}

/// Blocks the calling worker for a back-off period
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Real sleeper: blocks the current thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Sleeper that only records what it was asked to do. Used by tests.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every requested sleep, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}

/// Run `op` until it succeeds, fails, or the policy runs out.
///
/// ## Algorithm
/// 1. Call `op`
/// 2. `Done` ⇒ return; `Failed` ⇒ return the failure
/// 3. `RateLimited(d)` ⇒ if the policy allows another attempt, sleep
///    `d + 1s` and go to 1; otherwise report `TooManyRetries`
///
/// There is no overall timeout: with [`RetryPolicy::Unbounded`] a provider
/// that keeps answering 429 keeps this worker waiting.
pub fn run_with_retry<T, F>(
    policy: RetryPolicy,
    sleeper: &dyn Sleeper,
    what: &str,
    mut op: F,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Attempt<T>,
{
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        match op() {
            Attempt::Done(value) => return Ok(value),
            Attempt::Failed(reason) => return Err(RetryFailure::Failed(reason)),
            Attempt::RateLimited(retry_after) => {
                if !policy.allows(attempts) {
                    warn!("{}: still rate limited after {} attempts", what, attempts);
                    return Err(RetryFailure::TooManyRetries { attempts });
                }
                let wait = retry_after + RETRY_PADDING;
                warn!("{}: rate limited; retrying in {}s", what, wait.as_secs());
                sleeper.sleep(wait);
            }
        }
    }
}
