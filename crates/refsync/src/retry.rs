//! Retry executor for remote calls.
//!
//! A call is retried only when its error classifies as
//! [`ErrorClass::Retryable`]. Every other failure propagates at once, with
//! the failures of earlier attempts attached as suppressed causes so they
//! stay visible without shadowing the error that ended the call.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use refsync::retry::{RetryPolicy, call_with_retries};
//!
//! let policy = RetryPolicy::exponential(5, Duration::from_secs(1), 2, Duration::from_secs(60));
//! let branch = call_with_retries(|| api.create_branch("feature", &sha), &policy).await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Deserialize;

use crate::remote::{Classify, ErrorClass, short_error_message};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Default factor applied to the wait after each failed retry.
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;

/// Label of the event emitted for every retryable failure.
pub const RETRYABLE_FAILURE_EVENT: &str = "remote.retryable_failure";

/// Emitted each time a call fails with a retryable error.
#[derive(Debug, Clone)]
pub struct RetryEvent {
    /// Always [`RETRYABLE_FAILURE_EVENT`].
    pub label: &'static str,
    /// 1-based attempt that failed.
    pub attempt: u32,
    /// Wait before the next attempt. Zero when retries are exhausted.
    pub wait: Duration,
    /// First line of the error.
    pub message: String,
}

/// Observer for retry events.
pub type RetryCallback = Arc<dyn Fn(&RetryEvent) + Send + Sync>;

/// Computes the next wait from the current one.
///
/// Returning `None` means the next wait could not be computed; the current
/// wait is kept for that round.
pub type BackoffFn = Arc<dyn Fn(Duration) -> Option<Duration> + Send + Sync>;

/// Emit a retry event if a callback is provided.
#[inline]
pub fn emit(on_retry: Option<&RetryCallback>, event: RetryEvent) {
    if let Some(cb) = on_retry {
        cb(&event);
    }
}

/// How a single logical call is retried.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_wait: Duration,
    backoff: BackoffFn,
    on_retry: Option<RetryCallback>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("initial_wait", &self.initial_wait)
            .field("on_retry", &self.on_retry.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into_policy()
    }
}

impl RetryPolicy {
    /// Create a policy with a custom backoff updater.
    pub fn new<F>(max_retries: u32, initial_wait: Duration, backoff: F) -> Self
    where
        F: Fn(Duration) -> Option<Duration> + Send + Sync + 'static,
    {
        Self {
            max_retries,
            initial_wait,
            backoff: Arc::new(backoff),
            on_retry: None,
        }
    }

    /// Try exactly once.
    #[must_use]
    pub fn none() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    /// Retry with the same wait between every attempt.
    #[must_use]
    pub fn fixed(max_retries: u32, wait: Duration) -> Self {
        Self::new(max_retries, wait, Some)
    }

    /// Retry with a wait multiplied by `multiplier` after each failed retry,
    /// capped at `max_wait`.
    #[must_use]
    pub fn exponential(
        max_retries: u32,
        initial_wait: Duration,
        multiplier: u32,
        max_wait: Duration,
    ) -> Self {
        Self::new(max_retries, initial_wait, move |wait| {
            Some(wait.checked_mul(multiplier).unwrap_or(max_wait).min(max_wait))
        })
    }

    /// Report every retryable failure to `callback`.
    #[must_use]
    pub fn with_callback(mut self, callback: RetryCallback) -> Self {
        self.on_retry = Some(callback);
        self
    }

    #[inline]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[inline]
    pub fn initial_wait(&self) -> Duration {
        self.initial_wait
    }
}

/// Serializable retry settings, as found in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub initial_wait_ms: u64,
    /// Upper bound for any single wait.
    pub max_wait_ms: u64,
    /// Factor applied to the wait after each failed retry.
    pub multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_wait_ms: INITIAL_BACKOFF_MS,
            max_wait_ms: MAX_BACKOFF_MS,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryConfig {
    /// Build an exponential retry policy from this configuration.
    #[must_use]
    pub fn into_policy(self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.max_retries,
            Duration::from_millis(self.initial_wait_ms),
            self.multiplier,
            Duration::from_millis(self.max_wait_ms),
        )
    }
}

/// The error that ended a retried call.
///
/// `suppressed` holds the failures of earlier attempts, oldest first.
#[derive(Debug)]
pub struct RetryError<E> {
    error: E,
    suppressed: Vec<E>,
}

impl<E> RetryError<E> {
    /// An error with no earlier attempts.
    pub fn new(error: E) -> Self {
        Self {
            error,
            suppressed: Vec::new(),
        }
    }

    /// The error that ended the call.
    #[inline]
    pub fn error(&self) -> &E {
        &self.error
    }

    /// Failures of earlier attempts, oldest first.
    #[inline]
    pub fn suppressed(&self) -> &[E] {
        &self.suppressed
    }

    /// Number of attempts that failed.
    #[inline]
    pub fn attempts(&self) -> usize {
        self.suppressed.len() + 1
    }

    pub fn into_inner(self) -> E {
        self.error
    }

    pub fn into_parts(self) -> (E, Vec<E>) {
        (self.error, self.suppressed)
    }
}

impl<E> From<E> for RetryError<E> {
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.suppressed.len() {
            0 => write!(f, "{}", self.error),
            n => write!(f, "{} (after {} earlier failed attempts)", self.error, n),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<E: Classify> Classify for RetryError<E> {
    fn class(&self) -> ErrorClass {
        self.error.class()
    }
}

/// Attempt bookkeeping for one logical call.
///
/// [`call_with_retries`] drives this for closures. Callers whose call
/// borrows state mutably (such as a page cursor) can drive it from their
/// own loop instead:
///
/// ```ignore
/// let mut state = RetryState::new(&policy);
/// let items = loop {
///     match source.next_page().await {
///         Ok(items) => break items,
///         Err(e) => state.backoff(e).await?,
///     }
/// };
/// ```
pub struct RetryState<'p, E> {
    policy: &'p RetryPolicy,
    wait: Duration,
    retries: u32,
    history: Vec<E>,
}

impl<'p, E: Classify + fmt::Display> RetryState<'p, E> {
    pub fn new(policy: &'p RetryPolicy) -> Self {
        Self {
            policy,
            wait: policy.initial_wait,
            retries: 0,
            history: Vec::new(),
        }
    }

    /// Retries performed so far.
    #[inline]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Record a failed attempt.
    ///
    /// Returns `Ok(())` after sleeping when the call should be attempted
    /// again, or the terminal error when it should not.
    pub async fn backoff(&mut self, error: E) -> Result<(), RetryError<E>> {
        if self.policy.max_retries == 0 {
            return Err(RetryError::new(error));
        }

        if !error.class().is_retryable() {
            return Err(self.fail(error));
        }

        let attempt = self.retries + 1;
        if self.retries >= self.policy.max_retries {
            self.notify(attempt, Duration::ZERO, &error);
            tracing::warn!(
                attempts = attempt,
                error = %short_error_message(&error),
                "Retries exhausted"
            );
            return Err(self.fail(error));
        }

        if !self.history.is_empty() {
            self.advance_wait();
        }
        self.notify(attempt, self.wait, &error);
        tracing::debug!(
            attempt,
            wait_ms = self.wait.as_millis() as u64,
            error = %short_error_message(&error),
            "Retryable failure, backing off"
        );

        self.history.push(error);
        self.retries += 1;

        if !self.wait.is_zero() {
            // Dropping the returned future is the only way to cut this short.
            tokio::time::sleep(self.wait).await;
        }
        Ok(())
    }

    fn advance_wait(&mut self) {
        match (self.policy.backoff)(self.wait) {
            Some(next) => self.wait = next,
            None => tracing::warn!(
                wait_ms = self.wait.as_millis() as u64,
                "Backoff updater failed, keeping current wait"
            ),
        }
    }

    fn notify(&self, attempt: u32, wait: Duration, error: &E) {
        emit(
            self.policy.on_retry.as_ref(),
            RetryEvent {
                label: RETRYABLE_FAILURE_EVENT,
                attempt,
                wait,
                message: short_error_message(error),
            },
        );
    }

    fn fail(&mut self, error: E) -> RetryError<E> {
        RetryError {
            error,
            suppressed: std::mem::take(&mut self.history),
        }
    }
}

/// Run `call`, retrying retryable failures according to `policy`.
///
/// With `max_retries == 0` the call runs exactly once and its error is
/// returned as-is. Otherwise the call runs at most `max_retries + 1` times;
/// when every attempt fails the last error is returned with the earlier
/// ones attached as suppressed causes.
pub async fn call_with_retries<T, E, F, Fut>(
    mut call: F,
    policy: &RetryPolicy,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + fmt::Display,
{
    let mut state = RetryState::new(policy);
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) => state.backoff(e).await?,
        }
    }
}

/// Counts retryable failures.
///
/// Cloning shares the underlying count, so the counter can be read after
/// handing its callback to a policy.
#[derive(Debug, Clone, Default)]
pub struct RetryCounter {
    count: Arc<AtomicU64>,
}

impl RetryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count.
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// A callback that increments this counter on every retryable failure.
    pub fn callback(&self) -> RetryCallback {
        let count = Arc::clone(&self.count);
        Arc::new(move |event| {
            if event.label == RETRYABLE_FAILURE_EVENT {
                count.fetch_add(1, Ordering::Relaxed);
            }
        })
    }
}
