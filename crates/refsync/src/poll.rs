//! Polling until a condition holds.
//!
//! Remote writes are eventually consistent: a branch created a moment ago may
//! not be returned by the next read. These helpers re-read until the expected
//! state shows up or the try budget runs out. Running out is an expected
//! outcome and is reported through [`PollResult::succeeded`], never as an
//! error.

use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;

/// Default number of tries when verifying a remote change.
pub const DEFAULT_VERIFY_TRIES: u32 = 30;

/// Default wait between verification tries in milliseconds.
pub const DEFAULT_VERIFY_WAIT_MS: u64 = 1_000;

/// Outcome of polling a supplier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult<T> {
    result: Option<T>,
    succeeded: bool,
}

impl<T> PollResult<T> {
    /// Whether the predicate held on the last value produced.
    #[inline]
    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    /// The last value produced, whether or not the predicate held.
    ///
    /// `None` only when the supplier was never invoked.
    #[inline]
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    pub fn into_result(self) -> Option<T> {
        self.result
    }

    /// The last value, only if the predicate held on it.
    pub fn into_success(self) -> Option<T> {
        if self.succeeded { self.result } else { None }
    }
}

/// Serializable polling budget, as found in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Maximum number of reads. Zero never reads and never succeeds.
    pub max_tries: u32,
    /// Wait between reads.
    pub wait_ms: u64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            max_tries: DEFAULT_VERIFY_TRIES,
            wait_ms: DEFAULT_VERIFY_WAIT_MS,
        }
    }
}

impl VerifyConfig {
    #[inline]
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

/// Call `supplier` until `predicate` holds on its value, at most `max_tries`
/// times, waiting `wait` between tries.
///
/// The first try happens immediately and there is no wait after the last one.
/// With `max_tries == 0` the supplier is never invoked and the result does
/// not succeed.
pub async fn call_until<T, F, Fut, P>(
    mut supplier: F,
    predicate: P,
    max_tries: u32,
    wait: Duration,
) -> PollResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = T>,
    P: Fn(&T) -> bool,
{
    let result = try_call_until(
        || {
            let next = supplier();
            async move { Ok::<_, Infallible>(next.await) }
        },
        predicate,
        max_tries,
        wait,
    )
    .await;

    match result {
        Ok(poll) => poll,
        Err(never) => match never {},
    }
}

/// Like [`call_until`], for suppliers that can fail.
///
/// The first supplier error stops polling and is returned.
pub async fn try_call_until<T, E, F, Fut, P>(
    mut supplier: F,
    predicate: P,
    max_tries: u32,
    wait: Duration,
) -> Result<PollResult<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    let mut last = None;

    for attempt in 1..=max_tries {
        let value = supplier().await?;
        if predicate(&value) {
            return Ok(PollResult {
                result: Some(value),
                succeeded: true,
            });
        }
        last = Some(value);

        if attempt < max_tries && !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    if max_tries > 0 {
        tracing::debug!(max_tries, "Condition not met within try budget");
    }

    Ok(PollResult {
        result: last,
        succeeded: false,
    })
}
