//! Proactive request pacing.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::Deserialize;

type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// GitLab.com allows 2000 requests/minute per user; stay well below it.
pub const GITLAB_DEFAULT_RPS: u32 = 5;

/// Token-bucket limiter shared by every clone.
///
/// ```ignore
/// let limiter = ApiRateLimiter::new(GITLAB_DEFAULT_RPS);
/// limiter.wait().await;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
    requests_per_second: NonZeroU32,
}

impl ApiRateLimiter {
    /// Allow `requests_per_second` requests per second. Zero is treated as 1.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            inner: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
            requests_per_second: rps,
        }
    }

    pub fn requests_per_second(&self) -> u32 {
        self.requests_per_second.get()
    }

    /// Wait until another request may be sent.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter")
            .field("requests_per_second", &self.requests_per_second)
            .finish()
    }
}

/// `[rate_limit]` configuration section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub disabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: GITLAB_DEFAULT_RPS,
            disabled: false,
        }
    }
}

impl RateLimitConfig {
    /// The configured limiter, or `None` when pacing is disabled.
    pub fn limiter(&self) -> Option<ApiRateLimiter> {
        (!self.disabled).then(|| ApiRateLimiter::new(self.requests_per_second))
    }
}
