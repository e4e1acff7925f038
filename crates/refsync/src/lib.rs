//! refsync - Resilient access to eventually consistent Git-hosting APIs.
//!
//! Remote Git-hosting services fail transiently and apply writes
//! asynchronously. This library wraps their ref API with:
//!
//! - [`retry`] - a retry executor with configurable backoff that keeps every
//!   earlier failure attached to the final error
//! - [`poll`] - polling until a remote condition holds, with a bounded budget
//! - [`paging`] - a lazy, retrying stream over paginated collections
//! - [`refs`] - branch create/delete operations that confirm the remote
//!   actually reflects the change
//!
//! # Features
//!
//! - `gitlab` (default) - [`gitlab::GitLabClient`], a [`RefApi`] over the
//!   GitLab REST v4 API, plus request pacing in [`rate_limit`].
//!
//! # Example
//!
//! ```ignore
//! use refsync::{RefSync, RetryPolicy};
//! use refsync::gitlab::GitLabClient;
//!
//! let client = GitLabClient::new("https://gitlab.com", &token, "group/app", None)?;
//! let sync = RefSync::new(client, RetryPolicy::default());
//!
//! if sync.create_branch_and_verify("release", &sha, 30, Duration::from_secs(1)).await?.is_none() {
//!     eprintln!("release was requested but is not visible yet");
//! }
//! ```

pub mod http;
pub mod paging;
pub mod poll;
pub mod refs;
pub mod remote;
pub mod retry;

#[cfg(feature = "gitlab")]
pub mod gitlab;

#[cfg(feature = "gitlab")]
pub mod rate_limit;

pub use http::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
pub use paging::{PageStream, PagedSource, Pager};
pub use poll::{PollResult, VerifyConfig, call_until, try_call_until};
pub use refs::{RefSync, RefSyncError};
pub use remote::{
    BranchInfo, Classify, CommitInfo, ErrorClass, Page, PageFetcher, RefApi, RefState, RemoteError,
};
pub use retry::{
    RETRYABLE_FAILURE_EVENT, RetryConfig, RetryCounter, RetryError, RetryEvent, RetryPolicy,
    call_with_retries,
};

#[cfg(feature = "gitlab")]
pub use rate_limit::{ApiRateLimiter, RateLimitConfig};
