//! GitLab REST v4 implementation of [`RefApi`](crate::remote::RefApi).
//!
//! # Module Structure
//!
//! - [`types`] - Response bodies
//! - [`client`] - The client and its request plumbing
//! - [`convert`] - Conversion to remote read models
//!
//! ```ignore
//! use refsync::gitlab::GitLabClient;
//! use refsync::refs::RefSync;
//! use refsync::retry::RetryPolicy;
//!
//! let client = GitLabClient::new("https://gitlab.com", &token, "group/app", None)?;
//! let sync = RefSync::new(client, RetryPolicy::default());
//! let branch = sync.create_branch_and_verify("release", &sha, 30, wait).await?;
//! ```

mod client;
mod convert;
mod types;

pub use client::{GITLAB_HOST, GitLabClient, MAX_PER_PAGE};
pub use convert::error_message;
pub use types::{GitLabBranch, GitLabCommit, GitLabTag};
