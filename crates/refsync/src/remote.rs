//! Boundary to the remote Git-hosting API.
//!
//! This module defines the `RefApi` trait the resilience layer talks to, the
//! page model of remote listings, and the error classification that decides
//! whether a failed call is retried.
//!
//! # Example
//!
//! ```ignore
//! use refsync::remote::{Classify, ErrorClass, RefApi};
//!
//! async fn head_of<A: RefApi>(api: &A, branch: &str) -> Option<String> {
//!     match api.get_branch(branch).await {
//!         Ok(state) => Some(state.commit_id),
//!         Err(e) if e.class() == ErrorClass::NotFound => None,
//!         Err(e) => panic!("{e}"),
//!     }
//! }
//! ```

mod errors;
mod pages;
mod types;

pub use errors::{Classify, ErrorClass, RemoteError, Result, short_error_message};
pub use pages::{BranchPages, CommitPages};
pub use types::{BranchInfo, CommitInfo, Page, PageFetcher, RefApi, RefState};
