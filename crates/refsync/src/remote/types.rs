use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::errors::Result;

/// Read model for a branch or tag.
///
/// An absent ref is represented as `Option::<RefState>::None` by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefState {
    /// Ref name, without any `refs/heads/` or `refs/tags/` prefix.
    pub name: String,
    /// Commit the ref currently points at.
    pub commit_id: String,
}

impl RefState {
    pub fn new(name: impl Into<String>, commit_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commit_id: commit_id.into(),
        }
    }

    /// Whether this ref points at exactly `commit_id`.
    #[inline]
    #[must_use]
    pub fn is_at(&self, commit_id: &str) -> bool {
        self.commit_id == commit_id
    }
}

/// A branch as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchInfo {
    pub name: String,
    pub commit_id: String,
    /// Whether pushes to the branch are restricted.
    pub protected: bool,
    /// Whether this is the repository's default branch.
    pub default: bool,
}

/// A commit as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    pub id: String,
    pub short_id: String,
    /// First line of the commit message.
    pub title: String,
    pub author_name: String,
    pub committed_at: Option<DateTime<Utc>>,
}

/// One page of a remote collection.
///
/// `total_items` and `has_next` describe the collection as it was when this
/// page was served. The remote may change between fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page, in remote order.
    pub items: Vec<T>,
    /// Total items in the collection, if the remote reported it.
    pub total_items: Option<u64>,
    /// Page size the remote used for this page.
    pub items_per_page: u32,
    /// Total pages in the collection, if the remote reported it.
    pub total_pages: Option<u32>,
    /// 1-based index of this page.
    pub current_page: u32,
    /// Whether the remote has a page after this one.
    pub has_next: bool,
}

impl<T> Page<T> {
    /// A page with no metadata beyond its position.
    pub fn new(items: Vec<T>, current_page: u32, items_per_page: u32, has_next: bool) -> Self {
        Self {
            items,
            total_items: None,
            items_per_page,
            total_pages: None,
            current_page,
            has_next,
        }
    }

    /// Attach collection totals reported by the remote.
    #[must_use]
    pub fn with_totals(mut self, total_items: u64, total_pages: u32) -> Self {
        self.total_items = Some(total_items);
        self.total_pages = Some(total_pages);
        self
    }
}

/// Remote "list page" operation.
///
/// Given a 1-based page index, returns that page together with the remote's
/// view of the collection size.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    type Item: Send;

    async fn fetch_page(&self, page: u32) -> Result<Page<Self::Item>>;
}

#[async_trait]
impl<F: PageFetcher + ?Sized> PageFetcher for &F {
    type Item = F::Item;

    async fn fetch_page(&self, page: u32) -> Result<Page<Self::Item>> {
        (**self).fetch_page(page).await
    }
}

/// Remote ref API of a Git-hosting system.
///
/// Implementations report failures as [`RemoteError`](super::RemoteError)
/// carrying the HTTP status, so callers can classify them without knowing
/// the client library. Writes are eventually consistent: a `get_branch`
/// issued right after `create_branch` may not observe the new branch yet.
#[async_trait]
pub trait RefApi: Send + Sync {
    /// Fetch a branch. Fails with a 404 error if it does not exist.
    async fn get_branch(&self, name: &str) -> Result<RefState>;

    /// Create a branch at `commit_id`.
    async fn create_branch(&self, name: &str, commit_id: &str) -> Result<RefState>;

    /// Delete a branch. Fails with a 404 error if it does not exist.
    async fn delete_branch(&self, name: &str) -> Result<()>;

    /// Fetch a tag. Fails with a 404 error if it does not exist.
    async fn get_tag(&self, name: &str) -> Result<RefState>;

    /// Restrict pushes and merges on a branch.
    async fn protect_branch(&self, name: &str) -> Result<()>;

    /// List one page of branches.
    async fn list_branches_page(&self, page: u32, per_page: u32) -> Result<Page<BranchInfo>>;

    /// List one page of commits reachable from `ref_name`, newest first.
    /// An empty `ref_name` means the default branch.
    async fn list_commits_page(
        &self,
        ref_name: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<CommitInfo>>;
}
