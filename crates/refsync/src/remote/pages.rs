use async_trait::async_trait;

use super::errors::Result;
use super::types::{BranchInfo, CommitInfo, Page, PageFetcher, RefApi};

/// Pages of the branch list of a repository.
pub struct BranchPages<'a, A: ?Sized> {
    api: &'a A,
    per_page: u32,
}

impl<'a, A: RefApi + ?Sized> BranchPages<'a, A> {
    pub fn new(api: &'a A, per_page: u32) -> Self {
        Self { api, per_page }
    }
}

#[async_trait]
impl<A: RefApi + ?Sized> PageFetcher for BranchPages<'_, A> {
    type Item = BranchInfo;

    async fn fetch_page(&self, page: u32) -> Result<Page<BranchInfo>> {
        self.api.list_branches_page(page, self.per_page).await
    }
}

/// Pages of the commit history reachable from one ref.
pub struct CommitPages<'a, A: ?Sized> {
    api: &'a A,
    ref_name: String,
    per_page: u32,
}

impl<'a, A: RefApi + ?Sized> CommitPages<'a, A> {
    pub fn new(api: &'a A, ref_name: impl Into<String>, per_page: u32) -> Self {
        Self {
            api,
            ref_name: ref_name.into(),
            per_page,
        }
    }
}

#[async_trait]
impl<A: RefApi + ?Sized> PageFetcher for CommitPages<'_, A> {
    type Item = CommitInfo;

    async fn fetch_page(&self, page: u32) -> Result<Page<CommitInfo>> {
        self.api
            .list_commits_page(&self.ref_name, page, self.per_page)
            .await
    }
}
