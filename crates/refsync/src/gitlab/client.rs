//! GitLab REST v4 client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use url::Url;

use super::convert::{error_message, to_branch_info, to_commit_info};
use super::types::{GitLabBranch, GitLabCommit, GitLabTag};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpHeaders, HttpMethod, HttpRequest, HttpResponse, HttpTransport, header_get};
use crate::rate_limit::ApiRateLimiter;
use crate::remote::{BranchInfo, CommitInfo, Page, RefApi, RefState, RemoteError, Result};

/// Default GitLab host.
pub const GITLAB_HOST: &str = "https://gitlab.com";

/// Largest page size GitLab accepts.
pub const MAX_PER_PAGE: u32 = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// [`RefApi`] for one GitLab project.
///
/// Every request carries the `PRIVATE-TOKEN` header when a token is set.
/// Non-2xx responses become [`RemoteError::Api`] with the response status,
/// so retry classification works on them directly.
#[derive(Clone)]
pub struct GitLabClient {
    transport: Arc<dyn HttpTransport>,
    host: Url,
    project: String,
    token: String,
    rate_limiter: Option<ApiRateLimiter>,
}

impl GitLabClient {
    /// Create a client for `project` (numeric id or `group/name` path).
    ///
    /// ```ignore
    /// let client = GitLabClient::new("https://gitlab.com", "glpat-...", "group/app", None)?;
    /// ```
    pub fn new(
        host: &str,
        token: &str,
        project: &str,
        rate_limiter: Option<ApiRateLimiter>,
    ) -> Result<Self> {
        let transport = ReqwestTransport::with_timeout(REQUEST_TIMEOUT)
            .map_err(|e| RemoteError::http(e.to_string()))?;
        Self::new_with_transport(host, token, project, rate_limiter, Arc::new(transport))
    }

    pub fn new_with_transport(
        host: &str,
        token: &str,
        project: &str,
        rate_limiter: Option<ApiRateLimiter>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let host = host.trim_end_matches('/');
        let host = if host.contains("://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        let host = Url::parse(&host).map_err(|e| RemoteError::InvalidUrl(format!("{host}: {e}")))?;
        if host.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(host.to_string()));
        }

        Ok(Self {
            transport,
            host,
            project: project.to_string(),
            token: token.to_string(),
            rate_limiter,
        })
    }

    /// Host URL without a trailing slash.
    pub fn host(&self) -> &str {
        self.host.as_str().trim_end_matches('/')
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// `{host}/api/v4/projects/{project}/{segments...}`, each segment
    /// percent-encoded on its own so `/` in names survives.
    fn project_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.host.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::InvalidUrl(self.host.to_string()))?
            .pop_if_empty()
            .extend(["api", "v4", "projects", self.project.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn paged_url(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
        page: u32,
        per_page: u32,
    ) -> Result<Url> {
        let mut url = self.project_url(segments)?;
        url.query_pairs_mut()
            .extend_pairs(query)
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.min(MAX_PER_PAGE).to_string());
        Ok(url)
    }

    async fn send(&self, method: HttpMethod, url: Url) -> Result<HttpResponse> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let mut request =
            HttpRequest::new(method, url.as_str()).header("Accept", "application/json");
        if !self.token.is_empty() {
            request = request.header("PRIVATE-TOKEN", self.token.as_str());
        }

        tracing::trace!(method = method.as_str(), url = %url, "GitLab request");

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| RemoteError::http(e.to_string()))?;

        if !response.is_success() {
            return Err(RemoteError::api(response.status, error_message(&response.body)));
        }
        Ok(response)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.send(HttpMethod::Get, url).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: Url,
        page: u32,
        per_page: u32,
    ) -> Result<Page<T>> {
        let response = self.send(HttpMethod::Get, url).await?;
        let items: Vec<T> = serde_json::from_slice(&response.body)?;
        Ok(page_from_headers(items, &response.headers, page, per_page))
    }
}

/// Build a [`Page`] from GitLab's pagination headers.
///
/// GitLab omits `x-total` and `x-total-pages` for collections over 10,000
/// items; those become unknown. `x-next-page` is empty on the last page.
fn page_from_headers<T>(items: Vec<T>, headers: &HttpHeaders, page: u32, per_page: u32) -> Page<T> {
    fn parse<N: std::str::FromStr>(headers: &HttpHeaders, name: &str) -> Option<N> {
        header_get(headers, name)?.trim().parse().ok()
    }

    let current_page = parse(headers, "x-page").unwrap_or(page);
    let items_per_page = parse(headers, "x-per-page").unwrap_or(per_page);
    let has_next = match header_get(headers, "x-next-page") {
        Some(next) => !next.trim().is_empty(),
        // Inferred: an exactly full last page costs one extra, empty fetch.
        None => items.len() >= items_per_page as usize && items_per_page > 0,
    };

    Page {
        items,
        total_items: parse(headers, "x-total"),
        items_per_page,
        total_pages: parse(headers, "x-total-pages"),
        current_page,
        has_next,
    }
}

#[async_trait]
impl RefApi for GitLabClient {
    async fn get_branch(&self, name: &str) -> Result<RefState> {
        let url = self.project_url(&["repository", "branches", name])?;
        let branch: GitLabBranch = self.get(url).await?;
        Ok(branch.into())
    }

    async fn create_branch(&self, name: &str, commit_id: &str) -> Result<RefState> {
        let mut url = self.project_url(&["repository", "branches"])?;
        url.query_pairs_mut()
            .append_pair("branch", name)
            .append_pair("ref", commit_id);

        let response = self.send(HttpMethod::Post, url).await?;
        let branch: GitLabBranch = serde_json::from_slice(&response.body)?;
        Ok(branch.into())
    }

    async fn delete_branch(&self, name: &str) -> Result<()> {
        let url = self.project_url(&["repository", "branches", name])?;
        self.send(HttpMethod::Delete, url).await?;
        Ok(())
    }

    async fn get_tag(&self, name: &str) -> Result<RefState> {
        let url = self.project_url(&["repository", "tags", name])?;
        let tag: GitLabTag = self.get(url).await?;
        Ok(tag.into())
    }

    async fn protect_branch(&self, name: &str) -> Result<()> {
        let mut url = self.project_url(&["protected_branches"])?;
        url.query_pairs_mut().append_pair("name", name);
        self.send(HttpMethod::Post, url).await?;
        Ok(())
    }

    async fn list_branches_page(&self, page: u32, per_page: u32) -> Result<Page<BranchInfo>> {
        let url = self.paged_url(&["repository", "branches"], &[], page, per_page)?;
        let raw: Page<GitLabBranch> = self.get_page(url, page, per_page).await?;
        Ok(map_page(raw, to_branch_info))
    }

    async fn list_commits_page(
        &self,
        ref_name: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Page<CommitInfo>> {
        let query: &[(&str, &str)] = if ref_name.is_empty() {
            &[]
        } else {
            &[("ref_name", ref_name)]
        };
        let url = self.paged_url(&["repository", "commits"], query, page, per_page)?;
        let raw: Page<GitLabCommit> = self.get_page(url, page, per_page).await?;
        Ok(map_page(raw, to_commit_info))
    }
}

fn map_page<T, U>(page: Page<T>, f: impl FnMut(T) -> U) -> Page<U> {
    Page {
        items: page.items.into_iter().map(f).collect(),
        total_items: page.total_items,
        items_per_page: page.items_per_page,
        total_pages: page.total_pages,
        current_page: page.current_page,
        has_next: page.has_next,
    }
}
