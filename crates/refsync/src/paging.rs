//! Lazy, single-pass streaming over paginated remote listings.
//!
//! A [`PagedSource`] is a cursor over a remote collection that is served one
//! page at a time. [`PageStream`] turns a source into a pull-based sequence:
//! pages are fetched only when the consumer needs the next item, each fetch
//! goes through the retry executor, and empty pages are skipped.
//!
//! # Example
//!
//! ```ignore
//! use refsync::paging::{Pager, stream};
//! use refsync::remote::CommitPages;
//!
//! let mut commits = stream(Pager::new(CommitPages::new(&client, "main", 100)), policy);
//! while let Some(commit) = commits.next().await? {
//!     println!("{} {}", commit.short_id, commit.title);
//! }
//! ```

use std::collections::VecDeque;
use std::fmt;

use async_trait::async_trait;

use crate::remote::{self, Classify, Page, PageFetcher, RemoteError};
use crate::retry::{RetryError, RetryPolicy, RetryState};

/// A cursor over a remote collection served in pages.
///
/// The metadata accessors describe the collection as of the most recently
/// fetched page. They are not guaranteed to stay consistent across fetches,
/// since the remote collection may change in between.
#[async_trait]
pub trait PagedSource: Send + Sync {
    type Item: Send;
    type Error: Classify + fmt::Display + Send;

    /// Total items in the collection, if known.
    fn total_items(&self) -> Option<u64>;

    /// Page size, if known.
    fn items_per_page(&self) -> Option<u32>;

    /// Total pages in the collection, if known.
    fn total_pages(&self) -> Option<u32>;

    /// 1-based index of the page the cursor is on; 0 before the first fetch.
    fn current_page(&self) -> u32;

    /// Items on the page the cursor is on, if any page has been fetched.
    fn current_page_len(&self) -> Option<usize>;

    /// Whether another page can be fetched.
    fn has_next(&self) -> bool;

    /// Fetch the next page and move the cursor onto it.
    async fn next_page(&mut self) -> Result<Vec<Self::Item>, Self::Error>;

    /// Fetch an arbitrary page without moving the cursor.
    async fn page(&self, page: u32) -> Result<Vec<Self::Item>, Self::Error>;
}

/// Cursor over any [`PageFetcher`], tracking the metadata of the last page.
pub struct Pager<F> {
    fetcher: F,
    current_page: u32,
    current_page_len: Option<usize>,
    total_items: Option<u64>,
    items_per_page: Option<u32>,
    total_pages: Option<u32>,
    has_next: bool,
}

impl<F: PageFetcher> Pager<F> {
    /// A cursor positioned before the first page. Nothing is fetched yet.
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            current_page: 0,
            current_page_len: None,
            total_items: None,
            items_per_page: None,
            total_pages: None,
            has_next: true,
        }
    }

    fn observe(&mut self, index: u32, page: &Page<F::Item>) {
        self.current_page = index;
        self.current_page_len = Some(page.items.len());
        self.total_items = page.total_items;
        self.items_per_page = Some(page.items_per_page);
        self.total_pages = page.total_pages;
        self.has_next = page.has_next;
    }
}

#[async_trait]
impl<F: PageFetcher> PagedSource for Pager<F> {
    type Item = F::Item;
    type Error = RemoteError;

    fn total_items(&self) -> Option<u64> {
        self.total_items
    }

    fn items_per_page(&self) -> Option<u32> {
        self.items_per_page
    }

    fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    fn current_page(&self) -> u32 {
        self.current_page
    }

    fn current_page_len(&self) -> Option<usize> {
        self.current_page_len
    }

    fn has_next(&self) -> bool {
        self.has_next
    }

    async fn next_page(&mut self) -> remote::Result<Vec<Self::Item>> {
        let index = self.current_page + 1;
        let page = self.fetcher.fetch_page(index).await?;
        self.observe(index, &page);
        Ok(page.items)
    }

    async fn page(&self, page: u32) -> remote::Result<Vec<Self::Item>> {
        Ok(self.fetcher.fetch_page(page).await?.items)
    }
}

/// Lazy, single-pass sequence over a [`PagedSource`].
///
/// Not restartable and not splittable: items are handed out exactly once,
/// to whoever holds the `&mut` borrow.
pub struct PageStream<S: PagedSource> {
    source: S,
    policy: RetryPolicy,
    buffer: VecDeque<S::Item>,
}

/// Stream the items of `source`, fetching each page under `policy`.
pub fn stream<S: PagedSource>(source: S, policy: RetryPolicy) -> PageStream<S> {
    PageStream::new(source, policy)
}

impl<S: PagedSource> PageStream<S> {
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self {
            source,
            policy,
            buffer: VecDeque::new(),
        }
    }

    /// The next item, or `None` once the source is exhausted.
    ///
    /// A failed page fetch leaves the cursor where it was, so calling
    /// `next` again retries the same page.
    pub async fn next(&mut self) -> Result<Option<S::Item>, RetryError<S::Error>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            if !self.source.has_next() {
                return Ok(None);
            }

            let items = self.fetch_next_page().await?;
            tracing::debug!(
                page = self.source.current_page(),
                count = items.len(),
                "Fetched page"
            );
            self.buffer.extend(items);
        }
    }

    async fn fetch_next_page(&mut self) -> Result<Vec<S::Item>, RetryError<S::Error>> {
        let mut state = RetryState::new(&self.policy);
        loop {
            match self.source.next_page().await {
                Ok(items) => return Ok(items),
                Err(e) => state.backoff(e).await?,
            }
        }
    }

    /// Items of the current page not yet handed out.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Best-effort count of the items still to come; `None` when unknown.
    ///
    /// Exact once the source has no further pages. Before that it is derived
    /// from the remote's reported total, which may have changed since the
    /// traversal started; an inconsistent total yields `None`.
    pub fn estimate_size(&self) -> Option<u64> {
        let remaining = self.buffer.len() as u64;
        if !self.source.has_next() {
            return Some(remaining);
        }

        let total = self.source.total_items()?;
        let per_page = u64::from(self.source.items_per_page()?);
        let passed = per_page.checked_mul(u64::from(self.source.current_page()))?;
        total.checked_add(remaining)?.checked_sub(passed)
    }

    /// Count of the items still to come, only when it is known exactly.
    pub fn exact_size(&self) -> Option<u64> {
        if self.source.has_next() {
            None
        } else {
            Some(self.buffer.len() as u64)
        }
    }

    /// Pull at most `n` items.
    pub async fn take_up_to(&mut self, n: usize) -> Result<Vec<S::Item>, RetryError<S::Error>> {
        let mut items = Vec::new();
        while items.len() < n {
            match self.next().await? {
                Some(item) => items.push(item),
                None => break,
            }
        }
        Ok(items)
    }

    /// Drain the stream into a vector.
    pub async fn collect_all(mut self) -> Result<Vec<S::Item>, RetryError<S::Error>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// The underlying source, for inspecting its metadata.
    pub fn source(&self) -> &S {
        &self.source
    }
}

/// Whether `source` has no items, without moving its cursor.
///
/// Answers from the source's reported counts when they are conclusive and
/// only falls back to fetching page 1 when they are not.
pub async fn is_empty<S: PagedSource>(
    source: &S,
    policy: &RetryPolicy,
) -> Result<bool, RetryError<S::Error>> {
    if let Some(total) = source.total_items() {
        return Ok(total == 0);
    }
    if source.items_per_page() == Some(0) {
        return Ok(true);
    }
    if let Some(pages) = source.total_pages() {
        return Ok(pages == 0);
    }
    if source.current_page() > 0 && source.current_page_len().is_some_and(|len| len > 0) {
        return Ok(false);
    }

    let mut state = RetryState::new(policy);
    loop {
        match source.page(1).await {
            Ok(items) => return Ok(items.is_empty()),
            Err(e) => state.backoff(e).await?,
        }
    }
}
