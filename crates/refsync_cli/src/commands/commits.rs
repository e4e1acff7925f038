use refsync::paging::{self, Pager};
use refsync::remote::{CommitInfo, CommitPages};
use serde::Serialize;
use tabled::Tabled;

use crate::commands::shared::{Session, print_rows};
use crate::shutdown::is_shutdown_requested;

#[derive(Debug, Clone, Serialize, Tabled)]
pub(crate) struct CommitRow {
    #[tabled(rename = "Commit")]
    pub short_id: String,
    #[tabled(rename = "Author")]
    pub author_name: String,
    #[tabled(rename = "Date")]
    pub committed_at: String,
    #[tabled(rename = "Title")]
    pub title: String,
}

impl From<CommitInfo> for CommitRow {
    fn from(commit: CommitInfo) -> Self {
        Self {
            short_id: commit.short_id,
            author_name: commit.author_name,
            committed_at: commit
                .committed_at
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            title: commit.title,
        }
    }
}

/// List commits reachable from `ref_name`, pulling pages only as needed.
pub(crate) async fn handle_commits(
    ref_name: Option<String>,
    limit: usize,
    session: &Session,
) -> Result<(), Box<dyn std::error::Error>> {
    let ref_name = ref_name.unwrap_or_default();
    let per_page = session.per_page.min(limit.max(1).try_into().unwrap_or(u32::MAX));
    let pages = CommitPages::new(session.client(), ref_name.as_str(), per_page);
    let mut commits = paging::stream(Pager::new(pages), session.policy().clone());

    let mut rows = Vec::new();
    while rows.len() < limit {
        if is_shutdown_requested() {
            tracing::warn!(fetched = rows.len(), "Stopping commit listing");
            break;
        }

        let Some(commit) = commits.next().await? else {
            break;
        };
        rows.push(CommitRow::from(commit));

        if rows.len() == 1 {
            match commits.estimate_size() {
                Some(remaining) => {
                    tracing::info!(total = remaining + 1, "Streaming commits")
                }
                None => tracing::info!("Streaming commits, total unknown"),
            }
        }
    }

    print_rows(&rows, session.output)?;
    session.report_retries();
    Ok(())
}
