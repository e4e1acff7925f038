use refsync::paging::{self, Pager};
use refsync::remote::{BranchInfo, BranchPages, RefState};
use serde::Serialize;
use tabled::Tabled;

use crate::BranchAction;
use crate::commands::shared::{Session, print_rows};
use crate::shutdown::is_shutdown_requested;

/// One ref for display.
#[derive(Debug, Clone, Serialize, Tabled)]
pub(crate) struct RefRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Commit")]
    pub commit_id: String,
}

impl From<RefState> for RefRow {
    fn from(state: RefState) -> Self {
        Self {
            name: state.name,
            commit_id: state.commit_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub(crate) struct BranchRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Commit")]
    pub commit_id: String,
    #[tabled(rename = "Protected")]
    pub protected: bool,
    #[tabled(rename = "Default")]
    pub default: bool,
}

impl From<BranchInfo> for BranchRow {
    fn from(info: BranchInfo) -> Self {
        Self {
            name: info.name,
            commit_id: info.commit_id,
            protected: info.protected,
            default: info.default,
        }
    }
}

pub(crate) async fn handle_branch(
    action: BranchAction,
    session: &Session,
) -> Result<(), Box<dyn std::error::Error>> {
    let sync = &session.sync;
    let verify = session.verify;

    match action {
        BranchAction::Get { name } => {
            let state = sync
                .get_branch(&name)
                .await?
                .ok_or_else(|| format!("Branch '{name}' not found"))?;
            print_rows(&[RefRow::from(state)], session.output)?;
        }
        BranchAction::Create {
            name,
            from_commit,
            from_branch,
        } => {
            let created = match (from_commit, from_branch) {
                (Some(commit), _) => {
                    sync.create_branch_and_verify(&name, &commit, verify.max_tries, verify.wait)
                        .await?
                }
                (None, Some(source)) => {
                    sync.create_branch_from_source_branch(
                        &name,
                        &source,
                        verify.max_tries,
                        verify.wait,
                    )
                    .await?
                }
                (None, None) => return Err("Pass --from-commit or --from-branch".into()),
            };

            let state = created.ok_or_else(|| {
                format!(
                    "Could not confirm branch '{name}' within {} tries; it may still appear",
                    verify.max_tries
                )
            })?;
            print_rows(&[RefRow::from(state)], session.output)?;
        }
        BranchAction::Delete { name } => {
            let confirmed = sync
                .delete_branch_and_verify(&name, verify.max_tries, verify.wait)
                .await?;
            if !confirmed {
                return Err(format!(
                    "Could not confirm deletion of '{name}' within {} tries",
                    verify.max_tries
                )
                .into());
            }
            println!("Deleted branch {name}");
        }
        BranchAction::ProtectFromTag { name, tag } => {
            let state = sync
                .create_protected_branch_from_tag(&name, &tag, verify.max_tries, verify.wait)
                .await?;
            print_rows(&[RefRow::from(state)], session.output)?;
        }
        BranchAction::List { limit } => {
            let pages = BranchPages::new(session.client(), session.per_page);
            let mut branches = paging::stream(Pager::new(pages), session.policy().clone());
            let mut rows = Vec::new();

            while limit.is_none_or(|limit| rows.len() < limit) {
                if is_shutdown_requested() {
                    tracing::warn!(fetched = rows.len(), "Stopping branch listing");
                    break;
                }
                match branches.next().await? {
                    Some(branch) => rows.push(BranchRow::from(branch)),
                    None => break,
                }
            }
            print_rows(&rows, session.output)?;
        }
    }

    session.report_retries();
    Ok(())
}
