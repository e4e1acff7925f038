//! Conversion from GitLab response bodies to remote read models.

use crate::remote::{BranchInfo, CommitInfo, RefState};

use super::types::{GitLabBranch, GitLabCommit, GitLabErrorBody, GitLabTag};

impl From<GitLabBranch> for RefState {
    fn from(branch: GitLabBranch) -> Self {
        RefState::new(branch.name, branch.commit.id)
    }
}

impl From<GitLabTag> for RefState {
    fn from(tag: GitLabTag) -> Self {
        RefState::new(tag.name, tag.commit.id)
    }
}

pub fn to_branch_info(branch: GitLabBranch) -> BranchInfo {
    BranchInfo {
        name: branch.name,
        commit_id: branch.commit.id,
        protected: branch.protected,
        default: branch.default,
    }
}

pub fn to_commit_info(commit: GitLabCommit) -> CommitInfo {
    CommitInfo {
        id: commit.id,
        short_id: commit.short_id,
        title: commit.title,
        author_name: commit.author_name,
        committed_at: commit.committed_date,
    }
}

/// Human-readable message from an error response body.
///
/// Falls back to the raw body when it is not a GitLab error object.
pub fn error_message(body: &[u8]) -> String {
    let raw = || String::from_utf8_lossy(body).trim().to_string();

    let Ok(parsed) = serde_json::from_slice::<GitLabErrorBody>(body) else {
        return raw();
    };

    match (parsed.message, parsed.error) {
        (Some(serde_json::Value::String(message)), _) => message,
        (Some(other), _) => other.to_string(),
        (None, Some(error)) => error,
        (None, None) => raw(),
    }
}
