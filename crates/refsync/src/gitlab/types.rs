//! GitLab REST v4 response bodies, limited to the fields we read.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Commit summary embedded in branch and tag responses, and returned by the
/// commits listing.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabCommit {
    pub id: String,
    #[serde(default)]
    pub short_id: String,
    /// First line of the message.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author_name: String,
    pub committed_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabBranch {
    pub name: String,
    pub commit: GitLabCommit,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitLabTag {
    pub name: String,
    /// The commit the tag resolves to; annotated tags are peeled.
    pub commit: GitLabCommit,
    /// Tag object id for annotated tags, commit id otherwise.
    pub target: Option<String>,
}

/// Error body. `message` is a string for most errors and an object of
/// field errors for validation failures.
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabErrorBody {
    pub message: Option<serde_json::Value>,
    pub error: Option<String>,
}
