//! Verified branch and tag operations.
//!
//! Reads go straight to the remote. Writes are retried through
//! [`call_with_retries`] and then confirmed by polling until the remote
//! reflects them.
//!
//! A `None` or `false` from a verifying operation means the change could not
//! be confirmed within the try budget. It may still have happened; callers
//! that need certainty should poll again with a larger budget or report the
//! ambiguity.

use std::time::Duration;

use thiserror::Error;

use crate::poll::try_call_until;
use crate::remote::{self, Classify, RefApi, RefState, RemoteError};
use crate::retry::{RetryError, RetryPolicy, call_with_retries};

/// Errors from verified ref operations.
#[derive(Debug, Error)]
pub enum RefSyncError {
    /// A remote call failed, possibly after retries.
    #[error(transparent)]
    Remote(#[from] RetryError<RemoteError>),

    /// The remote state contradicts the request.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// A change was requested but never observed.
    #[error("Could not confirm that branch {name} points at {commit_id}")]
    Unverified { name: String, commit_id: String },
}

impl From<RemoteError> for RefSyncError {
    fn from(err: RemoteError) -> Self {
        Self::Remote(RetryError::new(err))
    }
}

impl RefSyncError {
    /// Create a conflict error.
    #[inline]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }
}

/// Result type for verified ref operations.
pub type Result<T> = std::result::Result<T, RefSyncError>;

/// Treat a 404 as absence.
fn absent_if_not_found(result: remote::Result<RefState>) -> Result<Option<RefState>> {
    match result {
        Ok(state) => Ok(Some(state)),
        Err(e) if e.class().is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Branch and tag operations over a [`RefApi`], with write verification.
pub struct RefSync<A> {
    api: A,
    policy: RetryPolicy,
}

impl<A: RefApi> RefSync<A> {
    /// Wrap `api`; writes are retried under `policy`.
    pub fn new(api: A, policy: RetryPolicy) -> Self {
        Self { api, policy }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// The branch, or `None` if the remote does not have it.
    pub async fn get_branch(&self, name: &str) -> Result<Option<RefState>> {
        absent_if_not_found(self.api.get_branch(name).await)
    }

    pub async fn branch_exists(&self, name: &str) -> Result<bool> {
        Ok(self.get_branch(name).await?.is_some())
    }

    /// The tag, or `None` if the remote does not have it.
    pub async fn get_tag(&self, name: &str) -> Result<Option<RefState>> {
        absent_if_not_found(self.api.get_tag(name).await)
    }

    pub async fn tag_exists(&self, name: &str) -> Result<bool> {
        Ok(self.get_tag(name).await?.is_some())
    }

    /// Delete a branch and wait until the remote no longer returns it.
    ///
    /// Deleting a branch the remote reports as missing succeeds at once.
    /// Returns whether absence was confirmed.
    pub async fn delete_branch_and_verify(
        &self,
        name: &str,
        max_tries: u32,
        wait: Duration,
    ) -> Result<bool> {
        match call_with_retries(|| self.api.delete_branch(name), &self.policy).await {
            Ok(()) => {}
            Err(e) if e.class().is_not_found() => {
                tracing::debug!(branch = name, "Branch already absent");
                return Ok(true);
            }
            Err(e) => return Err(e.into()),
        }

        let poll =
            try_call_until(|| self.get_branch(name), Option::is_none, max_tries, wait).await?;
        if poll.succeeded() {
            tracing::info!(branch = name, "Deleted branch");
        } else {
            tracing::warn!(branch = name, max_tries, "Could not confirm branch deletion");
        }
        Ok(poll.succeeded())
    }

    /// Create a branch at `commit_id` and wait until the remote returns it.
    ///
    /// If the branch already points at `commit_id` nothing is created.
    /// Returns the confirmed branch, or `None` if it was not observed in time.
    pub async fn create_branch_and_verify(
        &self,
        name: &str,
        commit_id: &str,
        max_tries: u32,
        wait: Duration,
    ) -> Result<Option<RefState>> {
        if let Some(existing) = self.get_branch(name).await?
            && existing.is_at(commit_id)
        {
            tracing::debug!(branch = name, commit = commit_id, "Branch already in place");
            return Ok(Some(existing));
        }

        call_with_retries(|| self.api.create_branch(name, commit_id), &self.policy).await?;

        let poll = try_call_until(
            || self.get_branch(name),
            |state| state.as_ref().is_some_and(|s| s.is_at(commit_id)),
            max_tries,
            wait,
        )
        .await?;

        match poll.into_success().flatten() {
            Some(state) => {
                tracing::info!(branch = name, commit = commit_id, "Created branch");
                Ok(Some(state))
            }
            None => {
                tracing::warn!(
                    branch = name,
                    commit = commit_id,
                    max_tries,
                    "Could not confirm branch creation"
                );
                Ok(None)
            }
        }
    }

    /// Create a branch at the current head of `source_branch`.
    ///
    /// The source may itself have just been created, so it is polled for
    /// first. If it never shows up nothing is created and `None` is returned.
    pub async fn create_branch_from_source_branch(
        &self,
        name: &str,
        source_branch: &str,
        max_tries: u32,
        wait: Duration,
    ) -> Result<Option<RefState>> {
        let poll = try_call_until(
            || self.get_branch(source_branch),
            Option::is_some,
            max_tries,
            wait,
        )
        .await?;

        let Some(source) = poll.into_success().flatten() else {
            tracing::warn!(
                branch = name,
                source = source_branch,
                "Source branch not visible, not creating branch"
            );
            return Ok(None);
        };

        self.create_branch_and_verify(name, &source.commit_id, max_tries, wait)
            .await
    }

    /// Create a protected branch at the commit of `source_tag`.
    ///
    /// A missing tag is a [`RefSyncError::Conflict`]. Protection is applied
    /// with a single call once the branch is confirmed.
    pub async fn create_protected_branch_from_tag(
        &self,
        name: &str,
        source_tag: &str,
        max_tries: u32,
        wait: Duration,
    ) -> Result<RefState> {
        let tag = self
            .get_tag(source_tag)
            .await?
            .ok_or_else(|| RefSyncError::conflict(format!("tag {source_tag} does not exist")))?;

        let branch = self
            .create_branch_and_verify(name, &tag.commit_id, max_tries, wait)
            .await?
            .ok_or_else(|| RefSyncError::Unverified {
                name: name.to_string(),
                commit_id: tag.commit_id.clone(),
            })?;

        self.api.protect_branch(name).await?;
        tracing::info!(branch = name, tag = source_tag, "Protected branch");

        Ok(branch)
    }
}
