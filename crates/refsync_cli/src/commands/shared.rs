use std::time::Duration;

use clap::ValueEnum;
use refsync::gitlab::GitLabClient;
use refsync::refs::RefSync;
use refsync::retry::{RetryCounter, RetryPolicy};
use serde::Serialize;
use tabled::Tabled;

use crate::RemoteOptions;
use crate::config::Config;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Print rows as a rounded table or a pretty JSON array.
pub(crate) fn print_rows<T: Tabled + Serialize>(
    rows: &[T],
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Table => {
            let mut table = tabled::Table::new(rows);
            table.with(tabled::settings::Style::rounded());
            println!("{}", table);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(rows)?);
        }
    }
    Ok(())
}

/// Polling budget after applying CLI overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VerifyBudget {
    pub(crate) max_tries: u32,
    pub(crate) wait: Duration,
}

/// Everything a command needs to talk to the remote.
pub(crate) struct Session {
    pub(crate) sync: RefSync<GitLabClient>,
    pub(crate) verify: VerifyBudget,
    pub(crate) per_page: u32,
    pub(crate) output: OutputFormat,
    retries: RetryCounter,
}

impl Session {
    pub(crate) fn client(&self) -> &GitLabClient {
        self.sync.api()
    }

    pub(crate) fn policy(&self) -> &RetryPolicy {
        self.sync.policy()
    }

    /// Log how many transient failures were retried, if any.
    pub(crate) fn report_retries(&self) {
        let count = self.retries.get();
        if count > 0 {
            tracing::info!(retries = count, "Retried transient remote failures");
        }
    }
}

pub(crate) fn verify_budget(config: &Config, opts: &RemoteOptions) -> VerifyBudget {
    VerifyBudget {
        max_tries: opts.verify_tries.unwrap_or(config.verify.max_tries),
        wait: opts
            .verify_wait_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.verify.wait()),
    }
}

/// Build a GitLab session from config and CLI overrides.
pub(crate) fn open_session(
    config: &Config,
    opts: &RemoteOptions,
) -> Result<Session, Box<dyn std::error::Error>> {
    let host = opts.host.clone().unwrap_or_else(|| config.gitlab.host.clone());
    let project = opts
        .project
        .clone()
        .or_else(|| config.gitlab.project.clone())
        .ok_or("No project configured. Pass --project or set REFSYNC_GITLAB__PROJECT.")?;
    let token = config.gitlab.token.clone().unwrap_or_default();
    if token.is_empty() {
        tracing::debug!("No GitLab token configured, sending unauthenticated requests");
    }

    let limiter = if opts.no_rate_limit {
        None
    } else {
        config.rate_limit.limiter()
    };

    let client = GitLabClient::new(&host, &token, &project, limiter)?;

    let retries = RetryCounter::new();
    let policy = config
        .retry
        .clone()
        .into_policy()
        .with_callback(retries.callback());

    Ok(Session {
        sync: RefSync::new(client, policy),
        verify: verify_budget(config, opts),
        per_page: opts.per_page.unwrap_or(config.paging.per_page),
        output: opts.output,
        retries,
    })
}
