//! Configuration file support for refsync.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `REFSYNC_`, sections separated by
//!    `__`, e.g. `REFSYNC_GITLAB__TOKEN` or `REFSYNC_RETRY__MAX_RETRIES`)
//! 3. Local config file (`./refsync.toml`)
//! 4. XDG config file (`~/.config/refsync/config.toml`)
//! 5. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [gitlab]
//! host = "gitlab.com"        # or a self-hosted instance
//! token = "glpat-..."        # or REFSYNC_GITLAB__TOKEN
//! project = "group/app"
//!
//! [retry]
//! max_retries = 5
//! initial_wait_ms = 1000
//! max_wait_ms = 60000
//! multiplier = 2
//!
//! [verify]
//! max_tries = 30
//! wait_ms = 1000
//!
//! [paging]
//! per_page = 100
//!
//! [rate_limit]
//! requests_per_second = 5
//! disabled = false
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use refsync::poll::VerifyConfig;
use refsync::rate_limit::RateLimitConfig;
use refsync::retry::RetryConfig;
use serde::Deserialize;

/// Default page size for listings.
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gitlab: GitLabConfig,
    /// Retry policy for remote writes and page fetches.
    pub retry: RetryConfig,
    /// Polling budget for confirming ref changes.
    pub verify: VerifyConfig,
    pub paging: PagingConfig,
    pub rate_limit: RateLimitConfig,
}

/// GitLab connection settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitLabConfig {
    /// GitLab host (e.g., "gitlab.com" or "https://gitlab.example.com").
    pub host: String,
    /// Personal access token.
    pub token: Option<String>,
    /// Project id or full path (e.g., "group/subgroup/app").
    pub project: Option<String>,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            host: "gitlab.com".to_string(),
            token: None,
            project: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    pub per_page: u32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Invalid configuration is logged and replaced by the defaults.
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("refsync.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./refsync.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("REFSYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Path of the per-user config file.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "refsync").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
