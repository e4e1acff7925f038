//! refsync CLI - verified branch operations against GitLab.

mod commands;
mod config;
mod shutdown;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

use crate::commands::shared::OutputFormat;

#[derive(Parser)]
#[command(name = "refsync")]
#[command(version)]
#[command(about = "Create and delete GitLab branches, and wait until the change is visible")]
#[command(
    long_about = "refsync talks to the GitLab API the way automation should: transient \
failures (408, 502, 503, 504) are retried with backoff, and every branch change is \
confirmed by polling until the remote actually returns it."
)]
#[command(after_long_help = r#"EXAMPLES
    Create a release branch from a commit and wait for it:
        $ refsync -p group/app branch create release-1.2 --from-commit 4f2a9c1

    Branch off another branch that was created moments ago:
        $ refsync -p group/app branch create hotfix --from-branch release-1.2

    Create a protected branch from a tag:
        $ refsync -p group/app branch protect-from-tag release-1.2 v1.2.0

    Show the 50 latest commits of a branch as JSON:
        $ refsync -p group/app -o json commits --ref main --limit 50

CONFIGURATION
    refsync reads configuration from:
      1. ~/.config/refsync/config.toml (or $XDG_CONFIG_HOME/refsync/config.toml)
      2. ./refsync.toml
      3. Environment variables (REFSYNC_ prefix, __ between section and key)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    REFSYNC_GITLAB__TOKEN       GitLab personal access token
    REFSYNC_GITLAB__HOST        GitLab host (default: gitlab.com)
    REFSYNC_GITLAB__PROJECT     Project id or path
    REFSYNC_RETRY__MAX_RETRIES  Retries for transient failures (default: 5)
    RUST_LOG                    Log filter (default: refsync=info,refsync_cli=info)
"#)]
struct Cli {
    #[command(flatten)]
    remote: RemoteOptions,

    #[command(subcommand)]
    command: Commands,
}

/// Connection and verification options shared by every remote command.
#[derive(Debug, Clone, Args)]
struct RemoteOptions {
    /// GitLab host (default from config or gitlab.com)
    #[arg(short = 'H', long, global = true)]
    host: Option<String>,

    /// Project id or path, e.g. "group/app" (default from config)
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Reads used to confirm a branch change (default from config or 30)
    #[arg(long, global = true)]
    verify_tries: Option<u32>,

    /// Milliseconds between confirmation reads (default from config or 1000)
    #[arg(long, global = true)]
    verify_wait_ms: Option<u64>,

    /// Page size for listings (default from config or 100)
    #[arg(long, global = true)]
    per_page: Option<u32>,

    /// Disable proactive rate limiting
    #[arg(short = 'R', long, global = true)]
    no_rate_limit: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Branch operations
    Branch {
        #[command(subcommand)]
        action: BranchAction,
    },
    /// Tag operations
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },
    /// List commits, fetching pages lazily
    Commits {
        /// Branch, tag or commit to list from (default branch if omitted)
        #[arg(short, long = "ref")]
        ref_name: Option<String>,

        /// Maximum number of commits to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(long = "dir")]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum BranchAction {
    /// Show a branch
    Get {
        name: String,
    },
    /// Create a branch and wait until it is visible
    ///
    /// Nothing is created if the branch already points at the requested commit.
    Create {
        name: String,

        /// Commit to create the branch at
        #[arg(long, required_unless_present = "from_branch", conflicts_with = "from_branch")]
        from_commit: Option<String>,

        /// Existing branch whose head the new branch starts from
        #[arg(long)]
        from_branch: Option<String>,
    },
    /// Delete a branch and wait until it is gone
    Delete {
        name: String,
    },
    /// Create a protected branch at the commit of a tag
    ProtectFromTag {
        name: String,
        tag: String,
    },
    /// List branches
    List {
        /// Stop after this many branches
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum TagAction {
    /// Show a tag
    Get {
        name: String,
    },
}

fn init_tracing() {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("refsync=info,refsync_cli=info"),
    };

    // Logs go to stderr so JSON output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(Term::stderr().is_term())
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Completions { shell } => {
            commands::meta::handle_completions(*shell)?;
            return Ok(());
        }
        Commands::Man { dir } => {
            commands::meta::handle_man(dir.clone())?;
            return Ok(());
        }
        _ => {}
    }

    shutdown::setup_shutdown_handler();

    let config = config::Config::load();
    let session = commands::shared::open_session(&config, &cli.remote)?;

    match cli.command {
        Commands::Branch { action } => {
            commands::branch::handle_branch(action, &session).await?;
        }
        Commands::Tag { action } => {
            commands::tag::handle_tag(action, &session).await?;
        }
        Commands::Commits { ref_name, limit } => {
            commands::commits::handle_commits(ref_name, limit, &session).await?;
        }
        Commands::Completions { .. } | Commands::Man { .. } => {}
    }

    Ok(())
}
