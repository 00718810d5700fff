//! Command line options and validation.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::types::RepoId;

/// Errors detected while validating the command line.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no --repo defined")]
    NoRepositories,

    #[error("--{domain}-refresh-interval must be smaller than --{domain}-resync-interval")]
    RefreshNotBeforeResync { domain: &'static str },
}

/// Command line options.
///
/// All intervals are given in seconds. A depth of -1 disables the limit on
/// the initial scan; a depth of 0 disables the domain entirely.
#[derive(Debug, Clone, Parser)]
#[command(name = "forge-exporter", version, about = "Prometheus exporter for code-forge repositories")]
pub struct Options {
    /// Repository (owner/name format) to include, can be given multiple
    /// times.
    #[arg(long = "repo", value_name = "OWNER/NAME")]
    pub repos: Vec<RepoId>,

    /// Use usernames instead of internal IDs for author labels (this will
    /// make metrics contain personally identifiable information).
    #[arg(long)]
    pub realnames: bool,

    /// Seconds between repository metadata refreshes.
    #[arg(long, default_value_t = 300)]
    pub repo_refresh_interval: u64,

    /// Seconds between refreshes of open pull requests.
    #[arg(long, default_value_t = 300)]
    pub pr_refresh_interval: u64,

    /// Seconds between full pull request re-syncs.
    #[arg(long, default_value_t = 43200)]
    pub pr_resync_interval: u64,

    /// Max number of pull requests to fetch per repository upon startup
    /// (-1 disables the limit, 0 disables PR fetching entirely).
    #[arg(long, default_value_t = -1)]
    pub pr_depth: i64,

    /// Seconds between refreshes of open issues.
    #[arg(long, default_value_t = 300)]
    pub issue_refresh_interval: u64,

    /// Seconds between full issue re-syncs.
    #[arg(long, default_value_t = 43200)]
    pub issue_resync_interval: u64,

    /// Max number of issues to fetch per repository upon startup
    /// (-1 disables the limit, 0 disables issue fetching entirely).
    #[arg(long, default_value_t = -1)]
    pub issue_depth: i64,

    /// Seconds between refreshes of open milestones.
    #[arg(long, default_value_t = 300)]
    pub milestone_refresh_interval: u64,

    /// Seconds between full milestone re-syncs.
    #[arg(long, default_value_t = 43200)]
    pub milestone_resync_interval: u64,

    /// Max number of milestones to fetch per repository upon startup
    /// (-1 disables the limit, 0 disables milestone fetching entirely).
    #[arg(long, default_value_t = -1)]
    pub milestone_depth: i64,

    /// Address and port to listen on.
    #[arg(long, default_value = "0.0.0.0:9612")]
    pub listen: SocketAddr,

    /// Enable more verbose logging.
    #[arg(long)]
    pub debug: bool,
}

impl Options {
    /// Checks the cross-flag invariants clap cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repos.is_empty() {
            return Err(ConfigError::NoRepositories);
        }

        if self.pr_refresh_interval >= self.pr_resync_interval {
            return Err(ConfigError::RefreshNotBeforeResync { domain: "pr" });
        }

        if self.issue_refresh_interval >= self.issue_resync_interval {
            return Err(ConfigError::RefreshNotBeforeResync { domain: "issue" });
        }

        if self.milestone_refresh_interval >= self.milestone_resync_interval {
            return Err(ConfigError::RefreshNotBeforeResync {
                domain: "milestone",
            });
        }

        Ok(())
    }

    /// The schedule the periodic drivers run on.
    pub fn schedule(&self) -> Schedule {
        Schedule {
            repo_refresh: Duration::from_secs(self.repo_refresh_interval),
            pull_requests: DomainSchedule {
                refresh: Duration::from_secs(self.pr_refresh_interval),
                resync: Duration::from_secs(self.pr_resync_interval),
                depth: self.pr_depth,
            },
            issues: DomainSchedule {
                refresh: Duration::from_secs(self.issue_refresh_interval),
                resync: Duration::from_secs(self.issue_resync_interval),
                depth: self.issue_depth,
            },
            milestones: DomainSchedule {
                refresh: Duration::from_secs(self.milestone_refresh_interval),
                resync: Duration::from_secs(self.milestone_resync_interval),
                depth: self.milestone_depth,
            },
        }
    }
}

/// Refresh/resync cadence and scan depth for one item domain.
#[derive(Debug, Clone, Copy)]
pub struct DomainSchedule {
    pub refresh: Duration,
    pub resync: Duration,
    pub depth: i64,
}

impl DomainSchedule {
    /// A depth of 0 disables the domain entirely for a repository.
    pub fn enabled(&self) -> bool {
        self.depth != 0
    }
}

/// The full periodic schedule derived from the command line.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub repo_refresh: Duration,
    pub pull_requests: DomainSchedule,
    pub issues: DomainSchedule,
    pub milestones: DomainSchedule,
}

impl Schedule {
    /// True if any domain produces labelled metrics, in which case the label
    /// list has to be fetched.
    pub fn has_labelled_metrics(&self) -> bool {
        self.pull_requests.enabled() || self.issues.enabled() || self.milestones.enabled()
    }
}
