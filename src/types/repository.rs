//! Repository-level metadata.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Repository-level metadata, refreshed as a whole by the repo-info job.
///
/// A repository becomes eligible for metrics emission once `fetched_at` has
/// been set at least once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoMetadata {
    /// Repository size in bytes. The remote reports kilobytes; the cache
    /// stores bytes.
    pub disk_usage_bytes: u64,

    pub forks: u64,
    pub stargazers: u64,
    pub watchers: u64,

    pub is_private: bool,
    pub is_archived: bool,
    pub is_disabled: bool,
    pub is_fork: bool,
    pub is_locked: bool,
    pub is_mirror: bool,
    pub is_template: bool,

    /// Language name to byte size, as reported by the remote.
    pub languages: HashMap<String, u64>,

    /// Wall-clock time of the last successful metadata refresh; `None` until
    /// the first one completes.
    pub fetched_at: Option<DateTime<Utc>>,
}
