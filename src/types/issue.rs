//! Issue types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The state of an issue on the remote forge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub const ALL: [IssueState; 2] = [IssueState::Open, IssueState::Closed];

    /// Returns the lowercase name used as a metric label value.
    pub fn as_label(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
        }
    }
}

/// A cached issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// The issue number, unique within its repository. Always positive.
    pub number: u64,

    pub state: IssueState,

    /// Either a stable user identifier or a human login, depending on the
    /// author mode the remote client was constructed with.
    pub author: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Wall-clock time of the last successful refresh of this issue.
    pub fetched_at: DateTime<Utc>,

    pub labels: Vec<String>,
}

impl Issue {
    /// Returns true if the issue carries the given label (case-insensitive).
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }
}
