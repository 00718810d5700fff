//! Milestone types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The state of a milestone on the remote forge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilestoneState {
    Open,
    Closed,
}

impl MilestoneState {
    pub const ALL: [MilestoneState; 2] = [MilestoneState::Open, MilestoneState::Closed];

    /// Returns the lowercase name used as a metric label value.
    pub fn as_label(&self) -> &'static str {
        match self {
            MilestoneState::Open => "open",
            MilestoneState::Closed => "closed",
        }
    }
}

/// A cached milestone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    /// The milestone number, unique within its repository. Always positive.
    pub number: u64,

    pub title: String,
    pub state: MilestoneState,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub due_on: Option<DateTime<Utc>>,

    /// Wall-clock time of the last successful refresh of this milestone.
    pub fetched_at: DateTime<Utc>,

    pub open_issues: u64,
    pub closed_issues: u64,
    pub open_pull_requests: u64,
    pub closed_pull_requests: u64,
}
