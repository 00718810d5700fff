//! Pull request types and state representations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The state of a pull request on the remote forge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

impl PrState {
    /// All states, in the order the remote API declares them.
    pub const ALL: [PrState; 3] = [PrState::Open, PrState::Closed, PrState::Merged];

    /// Returns the lowercase name used as a metric label value.
    pub fn as_label(&self) -> &'static str {
        match self {
            PrState::Open => "open",
            PrState::Closed => "closed",
            PrState::Merged => "merged",
        }
    }
}

/// The state of a single commit status context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextState {
    Expected,
    Pending,
    Success,
    Error,
    Failure,
}

/// A named commit status context on a pull request's head commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildContext {
    pub name: String,
    pub state: ContextState,
}

/// The name of the merge-bot status context that is ignored when deciding
/// whether a pull request is mergeable.
const MERGE_BOT_CONTEXT: &str = "tide";

/// A cached pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// The PR number, unique within its repository. Always positive.
    pub number: u64,

    pub state: PrState,

    /// Either a stable user identifier or a human login, depending on the
    /// author mode the remote client was constructed with.
    pub author: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Wall-clock time of the last successful refresh of this PR.
    pub fetched_at: DateTime<Utc>,

    pub labels: Vec<String>,

    /// Status contexts on the head commit, in the order the remote returned
    /// them.
    pub contexts: Vec<BuildContext>,
}

impl PullRequest {
    /// Returns true if the PR carries the given label.
    ///
    /// Label comparison is case-insensitive; the cached spelling is kept for
    /// display purposes only.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(label))
    }

    /// Returns true if the PR is open and every status context (except the
    /// merge bot's own context) is successful.
    pub fn mergeable(&self) -> bool {
        if self.state != PrState::Open {
            return false;
        }

        self.contexts
            .iter()
            .filter(|ctx| ctx.name != MERGE_BOT_CONTEXT)
            .all(|ctx| ctx.state == ContextState::Success)
    }

    /// Returns the suffix of the first `size/<x>` label, lowercased, or an
    /// empty string if no size label is present.
    pub fn size_label(&self) -> String {
        self.labels
            .iter()
            .find_map(|l| {
                let lower = l.to_lowercase();
                lower.strip_prefix("size/").map(str::to_string)
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::pull_request;

    #[test]
    fn has_label_is_case_insensitive() {
        let pr = pull_request(1, PrState::Open).with_labels(&["LGTM", "Kind/Bug"]).build();

        assert!(pr.has_label("lgtm"));
        assert!(pr.has_label("LGTM"));
        assert!(pr.has_label("kind/bug"));
        assert!(!pr.has_label("approved"));
    }

    #[test]
    fn size_label_extracts_suffix() {
        let pr = pull_request(1, PrState::Open).with_labels(&["Size/XL", "lgtm"]).build();
        assert_eq!(pr.size_label(), "xl");

        let unlabeled = pull_request(2, PrState::Open).build();
        assert_eq!(unlabeled.size_label(), "");
    }

    #[test]
    fn mergeable_requires_open_state() {
        let pr = pull_request(1, PrState::Merged).build();
        assert!(!pr.mergeable());
    }

    #[test]
    fn mergeable_ignores_merge_bot_context() {
        let pr = pull_request(1, PrState::Open).with_contexts(&[
            ("ci/test", ContextState::Success),
            ("tide", ContextState::Pending),
        ]).build();
        assert!(pr.mergeable());
    }

    #[test]
    fn mergeable_fails_on_non_success_context() {
        let pr = pull_request(1, PrState::Open).with_contexts(&[
            ("ci/test", ContextState::Success),
            ("ci/lint", ContextState::Failure),
        ]).build();
        assert!(!pr.mergeable());
    }

    #[test]
    fn mergeable_with_no_contexts() {
        let pr = pull_request(1, PrState::Open).build();
        assert!(pr.mergeable());
    }
}
