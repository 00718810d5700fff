//! Domain types for the mirrored repository state.

mod ids;
mod issue;
mod milestone;
mod pr;
mod repository;

pub use ids::{ParseRepoIdError, RepoId};
pub use issue::{Issue, IssueState};
pub use milestone::{Milestone, MilestoneState};
pub use pr::{BuildContext, ContextState, PrState, PullRequest};
pub use repository::RepoMetadata;
