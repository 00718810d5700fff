//! Remote forge API client.
//!
//! The fetch orchestrator talks to the remote API exclusively through the
//! narrow [`RemoteClient`] trait. The production implementation
//! ([`GithubClient`]) multiplexes item lookups into exact-arity GraphQL
//! queries; tests substitute a scripted mock.

mod error;
mod github;

pub use error::{ClientError, ClientErrorKind, LabelsError};
pub use github::{AuthorMode, GithubClient};

use async_trait::async_trait;

use crate::types::{
    Issue, IssueState, Milestone, MilestoneState, PrState, PullRequest, RepoId, RepoMetadata,
};

/// Maximum number of pull requests per multiplexed get-by-numbers query.
///
/// The PR query carries nested label and commit-status sub-selections, so it
/// gets a smaller arity than the flatter issue/milestone queries.
pub const MAX_PULL_REQUESTS_PER_QUERY: usize = 25;

/// Maximum number of issues per multiplexed get-by-numbers query.
pub const MAX_ISSUES_PER_QUERY: usize = 50;

/// Maximum number of milestones per multiplexed get-by-numbers query.
pub const MAX_MILESTONES_PER_QUERY: usize = 50;

/// One page of a cursor-paginated listing.
///
/// An empty `next_cursor` means there are no further pages.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: String,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Page {
            items: Vec::new(),
            next_cursor: String::new(),
        }
    }
}

/// The narrow interface the fetch orchestrator consumes.
///
/// Listing calls return items ordered by descending `updatedAt` with a page
/// size of 100; an empty cursor requests the first page. Get-by-numbers calls
/// accept at most the per-domain query arity and panic beyond it (the
/// dispatch loop guarantees the bound); numbers the remote cannot resolve are
/// simply absent from the result.
///
/// Every remote call updates the request count, accrued cost, and
/// remaining-budget estimate before returning, so that concurrent metrics
/// scrapes observe at most slightly stale values.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn repository_info(&self, repo: &RepoId) -> Result<RepoMetadata, ClientError>;

    /// Fetches the full label list (paginated internally). On failure the
    /// error carries the labels collected before the failing page.
    async fn repository_labels(&self, repo: &RepoId) -> Result<Vec<String>, LabelsError>;

    async fn list_pull_requests(
        &self,
        repo: &RepoId,
        states: Option<&[PrState]>,
        cursor: &str,
    ) -> Result<Page<PullRequest>, ClientError>;

    async fn list_issues(
        &self,
        repo: &RepoId,
        states: Option<&[IssueState]>,
        cursor: &str,
    ) -> Result<Page<Issue>, ClientError>;

    async fn list_milestones(
        &self,
        repo: &RepoId,
        states: Option<&[MilestoneState]>,
        cursor: &str,
    ) -> Result<Page<Milestone>, ClientError>;

    async fn pull_requests_by_numbers(
        &self,
        repo: &RepoId,
        numbers: &[u64],
    ) -> Result<Vec<PullRequest>, ClientError>;

    async fn issues_by_numbers(
        &self,
        repo: &RepoId,
        numbers: &[u64],
    ) -> Result<Vec<Issue>, ClientError>;

    async fn milestones_by_numbers(
        &self,
        repo: &RepoId,
        numbers: &[u64],
    ) -> Result<Vec<Milestone>, ClientError>;

    /// The remote's remaining cost budget, as of the most recent call.
    fn remaining_budget(&self) -> i64;

    /// Number of requests issued on behalf of the given repository.
    fn request_count(&self, repo: &RepoId) -> u64;

    /// Total query cost accrued on behalf of the given repository.
    fn cost_accrued(&self, repo: &RepoId) -> u64;
}
