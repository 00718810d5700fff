//! Periodic freshness drivers.
//!
//! Six tick-driven producers per repository enqueue work into the fetcher
//! based on freshness policy; they never touch the remote API themselves.
//! Refresh drivers run often and prioritize the items most likely to change
//! (open PRs, open issues, open milestones); resync drivers run rarely and
//! sweep the closed items to detect deletions and late state changes.
//!
//! Each driver owns one duration and runs until the cancellation token
//! fires.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::RepoCache;
use crate::fetcher::Fetcher;
use crate::types::{IssueState, MilestoneState, PrState};

/// Sleeps one interval; returns false when the token fired instead.
async fn tick(interval: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(interval) => true,
    }
}

/// Periodically re-enqueues the repository metadata job.
pub async fn refresh_repo_info(
    fetcher: Arc<Fetcher>,
    cache: Arc<RepoCache>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    while tick(interval, &shutdown).await {
        debug!(repo = %cache.repo(), "Refreshing repository metadata");
        fetcher.enqueue_repo_info_update(cache.repo());
    }
}

/// Periodically refreshes all open pull requests.
///
/// Open PRs are enqueued as priority items because changes to their build
/// contexts do not bump the remote's `updatedAt` timestamp; the
/// recent-changes probe alone would miss them.
pub async fn refresh_pull_requests(
    fetcher: Arc<Fetcher>,
    cache: Arc<RepoCache>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    while tick(interval, &shutdown).await {
        debug!(repo = %cache.repo(), "Refreshing open pull requests");

        let numbers: Vec<u64> = cache
            .get_pull_requests(&[PrState::Open])
            .iter()
            .map(|pr| pr.number)
            .collect();

        fetcher.enqueue_priority_pull_requests(cache.repo(), &numbers);
        fetcher.enqueue_updated_pull_requests(cache.repo());
    }
}

/// Rarely re-crawls all closed and merged pull requests to detect deletions
/// and changes after a PR left the open state.
pub async fn resync_pull_requests(
    fetcher: Arc<Fetcher>,
    cache: Arc<RepoCache>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    while tick(interval, &shutdown).await {
        debug!(repo = %cache.repo(), "Synchronizing repository pull requests");

        let numbers: Vec<u64> = cache
            .get_pull_requests(&[PrState::Closed, PrState::Merged])
            .iter()
            .map(|pr| pr.number)
            .collect();

        fetcher.enqueue_regular_pull_requests(cache.repo(), &numbers);
        fetcher.enqueue_label_update(cache.repo());
    }
}

/// Periodically refreshes all open issues.
pub async fn refresh_issues(
    fetcher: Arc<Fetcher>,
    cache: Arc<RepoCache>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    while tick(interval, &shutdown).await {
        debug!(repo = %cache.repo(), "Refreshing open issues");

        let numbers: Vec<u64> = cache
            .get_issues(&[IssueState::Open])
            .iter()
            .map(|issue| issue.number)
            .collect();

        fetcher.enqueue_priority_issues(cache.repo(), &numbers);
        fetcher.enqueue_updated_issues(cache.repo());
    }
}

/// Rarely re-crawls all closed issues to detect status changes.
pub async fn resync_issues(
    fetcher: Arc<Fetcher>,
    cache: Arc<RepoCache>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    while tick(interval, &shutdown).await {
        debug!(repo = %cache.repo(), "Synchronizing repository issues");

        let numbers: Vec<u64> = cache
            .get_issues(&[IssueState::Closed])
            .iter()
            .map(|issue| issue.number)
            .collect();

        fetcher.enqueue_regular_issues(cache.repo(), &numbers);
        fetcher.enqueue_label_update(cache.repo());
    }
}

/// Periodically refreshes all open milestones.
pub async fn refresh_milestones(
    fetcher: Arc<Fetcher>,
    cache: Arc<RepoCache>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    while tick(interval, &shutdown).await {
        debug!(repo = %cache.repo(), "Refreshing open milestones");

        let numbers: Vec<u64> = cache
            .get_milestones(&[MilestoneState::Open])
            .iter()
            .map(|m| m.number)
            .collect();

        fetcher.enqueue_priority_milestones(cache.repo(), &numbers);
        fetcher.enqueue_updated_milestones(cache.repo());
    }
}

/// Rarely re-crawls all closed milestones to detect status changes.
pub async fn resync_milestones(
    fetcher: Arc<Fetcher>,
    cache: Arc<RepoCache>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    while tick(interval, &shutdown).await {
        debug!(repo = %cache.repo(), "Synchronizing repository milestones");

        let numbers: Vec<u64> = cache
            .get_milestones(&[MilestoneState::Closed])
            .iter()
            .map(|m| m.number)
            .collect();

        fetcher.enqueue_regular_milestones(cache.repo(), &numbers);
        fetcher.enqueue_label_update(cache.repo());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeMap;

    use crate::test_utils::{MockRemoteClient, issue, pull_request};
    use crate::types::RepoId;

    fn setup() -> (Arc<Fetcher>, Arc<RepoCache>, RepoId) {
        let repo = RepoId::new("owner", "repo");
        let cache = Arc::new(RepoCache::new(repo.clone()));

        let mut repos = BTreeMap::new();
        repos.insert(repo.clone(), Arc::clone(&cache));

        let client = Arc::new(MockRemoteClient::new());
        let fetcher = Arc::new(Fetcher::new(client, repos));

        (fetcher, cache, repo)
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_enqueues_open_prs_as_priority() {
        let (fetcher, cache, repo) = setup();

        cache.add_pull_requests(vec![
            pull_request(1, PrState::Open).build(),
            pull_request(2, PrState::Closed).build(),
            pull_request(3, PrState::Open).build(),
        ]);

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(refresh_pull_requests(
            Arc::clone(&fetcher),
            Arc::clone(&cache),
            Duration::from_secs(60),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(61)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let sizes = fetcher.pull_request_queue_sizes(&repo);
        assert_eq!(sizes.priority, 2);
        assert_eq!(sizes.regular, 0);

        // the recent-changes probe rides along with every refresh
        let kinds = fetcher.pending_jobs(&repo);
        assert_eq!(kinds, vec![crate::fetcher::JobKind::FindUpdatedPullRequests]);
    }

    #[tokio::test(start_paused = true)]
    async fn resync_enqueues_closed_issues_as_regular() {
        let (fetcher, cache, repo) = setup();

        cache.add_issues(vec![
            issue(1, IssueState::Open).build(),
            issue(2, IssueState::Closed).build(),
        ]);

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(resync_issues(
            Arc::clone(&fetcher),
            Arc::clone(&cache),
            Duration::from_secs(3600),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(3601)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let sizes = fetcher.issue_queue_sizes(&repo);
        assert_eq!(sizes.priority, 0);
        assert_eq!(sizes.regular, 1);

        // resyncs also refresh the repository's label list
        let kinds = fetcher.pending_jobs(&repo);
        assert_eq!(kinds, vec![crate::fetcher::JobKind::UpdateLabels]);
    }

    #[tokio::test(start_paused = true)]
    async fn drivers_stop_on_cancellation() {
        let (fetcher, cache, _repo) = setup();

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(refresh_repo_info(
            fetcher,
            cache,
            Duration::from_secs(60),
            shutdown.clone(),
        ));

        shutdown.cancel();
        handle.await.unwrap();
    }
}
