//! Pull request job processors.

use std::collections::HashSet;

use tracing::{debug, error};

use crate::client::ClientError;
use crate::types::RepoId;

use super::board::{Job, JobKind, ScanState};
use super::fetcher::{Fetcher, SCAN_RETRY_DELAY};

impl Fetcher {
    /// Refreshes a batch of already-known PRs by number.
    ///
    /// Numbers the remote did not return are deleted from the cache, but
    /// only if the request as a whole succeeded; a transport failure must
    /// not be mistaken for remote deletion. The job is removed and all
    /// handled numbers are dequeued regardless of the outcome.
    pub(super) async fn process_update_pull_requests(
        &self,
        repo: &RepoId,
        numbers: Vec<u64>,
    ) -> Result<(), ClientError> {
        let result = self.client().pull_requests_by_numbers(repo, &numbers).await;

        let outcome = match result {
            Ok(prs) => {
                let fetched: HashSet<u64> = prs.iter().map(|pr| pr.number).collect();
                let deleted: Vec<u64> = numbers
                    .iter()
                    .copied()
                    .filter(|n| !fetched.contains(n))
                    .collect();

                debug!(
                    repo = %repo,
                    fetched = fetched.len(),
                    requested = numbers.len(),
                    "Fetched PRs"
                );

                if !prs.is_empty() {
                    self.cache(repo).add_pull_requests(prs);
                }

                if !deleted.is_empty() {
                    self.cache(repo).delete_pull_requests(&deleted);
                }

                Ok(())
            }
            Err(err) => Err(err),
        };

        self.remove_job(repo, JobKind::UpdatePullRequests);
        self.dequeue_pull_requests(repo, &numbers);

        outcome
    }

    /// Fetches the first page of recently updated PRs across all states.
    ///
    /// This is a recent-changes probe, not an exhaustive scan: the next-page
    /// cursor is deliberately ignored.
    pub(super) async fn process_find_updated_pull_requests(
        &self,
        repo: &RepoId,
    ) -> Result<(), ClientError> {
        let page = match self.client().list_pull_requests(repo, None, "").await {
            Ok(page) => page,
            Err(err) => {
                self.remove_job(repo, JobKind::FindUpdatedPullRequests);
                return Err(err);
            }
        };

        let numbers: Vec<u64> = page.items.iter().map(|pr| pr.number).collect();
        debug!(repo = %repo, count = numbers.len(), "Fetched recently updated PRs");

        self.cache(repo).add_pull_requests(page.items);
        self.remove_job(repo, JobKind::FindUpdatedPullRequests);
        self.dequeue_pull_requests(repo, &numbers);

        Ok(())
    }

    /// Walks the repository's PR listing page by page, newest first.
    ///
    /// The initial scan is vital for every other PR job, so a failed page is
    /// re-enqueued with an unchanged payload after a short delay instead of
    /// waiting for the next periodic refresh.
    pub(super) async fn process_scan_pull_requests(
        &self,
        repo: &RepoId,
        state: ScanState,
    ) -> Result<(), ClientError> {
        let result = self.client().list_pull_requests(repo, None, &state.cursor).await;

        let mut page = match result {
            Ok(page) => page,
            Err(err) => {
                self.remove_job(repo, JobKind::ScanPullRequests);
                error!(
                    repo = %repo,
                    retry_in = ?SCAN_RETRY_DELAY,
                    error = %err,
                    "Failed to list PRs, will retry"
                );

                self.spawn_retry(repo, Job::ScanPullRequests(state), SCAN_RETRY_DELAY);

                return Err(err);
            }
        };

        // enforce the configured scan depth; ">=" stops cleanly when the
        // page holds exactly the remaining amount
        if state.max > 0 && state.fetched + page.items.len() >= state.max as usize {
            page.items.truncate(state.max as usize - state.fetched);
            page.next_cursor.clear();
        }

        let numbers: Vec<u64> = page.items.iter().map(|pr| pr.number).collect();
        debug!(
            repo = %repo,
            count = numbers.len(),
            new_cursor = %page.next_cursor,
            "Fetched PR scan page"
        );

        self.cache(repo).add_pull_requests(page.items);
        self.dequeue_pull_requests(repo, &numbers);
        self.remove_job(repo, JobKind::ScanPullRequests);

        if !page.next_cursor.is_empty() {
            self.enqueue_job(
                repo,
                Job::ScanPullRequests(ScanState {
                    max: state.max,
                    fetched: state.fetched + numbers.len(),
                    cursor: page.next_cursor,
                }),
            );
        }

        Ok(())
    }
}
