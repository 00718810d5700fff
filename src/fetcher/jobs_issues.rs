//! Issue job processors, mirroring the pull request ones.

use std::collections::HashSet;

use tracing::{debug, error};

use crate::client::ClientError;
use crate::types::RepoId;

use super::board::{Job, JobKind, ScanState};
use super::fetcher::{Fetcher, SCAN_RETRY_DELAY};

impl Fetcher {
    /// Refreshes a batch of already-known issues by number. Deletions only
    /// happen when the request succeeded.
    pub(super) async fn process_update_issues(
        &self,
        repo: &RepoId,
        numbers: Vec<u64>,
    ) -> Result<(), ClientError> {
        let result = self.client().issues_by_numbers(repo, &numbers).await;

        let outcome = match result {
            Ok(issues) => {
                let fetched: HashSet<u64> = issues.iter().map(|issue| issue.number).collect();
                let deleted: Vec<u64> = numbers
                    .iter()
                    .copied()
                    .filter(|n| !fetched.contains(n))
                    .collect();

                debug!(
                    repo = %repo,
                    fetched = fetched.len(),
                    requested = numbers.len(),
                    "Fetched issues"
                );

                if !issues.is_empty() {
                    self.cache(repo).add_issues(issues);
                }

                if !deleted.is_empty() {
                    self.cache(repo).delete_issues(&deleted);
                }

                Ok(())
            }
            Err(err) => Err(err),
        };

        self.remove_job(repo, JobKind::UpdateIssues);
        self.dequeue_issues(repo, &numbers);

        outcome
    }

    /// Fetches the first page of recently updated issues; a recent-changes
    /// probe that never paginates.
    pub(super) async fn process_find_updated_issues(
        &self,
        repo: &RepoId,
    ) -> Result<(), ClientError> {
        let page = match self.client().list_issues(repo, None, "").await {
            Ok(page) => page,
            Err(err) => {
                self.remove_job(repo, JobKind::FindUpdatedIssues);
                return Err(err);
            }
        };

        let numbers: Vec<u64> = page.items.iter().map(|issue| issue.number).collect();
        debug!(repo = %repo, count = numbers.len(), "Fetched recently updated issues");

        self.cache(repo).add_issues(page.items);
        self.remove_job(repo, JobKind::FindUpdatedIssues);
        self.dequeue_issues(repo, &numbers);

        Ok(())
    }

    /// Walks the repository's issue listing page by page, newest first, with
    /// the same retry behavior as the PR scan.
    pub(super) async fn process_scan_issues(
        &self,
        repo: &RepoId,
        state: ScanState,
    ) -> Result<(), ClientError> {
        let result = self.client().list_issues(repo, None, &state.cursor).await;

        let mut page = match result {
            Ok(page) => page,
            Err(err) => {
                self.remove_job(repo, JobKind::ScanIssues);
                error!(
                    repo = %repo,
                    retry_in = ?SCAN_RETRY_DELAY,
                    error = %err,
                    "Failed to list issues, will retry"
                );

                self.spawn_retry(repo, Job::ScanIssues(state), SCAN_RETRY_DELAY);

                return Err(err);
            }
        };

        if state.max > 0 && state.fetched + page.items.len() >= state.max as usize {
            page.items.truncate(state.max as usize - state.fetched);
            page.next_cursor.clear();
        }

        let numbers: Vec<u64> = page.items.iter().map(|issue| issue.number).collect();
        debug!(
            repo = %repo,
            count = numbers.len(),
            new_cursor = %page.next_cursor,
            "Fetched issue scan page"
        );

        self.cache(repo).add_issues(page.items);
        self.dequeue_issues(repo, &numbers);
        self.remove_job(repo, JobKind::ScanIssues);

        if !page.next_cursor.is_empty() {
            self.enqueue_job(
                repo,
                Job::ScanIssues(ScanState {
                    max: state.max,
                    fetched: state.fetched + numbers.len(),
                    cursor: page.next_cursor,
                }),
            );
        }

        Ok(())
    }
}
