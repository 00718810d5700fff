//! The fetcher and its dispatch loop.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::cache::RepoCache;
use crate::client::{
    ClientError, MAX_ISSUES_PER_QUERY, MAX_MILESTONES_PER_QUERY, MAX_PULL_REQUESTS_PER_QUERY,
    RemoteClient,
};
use crate::types::RepoId;

use super::board::{Job, JobBoard, JobKind};
use super::queue::PrioritizedSet;

/// Minimum batch size during normal operation.
const MIN_BATCH_SIZE: usize = 10;

/// How long the dispatch loop sleeps when no work is available.
const IDLE_SLEEP: Duration = Duration::from_secs(1);

/// Cumulative idle time after which mini-batches of a single number are
/// accepted.
const FORCE_FLUSH_AFTER: Duration = Duration::from_secs(60);

/// Delay before a failed scan job is re-enqueued.
pub(super) const SCAN_RETRY_DELAY: Duration = Duration::from_secs(30);

/// The sizes of the two sides of a prioritized queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSizes {
    pub priority: usize,
    pub regular: usize,
}

/// Mutable fetcher state: all job boards and identifier queues, guarded by
/// one process-wide lock. Lock hold times are short and never span remote
/// I/O.
#[derive(Debug, Default)]
struct FetcherState {
    boards: BTreeMap<RepoId, JobBoard>,
    pull_request_queues: BTreeMap<RepoId, PrioritizedSet>,
    issue_queues: BTreeMap<RepoId, PrioritizedSet>,
    milestone_queues: BTreeMap<RepoId, PrioritizedSet>,
}

/// The fetch orchestrator.
///
/// The fetcher does not own the repository caches; the coordinator owns both
/// and passes shared references in at construction, so the metrics snapshot
/// path is independent of the fetcher's lifetime.
pub struct Fetcher {
    client: Arc<dyn RemoteClient>,
    repos: BTreeMap<RepoId, Arc<RepoCache>>,
    state: Arc<RwLock<FetcherState>>,
}

impl Fetcher {
    pub fn new(client: Arc<dyn RemoteClient>, repos: BTreeMap<RepoId, Arc<RepoCache>>) -> Self {
        let mut state = FetcherState::default();
        for repo in repos.keys() {
            state.boards.insert(repo.clone(), JobBoard::new());
            state
                .pull_request_queues
                .insert(repo.clone(), PrioritizedSet::new());
            state.issue_queues.insert(repo.clone(), PrioritizedSet::new());
            state
                .milestone_queues
                .insert(repo.clone(), PrioritizedSet::new());
        }

        Fetcher {
            client,
            repos,
            state: Arc::new(RwLock::new(state)),
        }
    }

    pub(super) fn client(&self) -> &dyn RemoteClient {
        self.client.as_ref()
    }

    /// Returns the cache of a tracked repository.
    ///
    /// # Panics
    ///
    /// Panics for an untracked repository: jobs and queues only ever carry
    /// repositories registered at construction, so this is a programming
    /// error.
    pub(super) fn cache(&self, repo: &RepoId) -> &Arc<RepoCache> {
        self.repos
            .get(repo)
            .unwrap_or_else(|| panic!("no cache defined for repository {repo}"))
    }

    // ─── Job enqueueing ───

    pub fn enqueue_label_update(&self, repo: &RepoId) {
        self.enqueue_job(repo, Job::UpdateLabels);
    }

    pub fn enqueue_repo_info_update(&self, repo: &RepoId) {
        self.enqueue_job(repo, Job::UpdateRepoInfo);
    }

    pub fn enqueue_pull_request_scan(&self, repo: &RepoId, max: i64) {
        self.enqueue_job(repo, Job::ScanPullRequests(super::ScanState::new(max)));
    }

    pub fn enqueue_issue_scan(&self, repo: &RepoId, max: i64) {
        self.enqueue_job(repo, Job::ScanIssues(super::ScanState::new(max)));
    }

    pub fn enqueue_milestone_scan(&self, repo: &RepoId, max: i64) {
        self.enqueue_job(repo, Job::ScanMilestones(super::ScanState::new(max)));
    }

    pub fn enqueue_updated_pull_requests(&self, repo: &RepoId) {
        self.enqueue_job(repo, Job::FindUpdatedPullRequests);
    }

    pub fn enqueue_updated_issues(&self, repo: &RepoId) {
        self.enqueue_job(repo, Job::FindUpdatedIssues);
    }

    pub fn enqueue_updated_milestones(&self, repo: &RepoId) {
        self.enqueue_job(repo, Job::FindUpdatedMilestones);
    }

    pub(super) fn enqueue_job(&self, repo: &RepoId, job: Job) {
        let mut state = self.state.write().unwrap();
        let board = state
            .boards
            .get_mut(repo)
            .unwrap_or_else(|| panic!("no job board defined for repository {repo}"));

        debug!(repo = %repo, job = %job.kind(), "Enqueueing job");
        board.insert(job);
    }

    pub(super) fn remove_job(&self, repo: &RepoId, kind: JobKind) {
        let mut state = self.state.write().unwrap();
        if let Some(board) = state.boards.get_mut(repo) {
            debug!(repo = %repo, job = %kind, "Removing job");
            board.remove(kind);
        }
    }

    /// Re-enqueues a job after a delay, from a detached task. Used by the
    /// scan processors to retry a failed page without blocking the dispatch
    /// loop.
    pub(super) fn spawn_retry(&self, repo: &RepoId, job: Job, delay: Duration) {
        let state = Arc::clone(&self.state);
        let repo = repo.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut state = state.write().unwrap();
            if let Some(board) = state.boards.get_mut(&repo) {
                debug!(repo = %repo, job = %job.kind(), "Re-enqueueing job");
                board.insert(job);
            }
        });
    }

    // ─── Identifier enqueueing ───

    pub fn enqueue_priority_pull_requests(&self, repo: &RepoId, numbers: &[u64]) {
        self.enqueue_numbers(repo, numbers, Domain::PullRequests, true);
    }

    pub fn enqueue_regular_pull_requests(&self, repo: &RepoId, numbers: &[u64]) {
        self.enqueue_numbers(repo, numbers, Domain::PullRequests, false);
    }

    pub fn enqueue_priority_issues(&self, repo: &RepoId, numbers: &[u64]) {
        self.enqueue_numbers(repo, numbers, Domain::Issues, true);
    }

    pub fn enqueue_regular_issues(&self, repo: &RepoId, numbers: &[u64]) {
        self.enqueue_numbers(repo, numbers, Domain::Issues, false);
    }

    pub fn enqueue_priority_milestones(&self, repo: &RepoId, numbers: &[u64]) {
        self.enqueue_numbers(repo, numbers, Domain::Milestones, true);
    }

    pub fn enqueue_regular_milestones(&self, repo: &RepoId, numbers: &[u64]) {
        self.enqueue_numbers(repo, numbers, Domain::Milestones, false);
    }

    fn enqueue_numbers(&self, repo: &RepoId, numbers: &[u64], domain: Domain, priority: bool) {
        let mut state = self.state.write().unwrap();
        let queue = domain
            .queues_mut(&mut state)
            .get_mut(repo)
            .unwrap_or_else(|| panic!("no queue defined for repository {repo}"));

        debug!(
            repo = %repo,
            count = numbers.len(),
            priority = priority,
            "Enqueueing items for updating"
        );

        if priority {
            queue.enqueue_priority(numbers);
        } else {
            queue.enqueue_regular(numbers);
        }
    }

    pub(super) fn dequeue_pull_requests(&self, repo: &RepoId, numbers: &[u64]) {
        self.dequeue(repo, numbers, Domain::PullRequests);
    }

    pub(super) fn dequeue_issues(&self, repo: &RepoId, numbers: &[u64]) {
        self.dequeue(repo, numbers, Domain::Issues);
    }

    pub(super) fn dequeue_milestones(&self, repo: &RepoId, numbers: &[u64]) {
        self.dequeue(repo, numbers, Domain::Milestones);
    }

    fn dequeue(&self, repo: &RepoId, numbers: &[u64], domain: Domain) {
        let mut state = self.state.write().unwrap();
        if let Some(queue) = domain.queues_mut(&mut state).get_mut(repo) {
            queue.dequeue(numbers);
        }
    }

    /// The kinds currently pending on a repository's job board, scans first.
    pub fn pending_jobs(&self, repo: &RepoId) -> Vec<JobKind> {
        let state = self.state.read().unwrap();
        let Some(board) = state.boards.get(repo) else {
            return Vec::new();
        };

        let mut kinds: Vec<JobKind> = board.kinds().collect();
        kinds.sort_by_key(|kind| !kind.is_scan());
        kinds
    }

    // ─── Queue observability ───

    pub fn pull_request_queue_sizes(&self, repo: &RepoId) -> QueueSizes {
        self.queue_sizes(repo, Domain::PullRequests)
    }

    pub fn issue_queue_sizes(&self, repo: &RepoId) -> QueueSizes {
        self.queue_sizes(repo, Domain::Issues)
    }

    pub fn milestone_queue_sizes(&self, repo: &RepoId) -> QueueSizes {
        self.queue_sizes(repo, Domain::Milestones)
    }

    fn queue_sizes(&self, repo: &RepoId, domain: Domain) -> QueueSizes {
        let state = self.state.read().unwrap();
        match domain.queues(&state).get(repo) {
            Some(queue) => QueueSizes {
                priority: queue.priority_len(),
                regular: queue.regular_len(),
            },
            None => QueueSizes {
                priority: 0,
                regular: 0,
            },
        }
    }

    // ─── Dispatch loop ───

    /// Runs the dispatch loop until the token is cancelled.
    ///
    /// All repositories are serviced serially; at most one remote request is
    /// in flight at any time.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!("Fetcher dispatch loop started");

        let mut last_force_flush = Instant::now();

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            // the job board has priority over batching up queued numbers
            if let Some((repo, job)) = self.next_job() {
                let kind = job.kind();
                if let Err(err) = self.process_job(&repo, job).await {
                    error!(
                        repo = %repo,
                        job = %kind,
                        cost = self.client.cost_accrued(&repo),
                        error = %err,
                        "Failed to process job"
                    );
                }
                continue;
            }

            // no job pending: try to batch up queued numbers into a new job
            if self.enqueue_update_batches(MIN_BATCH_SIZE) {
                continue;
            }

            // no repo has enough items for a good batch; wait a bit instead
            // of burning CPU, but not forever, otherwise repositories with
            // very few items would never get updated
            if last_force_flush.elapsed() < FORCE_FLUSH_AFTER {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(IDLE_SLEEP) => {}
                }
                continue;
            }

            // we waited long enough, accept 1-element batches once, then
            // start sleeping again
            let flushed = self.enqueue_update_batches(1);
            last_force_flush = Instant::now();

            if !flushed {
                debug!("All queues emptied, force flush completed");
            }
        }

        info!("Fetcher dispatch loop stopped");
    }

    /// Picks the next pending job, preferring scan jobs within each board.
    /// Repositories are visited in their stable map order.
    pub(super) fn next_job(&self) -> Option<(RepoId, Job)> {
        let state = self.state.read().unwrap();

        for (repo, board) in &state.boards {
            if let Some(job) = board.next_job() {
                return Some((repo.clone(), job.clone()));
            }
        }

        None
    }

    /// Converts queued numbers into update jobs, PRs first, then issues,
    /// then milestones. Returns true if some repository had enough numbers.
    pub(super) fn enqueue_update_batches(&self, min_batch_size: usize) -> bool {
        if let Some((repo, numbers)) =
            self.get_batch(Domain::PullRequests, min_batch_size, MAX_PULL_REQUESTS_PER_QUERY)
        {
            self.enqueue_job(&repo, Job::UpdatePullRequests(numbers));
            return true;
        }

        if let Some((repo, numbers)) =
            self.get_batch(Domain::Issues, min_batch_size, MAX_ISSUES_PER_QUERY)
        {
            self.enqueue_job(&repo, Job::UpdateIssues(numbers));
            return true;
        }

        if let Some((repo, numbers)) =
            self.get_batch(Domain::Milestones, min_batch_size, MAX_MILESTONES_PER_QUERY)
        {
            self.enqueue_job(&repo, Job::UpdateMilestones(numbers));
            return true;
        }

        false
    }

    fn get_batch(
        &self,
        domain: Domain,
        min_batch_size: usize,
        max_batch_size: usize,
    ) -> Option<(RepoId, Vec<u64>)> {
        let state = self.state.read().unwrap();

        for (repo, queue) in domain.queues(&state) {
            if let Some(batch) = queue.get_batch(min_batch_size, max_batch_size) {
                return Some((repo.clone(), batch));
            }
        }

        None
    }

    /// Processes one job to completion.
    pub(super) async fn process_job(&self, repo: &RepoId, job: Job) -> Result<(), ClientError> {
        debug!(repo = %repo, job = %job.kind(), "Processing job");

        match job {
            Job::UpdateLabels => self.process_update_labels(repo).await,
            Job::UpdateRepoInfo => self.process_update_repo_info(repo).await,
            Job::ScanPullRequests(state) => self.process_scan_pull_requests(repo, state).await,
            Job::UpdatePullRequests(numbers) => {
                self.process_update_pull_requests(repo, numbers).await
            }
            Job::FindUpdatedPullRequests => {
                self.process_find_updated_pull_requests(repo).await
            }
            Job::ScanIssues(state) => self.process_scan_issues(repo, state).await,
            Job::UpdateIssues(numbers) => self.process_update_issues(repo, numbers).await,
            Job::FindUpdatedIssues => self.process_find_updated_issues(repo).await,
            Job::ScanMilestones(state) => self.process_scan_milestones(repo, state).await,
            Job::UpdateMilestones(numbers) => {
                self.process_update_milestones(repo, numbers).await
            }
            Job::FindUpdatedMilestones => self.process_find_updated_milestones(repo).await,
        }
    }
}

/// The three batched item domains.
#[derive(Debug, Clone, Copy)]
enum Domain {
    PullRequests,
    Issues,
    Milestones,
}

impl Domain {
    fn queues<'a>(&self, state: &'a FetcherState) -> &'a BTreeMap<RepoId, PrioritizedSet> {
        match self {
            Domain::PullRequests => &state.pull_request_queues,
            Domain::Issues => &state.issue_queues,
            Domain::Milestones => &state.milestone_queues,
        }
    }

    fn queues_mut<'a>(
        &self,
        state: &'a mut FetcherState,
    ) -> &'a mut BTreeMap<RepoId, PrioritizedSet> {
        match self {
            Domain::PullRequests => &mut state.pull_request_queues,
            Domain::Issues => &mut state.issue_queues,
            Domain::Milestones => &mut state.milestone_queues,
        }
    }
}
