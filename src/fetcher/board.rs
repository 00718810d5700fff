//! Per-repository job board.
//!
//! Each repository has a board mapping job kinds to at most one pending job
//! of that kind; enqueueing a kind that is already pending replaces its
//! payload. Jobs are a tagged enum so the dispatcher matches exhaustively -
//! an unknown kind cannot exist at runtime.
//!
//! Scan jobs are preferred over every other kind when picking work, because
//! the initial scans establish the item population that all subsequent
//! update jobs operate on.
//!
//! Note on scan pagination: a successful scan page re-enqueues its own kind
//! with the advanced cursor. The board would let any other producer overwrite
//! that payload, but the only writers of scan kinds are startup, the scan
//! processor itself, and its retry task, so the pagination state is never
//! clobbered in practice.

use std::collections::HashMap;

/// The identity of a job kind; at most one job per kind is pending per repo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    UpdateLabels,
    UpdateRepoInfo,
    ScanPullRequests,
    UpdatePullRequests,
    FindUpdatedPullRequests,
    ScanIssues,
    UpdateIssues,
    FindUpdatedIssues,
    ScanMilestones,
    UpdateMilestones,
    FindUpdatedMilestones,
}

impl JobKind {
    /// The kind's wire-style name, used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::UpdateLabels => "update-labels",
            JobKind::UpdateRepoInfo => "update-repo-info",
            JobKind::ScanPullRequests => "scan-prs",
            JobKind::UpdatePullRequests => "update-prs",
            JobKind::FindUpdatedPullRequests => "find-updated-prs",
            JobKind::ScanIssues => "scan-issues",
            JobKind::UpdateIssues => "update-issues",
            JobKind::FindUpdatedIssues => "find-updated-issues",
            JobKind::ScanMilestones => "scan-milestones",
            JobKind::UpdateMilestones => "update-milestones",
            JobKind::FindUpdatedMilestones => "find-updated-milestones",
        }
    }

    /// Scan kinds are dispatched before anything else on the same board.
    pub fn is_scan(&self) -> bool {
        matches!(
            self,
            JobKind::ScanPullRequests | JobKind::ScanIssues | JobKind::ScanMilestones
        )
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pagination state carried by a scan job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanState {
    /// Upper bound on items to fetch; 0 or negative means unlimited here
    /// (the caller never enqueues a scan for a disabled domain).
    pub max: i64,

    /// Items fetched by previous pages of this scan.
    pub fetched: usize,

    /// Pagination cursor; empty means first page.
    pub cursor: String,
}

impl ScanState {
    /// The state of a fresh scan bounded by `max` items.
    pub fn new(max: i64) -> Self {
        ScanState {
            max,
            fetched: 0,
            cursor: String::new(),
        }
    }
}

/// A pending unit of work for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    UpdateLabels,
    UpdateRepoInfo,
    ScanPullRequests(ScanState),
    UpdatePullRequests(Vec<u64>),
    FindUpdatedPullRequests,
    ScanIssues(ScanState),
    UpdateIssues(Vec<u64>),
    FindUpdatedIssues,
    ScanMilestones(ScanState),
    UpdateMilestones(Vec<u64>),
    FindUpdatedMilestones,
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Job::UpdateLabels => JobKind::UpdateLabels,
            Job::UpdateRepoInfo => JobKind::UpdateRepoInfo,
            Job::ScanPullRequests(_) => JobKind::ScanPullRequests,
            Job::UpdatePullRequests(_) => JobKind::UpdatePullRequests,
            Job::FindUpdatedPullRequests => JobKind::FindUpdatedPullRequests,
            Job::ScanIssues(_) => JobKind::ScanIssues,
            Job::UpdateIssues(_) => JobKind::UpdateIssues,
            Job::FindUpdatedIssues => JobKind::FindUpdatedIssues,
            Job::ScanMilestones(_) => JobKind::ScanMilestones,
            Job::UpdateMilestones(_) => JobKind::UpdateMilestones,
            Job::FindUpdatedMilestones => JobKind::FindUpdatedMilestones,
        }
    }
}

/// The pending jobs of a single repository, at most one per kind.
#[derive(Debug, Default, Clone)]
pub struct JobBoard {
    jobs: HashMap<JobKind, Job>,
}

impl JobBoard {
    pub fn new() -> Self {
        JobBoard::default()
    }

    /// Inserts a job, replacing any pending job of the same kind.
    pub fn insert(&mut self, job: Job) {
        self.jobs.insert(job.kind(), job);
    }

    /// Removes and returns the pending job of the given kind, if any.
    pub fn remove(&mut self, kind: JobKind) -> Option<Job> {
        self.jobs.remove(&kind)
    }

    pub fn get(&self, kind: JobKind) -> Option<&Job> {
        self.jobs.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// The kinds currently pending, in unspecified order.
    pub fn kinds(&self) -> impl Iterator<Item = JobKind> + '_ {
        self.jobs.keys().copied()
    }

    /// Picks the job to dispatch next: any scan job first, then any other.
    pub fn next_job(&self) -> Option<&Job> {
        for kind in [
            JobKind::ScanIssues,
            JobKind::ScanPullRequests,
            JobKind::ScanMilestones,
        ] {
            if let Some(job) = self.jobs.get(&kind) {
                return Some(job);
            }
        }

        self.jobs.values().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn insert_replaces_same_kind() {
        let mut board = JobBoard::new();
        board.insert(Job::UpdatePullRequests(vec![1, 2]));
        board.insert(Job::UpdatePullRequests(vec![3]));

        assert_eq!(board.len(), 1);
        assert_eq!(
            board.get(JobKind::UpdatePullRequests),
            Some(&Job::UpdatePullRequests(vec![3]))
        );
    }

    #[test]
    fn scan_jobs_are_picked_first() {
        let mut board = JobBoard::new();
        board.insert(Job::UpdateLabels);
        board.insert(Job::FindUpdatedIssues);
        board.insert(Job::ScanPullRequests(ScanState::new(-1)));

        let next = board.next_job().unwrap();
        assert!(next.kind().is_scan());
    }

    #[test]
    fn remove_returns_payload() {
        let mut board = JobBoard::new();
        board.insert(Job::ScanIssues(ScanState {
            max: 100,
            fetched: 50,
            cursor: "abc".to_string(),
        }));

        let job = board.remove(JobKind::ScanIssues).unwrap();
        match job {
            Job::ScanIssues(state) => {
                assert_eq!(state.fetched, 50);
                assert_eq!(state.cursor, "abc");
            }
            other => panic!("unexpected job: {other:?}"),
        }
        assert!(board.is_empty());
    }

    fn arb_job() -> impl Strategy<Value = Job> {
        prop_oneof![
            Just(Job::UpdateLabels),
            Just(Job::UpdateRepoInfo),
            Just(Job::FindUpdatedPullRequests),
            Just(Job::FindUpdatedIssues),
            Just(Job::FindUpdatedMilestones),
            proptest::collection::vec(1u64..100, 0..10).prop_map(Job::UpdatePullRequests),
            proptest::collection::vec(1u64..100, 0..10).prop_map(Job::UpdateIssues),
            proptest::collection::vec(1u64..100, 0..10).prop_map(Job::UpdateMilestones),
            (0i64..200).prop_map(|max| Job::ScanPullRequests(ScanState::new(max))),
            (0i64..200).prop_map(|max| Job::ScanIssues(ScanState::new(max))),
            (0i64..200).prop_map(|max| Job::ScanMilestones(ScanState::new(max))),
        ]
    }

    proptest! {
        /// However many jobs are enqueued, each kind is pending at most once.
        #[test]
        fn prop_at_most_one_job_per_kind(jobs in proptest::collection::vec(arb_job(), 0..50)) {
            let mut board = JobBoard::new();
            for job in jobs {
                board.insert(job);
            }

            // the map is keyed by kind, so this follows from the length bound
            prop_assert!(board.len() <= 11);

            let mut seen = std::collections::HashSet::new();
            while let Some(kind) = board.next_job().map(Job::kind) {
                board.remove(kind);
                prop_assert!(seen.insert(kind), "kind {kind} dispatched twice");
            }
        }
    }
}
