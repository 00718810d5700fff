//! Per-repository in-memory cache.
//!
//! Each tracked repository owns one `RepoCache`. All entity maps, the label
//! list, and the repository metadata sit behind a single read-write lock.
//! Writers are exclusive, concurrent readers are permitted, and the lock is
//! never held across remote I/O (callers copy what they need out).
//!
//! Entities are created on first successful fetch and overwritten on
//! subsequent fetches; they are only removed when an update-by-numbers job
//! succeeds without returning a requested number. Labels are replaced
//! wholesale on each successful labels fetch.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::types::{
    Issue, IssueState, Milestone, MilestoneState, PrState, PullRequest, RepoId, RepoMetadata,
};

/// The cached state of a single repository.
#[derive(Debug, Default)]
struct CacheState {
    pull_requests: HashMap<u64, PullRequest>,
    issues: HashMap<u64, Issue>,
    milestones: HashMap<u64, Milestone>,
    labels: Vec<String>,
    metadata: RepoMetadata,
}

/// Thread-safe in-memory store for one repository.
///
/// The cache lives for the lifetime of the process; there is no durable
/// storage behind it.
#[derive(Debug)]
pub struct RepoCache {
    repo: RepoId,
    state: RwLock<CacheState>,
}

impl RepoCache {
    /// Creates an empty cache for the given repository.
    pub fn new(repo: RepoId) -> Self {
        RepoCache {
            repo,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Returns the repository this cache belongs to.
    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    /// Replaces the label list wholesale.
    pub fn set_labels(&self, labels: Vec<String>) {
        let mut state = self.state.write().unwrap();
        state.labels = labels;
    }

    /// Returns a copy of the current label list.
    pub fn labels(&self) -> Vec<String> {
        self.state.read().unwrap().labels.clone()
    }

    /// Inserts or overwrites the given pull requests, keyed by number.
    pub fn add_pull_requests(&self, prs: Vec<PullRequest>) {
        let mut state = self.state.write().unwrap();
        for pr in prs {
            state.pull_requests.insert(pr.number, pr);
        }
    }

    /// Removes the pull requests with the given numbers; unknown numbers are
    /// ignored.
    pub fn delete_pull_requests(&self, numbers: &[u64]) {
        let mut state = self.state.write().unwrap();
        for number in numbers {
            state.pull_requests.remove(number);
        }
    }

    /// Returns the pull requests in any of the given states; no states means
    /// all states. Ordering of the result is unspecified.
    pub fn get_pull_requests(&self, states: &[PrState]) -> Vec<PullRequest> {
        let state = self.state.read().unwrap();
        state
            .pull_requests
            .values()
            .filter(|pr| states.is_empty() || states.contains(&pr.state))
            .cloned()
            .collect()
    }

    /// Inserts or overwrites the given issues, keyed by number.
    pub fn add_issues(&self, issues: Vec<Issue>) {
        let mut state = self.state.write().unwrap();
        for issue in issues {
            state.issues.insert(issue.number, issue);
        }
    }

    /// Removes the issues with the given numbers; unknown numbers are ignored.
    pub fn delete_issues(&self, numbers: &[u64]) {
        let mut state = self.state.write().unwrap();
        for number in numbers {
            state.issues.remove(number);
        }
    }

    /// Returns the issues in any of the given states; no states means all
    /// states.
    pub fn get_issues(&self, states: &[IssueState]) -> Vec<Issue> {
        let state = self.state.read().unwrap();
        state
            .issues
            .values()
            .filter(|issue| states.is_empty() || states.contains(&issue.state))
            .cloned()
            .collect()
    }

    /// Inserts or overwrites the given milestones, keyed by number.
    pub fn add_milestones(&self, milestones: Vec<Milestone>) {
        let mut state = self.state.write().unwrap();
        for milestone in milestones {
            state.milestones.insert(milestone.number, milestone);
        }
    }

    /// Removes the milestones with the given numbers; unknown numbers are
    /// ignored.
    pub fn delete_milestones(&self, numbers: &[u64]) {
        let mut state = self.state.write().unwrap();
        for number in numbers {
            state.milestones.remove(number);
        }
    }

    /// Returns the milestones in any of the given states; no states means all
    /// states.
    pub fn get_milestones(&self, states: &[MilestoneState]) -> Vec<Milestone> {
        let state = self.state.read().unwrap();
        state
            .milestones
            .values()
            .filter(|m| states.is_empty() || states.contains(&m.state))
            .cloned()
            .collect()
    }

    /// Mutates the repository metadata under the write lock.
    pub fn update_metadata(&self, f: impl FnOnce(&mut RepoMetadata)) {
        let mut state = self.state.write().unwrap();
        f(&mut state.metadata);
    }

    /// Returns a copy of the repository metadata.
    pub fn metadata(&self) -> RepoMetadata {
        self.state.read().unwrap().metadata.clone()
    }

    /// Runs the callback with a shared view of the whole cache.
    ///
    /// The callback must not block; the read lock is held for its duration.
    pub fn read<T>(&self, f: impl FnOnce(&RepoCacheView<'_>) -> T) -> T {
        let state = self.state.read().unwrap();
        let view = RepoCacheView {
            repo: &self.repo,
            state: &state,
        };
        f(&view)
    }
}

/// A read-only view of a repository cache, valid for the duration of a
/// `RepoCache::read` callback.
pub struct RepoCacheView<'a> {
    repo: &'a RepoId,
    state: &'a CacheState,
}

impl RepoCacheView<'_> {
    pub fn repo(&self) -> &RepoId {
        self.repo
    }

    pub fn pull_requests(&self) -> impl Iterator<Item = &PullRequest> {
        self.state.pull_requests.values()
    }

    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.state.issues.values()
    }

    pub fn milestones(&self) -> impl Iterator<Item = &Milestone> {
        self.state.milestones.values()
    }

    pub fn labels(&self) -> &[String] {
        &self.state.labels
    }

    pub fn metadata(&self) -> &RepoMetadata {
        &self.state.metadata
    }
}
