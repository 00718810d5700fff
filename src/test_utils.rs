//! Shared test fixtures: entity builders and a scripted remote client.
//!
//! This module is only compiled for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::client::{
    ClientError, LabelsError, MAX_ISSUES_PER_QUERY, MAX_MILESTONES_PER_QUERY,
    MAX_PULL_REQUESTS_PER_QUERY, Page, RemoteClient,
};
use crate::types::{
    BuildContext, ContextState, Issue, IssueState, Milestone, MilestoneState, PrState,
    PullRequest, RepoId, RepoMetadata,
};

/// A fixed timestamp so fixtures compare deterministically.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

// ─── Entity builders ───

pub struct PrBuilder {
    pr: PullRequest,
}

/// Starts building a pull request fixture.
pub fn pull_request(number: u64, state: PrState) -> PrBuilder {
    PrBuilder {
        pr: PullRequest {
            number,
            state,
            author: "user-1".to_string(),
            created_at: fixed_time(),
            updated_at: fixed_time(),
            fetched_at: fixed_time(),
            labels: Vec::new(),
            contexts: Vec::new(),
        },
    }
}

impl PrBuilder {
    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.pr.labels = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_contexts(mut self, contexts: &[(&str, ContextState)]) -> Self {
        self.pr.contexts = contexts
            .iter()
            .map(|(name, state)| BuildContext {
                name: name.to_string(),
                state: *state,
            })
            .collect();
        self
    }

    pub fn with_author(mut self, author: &str) -> Self {
        self.pr.author = author.to_string();
        self
    }

    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.pr.fetched_at = fetched_at;
        self
    }

    pub fn build(self) -> PullRequest {
        self.pr
    }
}

pub struct IssueBuilder {
    issue: Issue,
}

/// Starts building an issue fixture.
pub fn issue(number: u64, state: IssueState) -> IssueBuilder {
    IssueBuilder {
        issue: Issue {
            number,
            state,
            author: "user-1".to_string(),
            created_at: fixed_time(),
            updated_at: fixed_time(),
            fetched_at: fixed_time(),
            labels: Vec::new(),
        },
    }
}

impl IssueBuilder {
    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.issue.labels = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn build(self) -> Issue {
        self.issue
    }
}

pub struct MilestoneBuilder {
    milestone: Milestone,
}

/// Starts building a milestone fixture.
pub fn milestone(number: u64, state: MilestoneState) -> MilestoneBuilder {
    MilestoneBuilder {
        milestone: Milestone {
            number,
            title: format!("milestone-{number}"),
            state,
            created_at: fixed_time(),
            updated_at: fixed_time(),
            closed_at: None,
            due_on: None,
            fetched_at: fixed_time(),
            open_issues: 0,
            closed_issues: 0,
            open_pull_requests: 0,
            closed_pull_requests: 0,
        },
    }
}

impl MilestoneBuilder {
    pub fn build(self) -> Milestone {
        self.milestone
    }
}

// ─── Scripted remote client ───

/// A call recorded by the mock client, for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    RepositoryInfo { repo: RepoId },
    RepositoryLabels { repo: RepoId },
    ListPullRequests { repo: RepoId, cursor: String },
    ListIssues { repo: RepoId, cursor: String },
    ListMilestones { repo: RepoId, cursor: String },
    PullRequestsByNumbers { repo: RepoId, numbers: Vec<u64> },
    IssuesByNumbers { repo: RepoId, numbers: Vec<u64> },
    MilestonesByNumbers { repo: RepoId, numbers: Vec<u64> },
}

#[derive(Default)]
struct MockResponses {
    repo_info: VecDeque<Result<RepoMetadata, ClientError>>,
    labels: VecDeque<Result<Vec<String>, LabelsError>>,
    pr_pages: VecDeque<Result<Page<PullRequest>, ClientError>>,
    issue_pages: VecDeque<Result<Page<Issue>, ClientError>>,
    milestone_pages: VecDeque<Result<Page<Milestone>, ClientError>>,
    prs_by_numbers: VecDeque<Result<Vec<PullRequest>, ClientError>>,
    issues_by_numbers: VecDeque<Result<Vec<Issue>, ClientError>>,
    milestones_by_numbers: VecDeque<Result<Vec<Milestone>, ClientError>>,
}

/// A remote client driven by scripted responses.
///
/// Each method pops the next scripted response for its kind; when none is
/// scripted, a benign default is returned (empty pages and label lists,
/// default metadata, and - for get-by-numbers calls - every requested
/// number present, so unscripted refreshes never look like deletions).
#[derive(Default)]
pub struct MockRemoteClient {
    responses: Mutex<MockResponses>,
    calls: Mutex<Vec<MockCall>>,
    remaining: AtomicI64,
}

impl MockRemoteClient {
    pub fn new() -> Self {
        MockRemoteClient::default()
    }

    pub fn script_repo_info(&self, response: Result<RepoMetadata, ClientError>) {
        self.responses.lock().unwrap().repo_info.push_back(response);
    }

    pub fn script_labels(&self, response: Result<Vec<String>, LabelsError>) {
        self.responses.lock().unwrap().labels.push_back(response);
    }

    pub fn script_pr_page(&self, response: Result<Page<PullRequest>, ClientError>) {
        self.responses.lock().unwrap().pr_pages.push_back(response);
    }

    pub fn script_issue_page(&self, response: Result<Page<Issue>, ClientError>) {
        self.responses.lock().unwrap().issue_pages.push_back(response);
    }

    pub fn script_milestone_page(&self, response: Result<Page<Milestone>, ClientError>) {
        self.responses
            .lock()
            .unwrap()
            .milestone_pages
            .push_back(response);
    }

    pub fn script_prs_by_numbers(&self, response: Result<Vec<PullRequest>, ClientError>) {
        self.responses
            .lock()
            .unwrap()
            .prs_by_numbers
            .push_back(response);
    }

    pub fn script_issues_by_numbers(&self, response: Result<Vec<Issue>, ClientError>) {
        self.responses
            .lock()
            .unwrap()
            .issues_by_numbers
            .push_back(response);
    }

    pub fn script_milestones_by_numbers(&self, response: Result<Vec<Milestone>, ClientError>) {
        self.responses
            .lock()
            .unwrap()
            .milestones_by_numbers
            .push_back(response);
    }

    pub fn set_remaining_budget(&self, remaining: i64) {
        self.remaining.store(remaining, Ordering::Relaxed);
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RemoteClient for MockRemoteClient {
    async fn repository_info(&self, repo: &RepoId) -> Result<RepoMetadata, ClientError> {
        self.record(MockCall::RepositoryInfo { repo: repo.clone() });
        self.responses
            .lock()
            .unwrap()
            .repo_info
            .pop_front()
            .unwrap_or_else(|| Ok(RepoMetadata::default()))
    }

    async fn repository_labels(&self, repo: &RepoId) -> Result<Vec<String>, LabelsError> {
        self.record(MockCall::RepositoryLabels { repo: repo.clone() });
        self.responses
            .lock()
            .unwrap()
            .labels
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn list_pull_requests(
        &self,
        repo: &RepoId,
        _states: Option<&[PrState]>,
        cursor: &str,
    ) -> Result<Page<PullRequest>, ClientError> {
        self.record(MockCall::ListPullRequests {
            repo: repo.clone(),
            cursor: cursor.to_string(),
        });
        self.responses
            .lock()
            .unwrap()
            .pr_pages
            .pop_front()
            .unwrap_or_else(|| Ok(Page::default()))
    }

    async fn list_issues(
        &self,
        repo: &RepoId,
        _states: Option<&[IssueState]>,
        cursor: &str,
    ) -> Result<Page<Issue>, ClientError> {
        self.record(MockCall::ListIssues {
            repo: repo.clone(),
            cursor: cursor.to_string(),
        });
        self.responses
            .lock()
            .unwrap()
            .issue_pages
            .pop_front()
            .unwrap_or_else(|| Ok(Page::default()))
    }

    async fn list_milestones(
        &self,
        repo: &RepoId,
        _states: Option<&[MilestoneState]>,
        cursor: &str,
    ) -> Result<Page<Milestone>, ClientError> {
        self.record(MockCall::ListMilestones {
            repo: repo.clone(),
            cursor: cursor.to_string(),
        });
        self.responses
            .lock()
            .unwrap()
            .milestone_pages
            .pop_front()
            .unwrap_or_else(|| Ok(Page::default()))
    }

    async fn pull_requests_by_numbers(
        &self,
        repo: &RepoId,
        numbers: &[u64],
    ) -> Result<Vec<PullRequest>, ClientError> {
        assert!(
            numbers.len() <= MAX_PULL_REQUESTS_PER_QUERY,
            "batch exceeds PR query arity"
        );
        self.record(MockCall::PullRequestsByNumbers {
            repo: repo.clone(),
            numbers: numbers.to_vec(),
        });
        self.responses
            .lock()
            .unwrap()
            .prs_by_numbers
            .pop_front()
            .unwrap_or_else(|| {
                Ok(numbers
                    .iter()
                    .map(|n| pull_request(*n, PrState::Open).build())
                    .collect())
            })
    }

    async fn issues_by_numbers(
        &self,
        repo: &RepoId,
        numbers: &[u64],
    ) -> Result<Vec<Issue>, ClientError> {
        assert!(
            numbers.len() <= MAX_ISSUES_PER_QUERY,
            "batch exceeds issue query arity"
        );
        self.record(MockCall::IssuesByNumbers {
            repo: repo.clone(),
            numbers: numbers.to_vec(),
        });
        self.responses
            .lock()
            .unwrap()
            .issues_by_numbers
            .pop_front()
            .unwrap_or_else(|| {
                Ok(numbers
                    .iter()
                    .map(|n| issue(*n, IssueState::Open).build())
                    .collect())
            })
    }

    async fn milestones_by_numbers(
        &self,
        repo: &RepoId,
        numbers: &[u64],
    ) -> Result<Vec<Milestone>, ClientError> {
        assert!(
            numbers.len() <= MAX_MILESTONES_PER_QUERY,
            "batch exceeds milestone query arity"
        );
        self.record(MockCall::MilestonesByNumbers {
            repo: repo.clone(),
            numbers: numbers.to_vec(),
        });
        self.responses
            .lock()
            .unwrap()
            .milestones_by_numbers
            .pop_front()
            .unwrap_or_else(|| {
                Ok(numbers
                    .iter()
                    .map(|n| milestone(*n, MilestoneState::Open).build())
                    .collect())
            })
    }

    fn remaining_budget(&self) -> i64 {
        self.remaining.load(Ordering::Relaxed)
    }

    fn request_count(&self, repo: &RepoId) -> u64 {
        let full_name = repo.full_name();
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| mock_call_repo(call).full_name() == full_name)
            .count() as u64
    }

    fn cost_accrued(&self, repo: &RepoId) -> u64 {
        // scripted calls cost one point each
        self.request_count(repo)
    }
}

fn mock_call_repo(call: &MockCall) -> &RepoId {
    match call {
        MockCall::RepositoryInfo { repo }
        | MockCall::RepositoryLabels { repo }
        | MockCall::ListPullRequests { repo, .. }
        | MockCall::ListIssues { repo, .. }
        | MockCall::ListMilestones { repo, .. }
        | MockCall::PullRequestsByNumbers { repo, .. }
        | MockCall::IssuesByNumbers { repo, .. }
        | MockCall::MilestonesByNumbers { repo, .. } => repo,
    }
}
