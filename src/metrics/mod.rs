//! Prometheus exposition of the cached repository state.
//!
//! Every scrape builds a fresh registry and fills it from a read-only
//! snapshot of the caches, mirroring a const-metric collector: the gauges
//! live only for the duration of one scrape, so there is no drift between
//! cache state and exposed series.
//!
//! A repository contributes series only once its metadata has been fetched
//! at least once; scrapes during warm-up therefore return process-global
//! series and nothing repo-specific.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use prometheus::{Encoder, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::cache::{RepoCache, RepoCacheView};
use crate::client::RemoteClient;
use crate::fetcher::Fetcher;
use crate::types::{IssueState, MilestoneState, PrState, RepoId};

/// Builds the metrics exposition from cache snapshots and fetcher state.
pub struct Collector {
    repos: BTreeMap<RepoId, Arc<RepoCache>>,
    fetcher: Arc<Fetcher>,
    client: Arc<dyn RemoteClient>,
}

impl Collector {
    pub fn new(
        repos: BTreeMap<RepoId, Arc<RepoCache>>,
        fetcher: Arc<Fetcher>,
        client: Arc<dyn RemoteClient>,
    ) -> Self {
        Collector {
            repos,
            fetcher,
            client,
        }
    }

    /// Renders the current state in the text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let registry = Registry::new();
        let series = Series::register(&registry)?;

        for (repo, cache) in &self.repos {
            // repos without fetched metadata are still warming up and emit
            // nothing
            if cache.metadata().fetched_at.is_none() {
                continue;
            }

            // fetcher and client state is read before taking the cache lock;
            // the cache lock is never held while other locks are taken
            self.collect_fetch_state(repo, &series);
            cache.read(|view| collect_repo(repo, view, &series));
        }

        series
            .api_points_remaining
            .set(self.client.remaining_budget());

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }

    /// Emits the queue-size and API-accounting series for one repository.
    fn collect_fetch_state(&self, repo: &RepoId, series: &Series) {
        let full_name = repo.full_name();
        let repo_labels = [full_name.as_str()];

        let pr_queues = self.fetcher.pull_request_queue_sizes(repo);
        series
            .pr_queue_size
            .with_label_values(&[&full_name, "priority"])
            .set(pr_queues.priority as i64);
        series
            .pr_queue_size
            .with_label_values(&[&full_name, "regular"])
            .set(pr_queues.regular as i64);

        let issue_queues = self.fetcher.issue_queue_sizes(repo);
        series
            .issue_queue_size
            .with_label_values(&[&full_name, "priority"])
            .set(issue_queues.priority as i64);
        series
            .issue_queue_size
            .with_label_values(&[&full_name, "regular"])
            .set(issue_queues.regular as i64);

        let milestone_queues = self.fetcher.milestone_queue_sizes(repo);
        series
            .milestone_queue_size
            .with_label_values(&[&full_name, "priority"])
            .set(milestone_queues.priority as i64);
        series
            .milestone_queue_size
            .with_label_values(&[&full_name, "regular"])
            .set(milestone_queues.regular as i64);

        series
            .api_requests_total
            .with_label_values(&repo_labels)
            .set(self.client.request_count(repo) as i64);
        series
            .api_cost_total
            .with_label_values(&repo_labels)
            .set(self.client.cost_accrued(repo) as i64);
    }
}

/// Emits the entity and metadata series of one repository from a locked
/// cache view.
fn collect_repo(repo: &RepoId, view: &RepoCacheView<'_>, series: &Series) {
    let full_name = repo.full_name();

    // ─── pull requests ───

    let mut pr_counts: HashMap<PrState, i64> = HashMap::new();
    let mut pr_label_counts: HashMap<(String, PrState), i64> = HashMap::new();
    let mut mergeable_count = 0;

    for pr in view.pull_requests() {
        let number = pr.number.to_string();
        let mergeable = pr.mergeable();

        *pr_counts.entry(pr.state).or_insert(0) += 1;
        if mergeable {
            mergeable_count += 1;
        }

        series
            .pr_info
            .with_label_values(&[
                &full_name,
                &number,
                pr.state.as_label(),
                &pr.author,
                &mergeable.to_string(),
                &pr.has_label("approved").to_string(),
                &pr.has_label("lgtm").to_string(),
                &pr.size_label(),
            ])
            .set(1);

        series
            .pr_created_at
            .with_label_values(&[&full_name, &number])
            .set(pr.created_at.timestamp());
        series
            .pr_updated_at
            .with_label_values(&[&full_name, &number])
            .set(pr.updated_at.timestamp());

        for label in &pr.labels {
            *pr_label_counts.entry((label.clone(), pr.state)).or_insert(0) += 1;
        }
    }

    for state in PrState::ALL {
        series
            .pr_count
            .with_label_values(&[&full_name, state.as_label()])
            .set(pr_counts.get(&state).copied().unwrap_or(0));
    }

    series
        .pr_mergeable_count
        .with_label_values(&[&full_name])
        .set(mergeable_count);

    for ((label, state), count) in pr_label_counts {
        series
            .label_pr_count
            .with_label_values(&[&full_name, &label, state.as_label()])
            .set(count);
    }

    // ─── issues ───

    let mut issue_counts: HashMap<IssueState, i64> = HashMap::new();
    let mut issue_label_counts: HashMap<(String, IssueState), i64> = HashMap::new();

    for issue in view.issues() {
        *issue_counts.entry(issue.state).or_insert(0) += 1;

        series
            .issue_info
            .with_label_values(&[
                &full_name,
                &issue.number.to_string(),
                issue.state.as_label(),
                &issue.author,
            ])
            .set(1);

        for label in &issue.labels {
            *issue_label_counts
                .entry((label.clone(), issue.state))
                .or_insert(0) += 1;
        }
    }

    for state in IssueState::ALL {
        series
            .issue_count
            .with_label_values(&[&full_name, state.as_label()])
            .set(issue_counts.get(&state).copied().unwrap_or(0));
    }

    for ((label, state), count) in issue_label_counts {
        series
            .label_issue_count
            .with_label_values(&[&full_name, &label, state.as_label()])
            .set(count);
    }

    // ─── milestones ───

    for milestone in view.milestones() {
        let number = milestone.number.to_string();

        series
            .milestone_info
            .with_label_values(&[
                &full_name,
                &number,
                &milestone.title,
                milestone.state.as_label(),
            ])
            .set(1);

        series
            .milestone_issues
            .with_label_values(&[&full_name, &number, MilestoneState::Open.as_label()])
            .set(milestone.open_issues as i64);
        series
            .milestone_issues
            .with_label_values(&[&full_name, &number, MilestoneState::Closed.as_label()])
            .set(milestone.closed_issues as i64);
        series
            .milestone_pull_requests
            .with_label_values(&[&full_name, &number, MilestoneState::Open.as_label()])
            .set(milestone.open_pull_requests as i64);
        series
            .milestone_pull_requests
            .with_label_values(&[&full_name, &number, MilestoneState::Closed.as_label()])
            .set(milestone.closed_pull_requests as i64);
    }

    // ─── repository metadata ───

    let meta = view.metadata();
    let repo_labels = [full_name.as_str()];

    series
        .repo_disk_usage
        .with_label_values(&repo_labels)
        .set(meta.disk_usage_bytes as i64);
    series
        .repo_forks
        .with_label_values(&repo_labels)
        .set(meta.forks as i64);
    series
        .repo_stargazers
        .with_label_values(&repo_labels)
        .set(meta.stargazers as i64);
    series
        .repo_watchers
        .with_label_values(&repo_labels)
        .set(meta.watchers as i64);

    for (gauge, value) in [
        (&series.repo_is_private, meta.is_private),
        (&series.repo_is_archived, meta.is_archived),
        (&series.repo_is_disabled, meta.is_disabled),
        (&series.repo_is_fork, meta.is_fork),
        (&series.repo_is_locked, meta.is_locked),
        (&series.repo_is_mirror, meta.is_mirror),
        (&series.repo_is_template, meta.is_template),
    ] {
        gauge.with_label_values(&repo_labels).set(i64::from(value));
    }

    for (language, bytes) in &meta.languages {
        series
            .repo_language_bytes
            .with_label_values(&[&full_name, language])
            .set(*bytes as i64);
    }
}

/// All series of one scrape, registered against a fresh registry.
struct Series {
    pr_info: IntGaugeVec,
    pr_count: IntGaugeVec,
    pr_mergeable_count: IntGaugeVec,
    label_pr_count: IntGaugeVec,
    pr_created_at: IntGaugeVec,
    pr_updated_at: IntGaugeVec,
    pr_queue_size: IntGaugeVec,

    issue_info: IntGaugeVec,
    issue_count: IntGaugeVec,
    label_issue_count: IntGaugeVec,
    issue_queue_size: IntGaugeVec,

    milestone_info: IntGaugeVec,
    milestone_issues: IntGaugeVec,
    milestone_pull_requests: IntGaugeVec,
    milestone_queue_size: IntGaugeVec,

    repo_disk_usage: IntGaugeVec,
    repo_forks: IntGaugeVec,
    repo_stargazers: IntGaugeVec,
    repo_watchers: IntGaugeVec,
    repo_is_private: IntGaugeVec,
    repo_is_archived: IntGaugeVec,
    repo_is_disabled: IntGaugeVec,
    repo_is_fork: IntGaugeVec,
    repo_is_locked: IntGaugeVec,
    repo_is_mirror: IntGaugeVec,
    repo_is_template: IntGaugeVec,
    repo_language_bytes: IntGaugeVec,

    api_requests_total: IntGaugeVec,
    api_cost_total: IntGaugeVec,
    api_points_remaining: IntGauge,
}

fn gauge_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<IntGaugeVec, prometheus::Error> {
    let vec = IntGaugeVec::new(Opts::new(format!("forge_exporter_{name}"), help), labels)?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

impl Series {
    fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let api_points_remaining = IntGauge::new(
            "forge_exporter_api_points_remaining",
            "Number of currently remaining API points",
        )?;
        registry.register(Box::new(api_points_remaining.clone()))?;

        Ok(Series {
            pr_info: gauge_vec(
                registry,
                "pr_info",
                "Various pull request related meta information with the static value 1",
                &["repo", "number", "state", "author", "mergeable", "approved", "lgtm", "size"],
            )?,
            pr_count: gauge_vec(
                registry,
                "pr_count",
                "Total count of pull requests",
                &["repo", "state"],
            )?,
            pr_mergeable_count: gauge_vec(
                registry,
                "pr_mergeable_count",
                "Total count of mergeable pull requests",
                &["repo"],
            )?,
            label_pr_count: gauge_vec(
                registry,
                "label_pr_count",
                "Total count of pull requests using a given label",
                &["repo", "label", "state"],
            )?,
            pr_created_at: gauge_vec(
                registry,
                "pr_created_at",
                "UNIX timestamp of a pull request's creation time",
                &["repo", "number"],
            )?,
            pr_updated_at: gauge_vec(
                registry,
                "pr_updated_at",
                "UNIX timestamp of a pull request's last update time",
                &["repo", "number"],
            )?,
            pr_queue_size: gauge_vec(
                registry,
                "pr_queue_size",
                "Number of pull requests currently queued for an update",
                &["repo", "queue"],
            )?,
            issue_info: gauge_vec(
                registry,
                "issue_info",
                "Various issue related meta information with the static value 1",
                &["repo", "number", "state", "author"],
            )?,
            issue_count: gauge_vec(
                registry,
                "issue_count",
                "Total count of issues",
                &["repo", "state"],
            )?,
            label_issue_count: gauge_vec(
                registry,
                "label_issue_count",
                "Total count of issues using a given label",
                &["repo", "label", "state"],
            )?,
            issue_queue_size: gauge_vec(
                registry,
                "issue_queue_size",
                "Number of issues currently queued for an update",
                &["repo", "queue"],
            )?,
            milestone_info: gauge_vec(
                registry,
                "milestone_info",
                "Various milestone related meta information with the static value 1",
                &["repo", "number", "title", "state"],
            )?,
            milestone_issues: gauge_vec(
                registry,
                "milestone_issues",
                "Number of issues in a milestone",
                &["repo", "number", "state"],
            )?,
            milestone_pull_requests: gauge_vec(
                registry,
                "milestone_pull_requests",
                "Number of pull requests in a milestone",
                &["repo", "number", "state"],
            )?,
            milestone_queue_size: gauge_vec(
                registry,
                "milestone_queue_size",
                "Number of milestones currently queued for an update",
                &["repo", "queue"],
            )?,
            repo_disk_usage: gauge_vec(
                registry,
                "repo_disk_usage_bytes",
                "Repository size in bytes",
                &["repo"],
            )?,
            repo_forks: gauge_vec(
                registry,
                "repo_forks",
                "Number of forks of this repository",
                &["repo"],
            )?,
            repo_stargazers: gauge_vec(
                registry,
                "repo_stargazers",
                "Number of stargazers for this repository",
                &["repo"],
            )?,
            repo_watchers: gauge_vec(
                registry,
                "repo_watchers",
                "Number of watchers for this repository",
                &["repo"],
            )?,
            repo_is_private: gauge_vec(
                registry,
                "repo_is_private",
                "1 if the repository is private, 0 otherwise",
                &["repo"],
            )?,
            repo_is_archived: gauge_vec(
                registry,
                "repo_is_archived",
                "1 if the repository is archived, 0 otherwise",
                &["repo"],
            )?,
            repo_is_disabled: gauge_vec(
                registry,
                "repo_is_disabled",
                "1 if the repository is disabled, 0 otherwise",
                &["repo"],
            )?,
            repo_is_fork: gauge_vec(
                registry,
                "repo_is_fork",
                "1 if the repository is a fork, 0 otherwise",
                &["repo"],
            )?,
            repo_is_locked: gauge_vec(
                registry,
                "repo_is_locked",
                "1 if the repository is locked, 0 otherwise",
                &["repo"],
            )?,
            repo_is_mirror: gauge_vec(
                registry,
                "repo_is_mirror",
                "1 if the repository is a mirror, 0 otherwise",
                &["repo"],
            )?,
            repo_is_template: gauge_vec(
                registry,
                "repo_is_template",
                "1 if the repository is a template, 0 otherwise",
                &["repo"],
            )?,
            repo_language_bytes: gauge_vec(
                registry,
                "repo_language_bytes",
                "Bytes of code per language in this repository",
                &["repo", "language"],
            )?,
            api_requests_total: gauge_vec(
                registry,
                "api_requests_total",
                "Total number of requests against the remote API",
                &["repo"],
            )?,
            api_cost_total: gauge_vec(
                registry,
                "api_cost_total",
                "Total query cost accrued against the remote API",
                &["repo"],
            )?,
            api_points_remaining,
        })
    }
}
