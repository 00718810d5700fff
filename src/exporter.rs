//! The coordinator owning the caches and the fetcher.
//!
//! The fetcher deliberately does not own the repository caches: the
//! coordinator owns both and hands shared references to the fetcher and to
//! the metrics collector, so scrapes stay independent of the fetcher's
//! lifetime.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::RepoCache;
use crate::client::RemoteClient;
use crate::config::Schedule;
use crate::drivers;
use crate::fetcher::Fetcher;
use crate::types::RepoId;

/// The assembled exporter: one cache per repository plus the fetcher.
pub struct Exporter {
    repos: BTreeMap<RepoId, Arc<RepoCache>>,
    fetcher: Arc<Fetcher>,
    client: Arc<dyn RemoteClient>,
}

impl Exporter {
    /// Creates empty caches for all repositories and wires up the fetcher.
    pub fn new(client: Arc<dyn RemoteClient>, repo_ids: &[RepoId]) -> Self {
        let mut repos = BTreeMap::new();
        for repo in repo_ids {
            repos.insert(repo.clone(), Arc::new(RepoCache::new(repo.clone())));
        }

        let fetcher = Arc::new(Fetcher::new(Arc::clone(&client), repos.clone()));

        Exporter {
            repos,
            fetcher,
            client,
        }
    }

    pub fn caches(&self) -> &BTreeMap<RepoId, Arc<RepoCache>> {
        &self.repos
    }

    pub fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }

    pub fn client(&self) -> &Arc<dyn RemoteClient> {
        &self.client
    }

    /// Schedules the initial scans and starts the dispatch loop and all
    /// periodic drivers.
    ///
    /// Initial scans run sequentially through the single dispatch loop, so a
    /// large repository list does not trip the remote's anti-abuse system.
    pub fn start(&self, schedule: Schedule, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        handles.push(tokio::spawn(
            Arc::clone(&self.fetcher).run(shutdown.clone()),
        ));

        info!("Initializing repositories");

        for (repo, cache) in &self.repos {
            info!(repo = %repo, "Scheduling initial scans");

            self.fetcher.enqueue_repo_info_update(repo);

            if schedule.has_labelled_metrics() {
                self.fetcher.enqueue_label_update(repo);
            }

            handles.push(tokio::spawn(drivers::refresh_repo_info(
                Arc::clone(&self.fetcher),
                Arc::clone(cache),
                schedule.repo_refresh,
                shutdown.clone(),
            )));

            if schedule.pull_requests.enabled() {
                self.fetcher
                    .enqueue_pull_request_scan(repo, schedule.pull_requests.depth);

                handles.push(tokio::spawn(drivers::refresh_pull_requests(
                    Arc::clone(&self.fetcher),
                    Arc::clone(cache),
                    schedule.pull_requests.refresh,
                    shutdown.clone(),
                )));
                handles.push(tokio::spawn(drivers::resync_pull_requests(
                    Arc::clone(&self.fetcher),
                    Arc::clone(cache),
                    schedule.pull_requests.resync,
                    shutdown.clone(),
                )));
            }

            if schedule.issues.enabled() {
                self.fetcher.enqueue_issue_scan(repo, schedule.issues.depth);

                handles.push(tokio::spawn(drivers::refresh_issues(
                    Arc::clone(&self.fetcher),
                    Arc::clone(cache),
                    schedule.issues.refresh,
                    shutdown.clone(),
                )));
                handles.push(tokio::spawn(drivers::resync_issues(
                    Arc::clone(&self.fetcher),
                    Arc::clone(cache),
                    schedule.issues.resync,
                    shutdown.clone(),
                )));
            }

            if schedule.milestones.enabled() {
                self.fetcher
                    .enqueue_milestone_scan(repo, schedule.milestones.depth);

                handles.push(tokio::spawn(drivers::refresh_milestones(
                    Arc::clone(&self.fetcher),
                    Arc::clone(cache),
                    schedule.milestones.refresh,
                    shutdown.clone(),
                )));
                handles.push(tokio::spawn(drivers::resync_milestones(
                    Arc::clone(&self.fetcher),
                    Arc::clone(cache),
                    schedule.milestones.resync,
                    shutdown.clone(),
                )));
            }
        }

        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::Parser;

    use crate::config::Options;
    use crate::fetcher::JobKind;
    use crate::test_utils::MockRemoteClient;

    fn schedule(args: &[&str]) -> Schedule {
        let mut argv = vec!["forge-exporter", "--repo", "owner/repo"];
        argv.extend_from_slice(args);
        Options::parse_from(argv).schedule()
    }

    #[tokio::test(start_paused = true)]
    async fn startup_enqueues_scans_and_metadata() {
        let client = Arc::new(MockRemoteClient::new());
        let repo = RepoId::new("owner", "repo");
        let exporter = Exporter::new(client.clone(), std::slice::from_ref(&repo));

        let shutdown = CancellationToken::new();
        // cancel before spawning so the dispatch loop exits without
        // processing anything; we only inspect the board
        shutdown.cancel();
        let handles = exporter.start(schedule(&[]), shutdown);
        for handle in handles {
            handle.await.unwrap();
        }

        let kinds = exporter.fetcher().pending_jobs(&repo);

        assert!(kinds.contains(&JobKind::UpdateRepoInfo));
        assert!(kinds.contains(&JobKind::UpdateLabels));
        assert!(kinds.contains(&JobKind::ScanPullRequests));
        assert!(kinds.contains(&JobKind::ScanIssues));
        assert!(kinds.contains(&JobKind::ScanMilestones));

        // scans are dispatched before anything else
        assert!(kinds[0].is_scan());
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_domain_is_not_scanned() {
        let client = Arc::new(MockRemoteClient::new());
        let repo = RepoId::new("owner", "repo");
        let exporter = Exporter::new(client.clone(), std::slice::from_ref(&repo));

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let handles = exporter.start(schedule(&["--pr-depth", "0"]), shutdown);
        for handle in handles {
            handle.await.unwrap();
        }

        let kinds = exporter.fetcher().pending_jobs(&repo);

        assert!(!kinds.contains(&JobKind::ScanPullRequests));
        assert!(kinds.contains(&JobKind::ScanIssues));
    }
}
