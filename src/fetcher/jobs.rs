//! Repository-level job processors: labels and metadata.

use chrono::Utc;
use tracing::debug;

use crate::client::ClientError;
use crate::types::RepoId;

use super::board::JobKind;
use super::fetcher::Fetcher;

impl Fetcher {
    /// Fetches the repository's label list and replaces the cached list.
    ///
    /// The replacement happens even when the fetch failed partway through
    /// pagination, so the cache never carries labels the remote no longer
    /// reports. The job is removed either way.
    pub(super) async fn process_update_labels(&self, repo: &RepoId) -> Result<(), ClientError> {
        let cache = self.cache(repo);

        let (labels, result) = match self.client().repository_labels(repo).await {
            Ok(labels) => (labels, Ok(())),
            Err(err) => (err.fetched, Err(err.source)),
        };

        debug!(repo = %repo, count = labels.len(), "Fetched labels");

        cache.set_labels(labels);
        self.remove_job(repo, JobKind::UpdateLabels);

        result
    }

    /// Fetches the repository's metadata.
    ///
    /// On success all metadata fields are replaced and `fetched_at` is set;
    /// on failure the metadata is left untouched. The job is removed either
    /// way.
    pub(super) async fn process_update_repo_info(&self, repo: &RepoId) -> Result<(), ClientError> {
        let result = self.client().repository_info(repo).await;

        let outcome = match result {
            Ok(info) => {
                self.cache(repo).update_metadata(|meta| {
                    *meta = info;
                    meta.fetched_at = Some(Utc::now());
                });
                Ok(())
            }
            Err(err) => Err(err),
        };

        self.remove_job(repo, JobKind::UpdateRepoInfo);

        outcome
    }
}
