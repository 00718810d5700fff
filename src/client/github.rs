//! GitHub GraphQL implementation of the remote client.
//!
//! Item lookups are multiplexed into exact-arity queries: every query always
//! declares `K` `(number, has)` variable pairs, and slots beyond the caller's
//! list are filled with `has = false` sentinels so unused aliases are skipped
//! server-side via `@include`. A `NOT_FOUND` error on an aliased item is
//! treated as "item absent", not as a failed request.
//!
//! Every query selects `rateLimit { cost remaining }` so the client can keep
//! its request count, accrued cost, and remaining-budget tallies current.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::types::{
    BuildContext, ContextState, Issue, IssueState, Milestone, MilestoneState, PrState,
    PullRequest, RepoId, RepoMetadata,
};

use super::error::{ClientError, LabelsError};
use super::{
    MAX_ISSUES_PER_QUERY, MAX_MILESTONES_PER_QUERY, MAX_PULL_REQUESTS_PER_QUERY, Page,
    RemoteClient,
};

/// How the `author` field of PRs and issues is populated.
///
/// Resolved once at client construction and never mixed within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorMode {
    /// Use the remote's stable user identifier.
    StableId,

    /// Use the human login. Metrics will contain personally identifiable
    /// information.
    Login,
}

/// Per-repository request and cost tallies.
#[derive(Debug, Default)]
struct RequestStats {
    remaining: AtomicI64,
    requests: Mutex<HashMap<String, u64>>,
    costs: Mutex<HashMap<String, u64>>,
}

impl RequestStats {
    fn count(&self, repo: &RepoId, rate_limit: Option<&RateLimitInfo>) {
        let key = repo.full_name();

        *self.requests.lock().unwrap().entry(key.clone()).or_insert(0) += 1;

        if let Some(limit) = rate_limit {
            *self.costs.lock().unwrap().entry(key).or_insert(0) += limit.cost.max(0) as u64;
            self.remaining.store(limit.remaining, Ordering::Relaxed);
        }
    }
}

/// GitHub GraphQL client.
pub struct GithubClient {
    octocrab: Octocrab,
    author_mode: AuthorMode,
    stats: RequestStats,
}

impl GithubClient {
    /// Creates a client from a personal access token.
    pub fn from_token(
        token: impl Into<String>,
        author_mode: AuthorMode,
    ) -> Result<Self, octocrab::Error> {
        let octocrab = Octocrab::builder().personal_token(token.into()).build()?;
        Ok(GithubClient {
            octocrab,
            author_mode,
            stats: RequestStats::default(),
        })
    }

    /// Runs one GraphQL query and returns the `data` object.
    ///
    /// `NOT_FOUND` errors are tolerated: the affected aliases are null in the
    /// data and the caller decides what absence means. Any other GraphQL
    /// error fails the call.
    async fn run_query(
        &self,
        repo: &RepoId,
        query: &str,
        variables: Value,
    ) -> Result<Value, ClientError> {
        let payload = json!({ "query": query, "variables": variables });

        let response: Value = match self.octocrab.graphql(&payload).await {
            Ok(response) => response,
            Err(err) => {
                self.stats.count(repo, None);
                return Err(ClientError::from_octocrab(err));
            }
        };

        let rate_limit = response
            .pointer("/data/rateLimit")
            .and_then(|v| serde_json::from_value::<RateLimitInfo>(v.clone()).ok());

        self.stats.count(repo, rate_limit.as_ref());

        debug!(
            repo = %repo,
            cost = rate_limit.as_ref().map(|l| l.cost).unwrap_or(0),
            remaining = rate_limit.as_ref().map(|l| l.remaining).unwrap_or(0),
            "Remote query finished"
        );

        if let Some(errors) = response.get("errors").and_then(Value::as_array)
            && !errors.is_empty()
        {
            let fatal: Vec<&Value> = errors.iter().filter(|e| !is_not_found_error(e)).collect();

            if !fatal.is_empty() {
                let message = fatal
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(classify_graphql_error(&message));
            }
        }

        match response.get("data") {
            Some(data) if !data.is_null() => Ok(data.clone()),
            _ => Err(ClientError::transport("response carried no data")),
        }
    }

    fn author(&self, actor: Option<&ApiActor>) -> String {
        let Some(actor) = actor else {
            return String::new();
        };

        match self.author_mode {
            AuthorMode::Login => actor.login.clone(),
            AuthorMode::StableId => actor.id.clone().unwrap_or_default(),
        }
    }

    fn convert_pull_request(&self, api: ApiPullRequest, fetched_at: DateTime<Utc>) -> PullRequest {
        PullRequest {
            number: api.number,
            state: api.state,
            author: self.author(api.author.as_ref()),
            created_at: api.created_at,
            updated_at: api.updated_at,
            fetched_at,
            labels: api.labels.names(),
            contexts: api
                .commits
                .nodes
                .first()
                .and_then(|node| node.commit.status.as_ref())
                .map(|status| {
                    status
                        .contexts
                        .iter()
                        .map(|ctx| BuildContext {
                            name: ctx.context.clone(),
                            state: ctx.state,
                        })
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    fn convert_issue(&self, api: ApiIssue, fetched_at: DateTime<Utc>) -> Issue {
        Issue {
            number: api.number,
            state: api.state,
            author: self.author(api.author.as_ref()),
            created_at: api.created_at,
            updated_at: api.updated_at,
            fetched_at,
            labels: api.labels.names(),
        }
    }
}

fn convert_milestone(api: ApiMilestone, fetched_at: DateTime<Utc>) -> Milestone {
    Milestone {
        number: api.number,
        title: api.title,
        state: api.state,
        created_at: api.created_at,
        updated_at: api.updated_at,
        closed_at: api.closed_at,
        due_on: api.due_on,
        fetched_at,
        open_issues: api.open_issues.total_count,
        closed_issues: api.closed_issues.total_count,
        open_pull_requests: api.open_pull_requests.total_count,
        closed_pull_requests: api.closed_pull_requests.total_count,
    }
}

#[async_trait]
impl RemoteClient for GithubClient {
    async fn repository_info(&self, repo: &RepoId) -> Result<RepoMetadata, ClientError> {
        let query = format!(
            "query($owner: String!, $name: String!) {{\n\
             rateLimit {{ cost remaining }}\n\
             repository(owner: $owner, name: $name) {{ {REPO_INFO_SELECTION} }}\n\
             }}"
        );
        let variables = json!({ "owner": repo.owner, "name": repo.name });

        let data = self.run_query(repo, &query, variables).await?;
        let api: ApiRepository = decode_repository_field(&data, repo)?;

        let mut languages = HashMap::new();
        for edge in api.languages.edges {
            languages.insert(edge.node.name, edge.size);
        }

        Ok(RepoMetadata {
            // the remote reports kilobytes
            disk_usage_bytes: api.disk_usage * 1024,
            forks: api.fork_count,
            stargazers: api.stargazers.total_count,
            watchers: api.watchers.total_count,
            is_private: api.is_private,
            is_archived: api.is_archived,
            is_disabled: api.is_disabled,
            is_fork: api.is_fork,
            is_locked: api.is_locked,
            is_mirror: api.is_mirror,
            is_template: api.is_template,
            languages,
            fetched_at: None,
        })
    }

    async fn repository_labels(&self, repo: &RepoId) -> Result<Vec<String>, LabelsError> {
        let query = "query($owner: String!, $name: String!, $cursor: String) {\n\
             rateLimit { cost remaining }\n\
             repository(owner: $owner, name: $name) {\n\
             labels(first: 100, after: $cursor) {\n\
             nodes { name }\n\
             pageInfo { endCursor hasNextPage }\n\
             } } }";

        let mut labels = Vec::new();
        let mut cursor = Value::Null;

        loop {
            let variables = json!({
                "owner": repo.owner,
                "name": repo.name,
                "cursor": cursor,
            });

            let data = match self.run_query(repo, query, variables).await {
                Ok(data) => data,
                Err(source) => {
                    return Err(LabelsError {
                        fetched: labels,
                        source,
                    });
                }
            };

            let connection: ApiLabelPage = data
                .pointer("/repository/labels")
                .cloned()
                .and_then(|v| serde_json::from_value(v).ok())
                .ok_or_else(|| LabelsError {
                    fetched: labels.clone(),
                    source: ClientError::not_found(format!(
                        "could not resolve labels of {repo}"
                    )),
                })?;

            labels.extend(connection.nodes.into_iter().map(|l| l.name));

            if !connection.page_info.has_next_page {
                return Ok(labels);
            }

            cursor = Value::String(connection.page_info.end_cursor.unwrap_or_default());
        }
    }

    async fn list_pull_requests(
        &self,
        repo: &RepoId,
        states: Option<&[PrState]>,
        cursor: &str,
    ) -> Result<Page<PullRequest>, ClientError> {
        let states = states.unwrap_or(&PrState::ALL);
        let query = format!(
            "query($owner: String!, $name: String!, $states: [PullRequestState!]!, $cursor: String) {{\n\
             rateLimit {{ cost remaining }}\n\
             repository(owner: $owner, name: $name) {{\n\
             pullRequests(states: $states, first: 100, orderBy: {{field: UPDATED_AT, direction: DESC}}, after: $cursor) {{\n\
             nodes {{ {PR_SELECTION} }}\n\
             pageInfo {{ endCursor hasNextPage }}\n\
             }} }} }}"
        );

        let data = self
            .run_query(repo, &query, list_variables(repo, states, cursor)?)
            .await?;

        let listing: ApiListing<ApiPullRequest> =
            decode_listing(&data, "pullRequests", repo)?;

        let fetched_at = Utc::now();
        Ok(Page {
            items: listing
                .nodes
                .into_iter()
                .map(|node| self.convert_pull_request(node, fetched_at))
                .collect(),
            next_cursor: listing.page_info.next_cursor(),
        })
    }

    async fn list_issues(
        &self,
        repo: &RepoId,
        states: Option<&[IssueState]>,
        cursor: &str,
    ) -> Result<Page<Issue>, ClientError> {
        let states = states.unwrap_or(&IssueState::ALL);
        let query = format!(
            "query($owner: String!, $name: String!, $states: [IssueState!]!, $cursor: String) {{\n\
             rateLimit {{ cost remaining }}\n\
             repository(owner: $owner, name: $name) {{\n\
             issues(states: $states, first: 100, orderBy: {{field: UPDATED_AT, direction: DESC}}, after: $cursor) {{\n\
             nodes {{ {ISSUE_SELECTION} }}\n\
             pageInfo {{ endCursor hasNextPage }}\n\
             }} }} }}"
        );

        let data = self
            .run_query(repo, &query, list_variables(repo, states, cursor)?)
            .await?;

        let listing: ApiListing<ApiIssue> = decode_listing(&data, "issues", repo)?;

        let fetched_at = Utc::now();
        Ok(Page {
            items: listing
                .nodes
                .into_iter()
                .map(|node| self.convert_issue(node, fetched_at))
                .collect(),
            next_cursor: listing.page_info.next_cursor(),
        })
    }

    async fn list_milestones(
        &self,
        repo: &RepoId,
        states: Option<&[MilestoneState]>,
        cursor: &str,
    ) -> Result<Page<Milestone>, ClientError> {
        let states = states.unwrap_or(&MilestoneState::ALL);
        let query = format!(
            "query($owner: String!, $name: String!, $states: [MilestoneState!]!, $cursor: String) {{\n\
             rateLimit {{ cost remaining }}\n\
             repository(owner: $owner, name: $name) {{\n\
             milestones(states: $states, first: 100, orderBy: {{field: UPDATED_AT, direction: DESC}}, after: $cursor) {{\n\
             nodes {{ {MILESTONE_SELECTION} }}\n\
             pageInfo {{ endCursor hasNextPage }}\n\
             }} }} }}"
        );

        let data = self
            .run_query(repo, &query, list_variables(repo, states, cursor)?)
            .await?;

        let listing: ApiListing<ApiMilestone> = decode_listing(&data, "milestones", repo)?;

        let fetched_at = Utc::now();
        Ok(Page {
            items: listing
                .nodes
                .into_iter()
                .map(|node| convert_milestone(node, fetched_at))
                .collect(),
            next_cursor: listing.page_info.next_cursor(),
        })
    }

    async fn pull_requests_by_numbers(
        &self,
        repo: &RepoId,
        numbers: &[u64],
    ) -> Result<Vec<PullRequest>, ClientError> {
        let query = numbered_query("pullRequest", PR_SELECTION, MAX_PULL_REQUESTS_PER_QUERY);
        let variables = numbered_variables(repo, numbers, MAX_PULL_REQUESTS_PER_QUERY);

        let data = self.run_query(repo, &query, variables).await?;
        let nodes: Vec<ApiPullRequest> =
            decode_numbered_items(&data, MAX_PULL_REQUESTS_PER_QUERY)?;

        let fetched_at = Utc::now();
        Ok(nodes
            .into_iter()
            .map(|node| self.convert_pull_request(node, fetched_at))
            .collect())
    }

    async fn issues_by_numbers(
        &self,
        repo: &RepoId,
        numbers: &[u64],
    ) -> Result<Vec<Issue>, ClientError> {
        let query = numbered_query("issue", ISSUE_SELECTION, MAX_ISSUES_PER_QUERY);
        let variables = numbered_variables(repo, numbers, MAX_ISSUES_PER_QUERY);

        let data = self.run_query(repo, &query, variables).await?;
        let nodes: Vec<ApiIssue> = decode_numbered_items(&data, MAX_ISSUES_PER_QUERY)?;

        let fetched_at = Utc::now();
        Ok(nodes
            .into_iter()
            .map(|node| self.convert_issue(node, fetched_at))
            .collect())
    }

    async fn milestones_by_numbers(
        &self,
        repo: &RepoId,
        numbers: &[u64],
    ) -> Result<Vec<Milestone>, ClientError> {
        let query = numbered_query("milestone", MILESTONE_SELECTION, MAX_MILESTONES_PER_QUERY);
        let variables = numbered_variables(repo, numbers, MAX_MILESTONES_PER_QUERY);

        let data = self.run_query(repo, &query, variables).await?;
        let nodes: Vec<ApiMilestone> = decode_numbered_items(&data, MAX_MILESTONES_PER_QUERY)?;

        let fetched_at = Utc::now();
        Ok(nodes
            .into_iter()
            .map(|node| convert_milestone(node, fetched_at))
            .collect())
    }

    fn remaining_budget(&self) -> i64 {
        self.stats.remaining.load(Ordering::Relaxed)
    }

    fn request_count(&self, repo: &RepoId) -> u64 {
        self.stats
            .requests
            .lock()
            .unwrap()
            .get(&repo.full_name())
            .copied()
            .unwrap_or(0)
    }

    fn cost_accrued(&self, repo: &RepoId) -> u64 {
        self.stats
            .costs
            .lock()
            .unwrap()
            .get(&repo.full_name())
            .copied()
            .unwrap_or(0)
    }
}

// ─── Query construction ───

const PR_SELECTION: &str = "number state createdAt updatedAt \
     author { login ... on User { id } } \
     labels(first: 50) { nodes { name } } \
     commits(last: 1) { nodes { commit { status { contexts { context state } } } } }";

const ISSUE_SELECTION: &str = "number state createdAt updatedAt \
     author { login ... on User { id } } \
     labels(first: 50) { nodes { name } }";

const MILESTONE_SELECTION: &str = "number title state createdAt updatedAt closedAt dueOn \
     openIssues: issues(states: OPEN) { totalCount } \
     closedIssues: issues(states: CLOSED) { totalCount } \
     openPullRequests: pullRequests(states: OPEN) { totalCount } \
     closedPullRequests: pullRequests(states: [MERGED, CLOSED]) { totalCount }";

const REPO_INFO_SELECTION: &str = "diskUsage forkCount \
     stargazers { totalCount } watchers { totalCount } \
     isPrivate isArchived isDisabled isFork isLocked isMirror isTemplate \
     languages(first: 100) { edges { size node { name } } }";

/// Builds a multiplexed get-by-numbers query with exactly `arity` aliased
/// item fields, each guarded by an `@include(if: $has<i>)` directive.
fn numbered_query(field: &str, selection: &str, arity: usize) -> String {
    let mut declarations = String::from("$owner: String!, $name: String!");
    let mut body = String::new();

    for i in 0..arity {
        declarations.push_str(&format!(", $number{i}: Int!, $has{i}: Boolean!"));
        body.push_str(&format!(
            "item{i}: {field}(number: $number{i}) @include(if: $has{i}) {{ {selection} }}\n"
        ));
    }

    format!(
        "query({declarations}) {{\n\
         rateLimit {{ cost remaining }}\n\
         repository(owner: $owner, name: $name) {{\n{body}}} }}"
    )
}

/// Builds the variable map for a numbered query, padding unused slots with
/// `has<i> = false` sentinels.
///
/// # Panics
///
/// Panics if `numbers` exceeds the query arity; the dispatch loop guarantees
/// the bound, so exceeding it is a programming error.
fn numbered_variables(repo: &RepoId, numbers: &[u64], arity: usize) -> Value {
    assert!(
        numbers.len() <= arity,
        "list contains more ({}) than possible ({}) item numbers",
        numbers.len(),
        arity
    );

    let mut variables = serde_json::Map::new();
    variables.insert("owner".to_string(), json!(repo.owner));
    variables.insert("name".to_string(), json!(repo.name));

    for i in 0..arity {
        let (number, has) = match numbers.get(i) {
            Some(n) => (*n, true),
            None => (0, false),
        };
        variables.insert(format!("number{i}"), json!(number));
        variables.insert(format!("has{i}"), json!(has));
    }

    Value::Object(variables)
}

fn list_variables<S: serde::Serialize>(
    repo: &RepoId,
    states: &[S],
    cursor: &str,
) -> Result<Value, ClientError> {
    let states = serde_json::to_value(states)
        .map_err(|err| ClientError::transport(format!("could not encode states: {err}")))?;

    let cursor = if cursor.is_empty() {
        Value::Null
    } else {
        Value::String(cursor.to_string())
    };

    Ok(json!({
        "owner": repo.owner,
        "name": repo.name,
        "states": states,
        "cursor": cursor,
    }))
}

// ─── Response decoding ───

#[derive(Debug, Deserialize)]
struct RateLimitInfo {
    cost: i64,
    remaining: i64,
}

#[derive(Debug, Deserialize)]
struct ApiActor {
    login: String,
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiLabelConnection {
    nodes: Vec<ApiLabel>,
}

impl ApiLabelConnection {
    fn names(self) -> Vec<String> {
        self.nodes.into_iter().map(|l| l.name).collect()
    }
}

#[derive(Debug, Deserialize)]
struct ApiLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPullRequest {
    number: u64,
    state: PrState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author: Option<ApiActor>,
    #[serde(default)]
    labels: ApiLabelConnection,
    #[serde(default)]
    commits: ApiCommitConnection,
}

#[derive(Debug, Default, Deserialize)]
struct ApiCommitConnection {
    nodes: Vec<ApiCommitNode>,
}

#[derive(Debug, Deserialize)]
struct ApiCommitNode {
    commit: ApiCommit,
}

#[derive(Debug, Deserialize)]
struct ApiCommit {
    status: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    contexts: Vec<ApiContext>,
}

#[derive(Debug, Deserialize)]
struct ApiContext {
    context: String,
    state: ContextState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiIssue {
    number: u64,
    state: IssueState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author: Option<ApiActor>,
    #[serde(default)]
    labels: ApiLabelConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMilestone {
    number: u64,
    title: String,
    state: MilestoneState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    due_on: Option<DateTime<Utc>>,
    open_issues: ApiTotalCount,
    closed_issues: ApiTotalCount,
    open_pull_requests: ApiTotalCount,
    closed_pull_requests: ApiTotalCount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTotalCount {
    total_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRepository {
    disk_usage: u64,
    fork_count: u64,
    stargazers: ApiTotalCount,
    watchers: ApiTotalCount,
    is_private: bool,
    is_archived: bool,
    is_disabled: bool,
    is_fork: bool,
    is_locked: bool,
    is_mirror: bool,
    is_template: bool,
    languages: ApiLanguageConnection,
}

#[derive(Debug, Deserialize)]
struct ApiLanguageConnection {
    edges: Vec<ApiLanguageEdge>,
}

#[derive(Debug, Deserialize)]
struct ApiLanguageEdge {
    size: u64,
    node: ApiLanguageNode,
}

#[derive(Debug, Deserialize)]
struct ApiLanguageNode {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPageInfo {
    end_cursor: Option<String>,
    has_next_page: bool,
}

impl ApiPageInfo {
    /// The cursor of the next page, or empty if there is none.
    fn next_cursor(&self) -> String {
        if self.has_next_page {
            self.end_cursor.clone().unwrap_or_default()
        } else {
            String::new()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiListing<T> {
    nodes: Vec<T>,
    page_info: ApiPageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiLabelPage {
    nodes: Vec<ApiLabel>,
    page_info: ApiPageInfo,
}

fn decode_repository_field<T: serde::de::DeserializeOwned>(
    data: &Value,
    repo: &RepoId,
) -> Result<T, ClientError> {
    let field = data.get("repository").filter(|v| !v.is_null());
    let Some(field) = field else {
        return Err(ClientError::not_found(format!(
            "could not resolve repository {repo}"
        )));
    };

    serde_json::from_value(field.clone())
        .map_err(|err| ClientError::transport(format!("could not decode response: {err}")))
}

fn decode_listing<T: serde::de::DeserializeOwned>(
    data: &Value,
    connection: &str,
    repo: &RepoId,
) -> Result<ApiListing<T>, ClientError> {
    let field = data
        .pointer(&format!("/repository/{connection}"))
        .filter(|v| !v.is_null());

    let Some(field) = field else {
        return Err(ClientError::not_found(format!(
            "could not resolve {connection} of {repo}"
        )));
    };

    serde_json::from_value(field.clone())
        .map_err(|err| ClientError::transport(format!("could not decode response: {err}")))
}

/// Collects the non-null `item<i>` aliases of a numbered query.
fn decode_numbered_items<T: serde::de::DeserializeOwned>(
    data: &Value,
    arity: usize,
) -> Result<Vec<T>, ClientError> {
    let Some(repository) = data.get("repository").filter(|v| !v.is_null()) else {
        return Err(ClientError::not_found("could not resolve repository"));
    };

    let mut items = Vec::new();
    for i in 0..arity {
        if let Some(item) = repository.get(format!("item{i}")).filter(|v| !v.is_null()) {
            let item = serde_json::from_value(item.clone()).map_err(|err| {
                ClientError::transport(format!("could not decode response: {err}"))
            })?;
            items.push(item);
        }
    }

    Ok(items)
}

/// Returns true if a GraphQL error object denotes a missing item rather than
/// a failed request.
fn is_not_found_error(error: &Value) -> bool {
    if error.get("type").and_then(Value::as_str) == Some("NOT_FOUND") {
        return true;
    }

    error
        .get("message")
        .and_then(Value::as_str)
        .is_some_and(|m| m.contains("Could not resolve to a"))
}

fn classify_graphql_error(message: &str) -> ClientError {
    let lower = message.to_lowercase();
    if lower.contains("rate limit") || lower.contains("ratelimited") {
        ClientError::rate_limited(message)
    } else {
        ClientError::transport(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_query_declares_exact_arity() {
        let query = numbered_query("pullRequest", PR_SELECTION, 3);

        assert!(query.contains("$number0: Int!, $has0: Boolean!"));
        assert!(query.contains("$number2: Int!, $has2: Boolean!"));
        assert!(!query.contains("$number3"));
        assert!(query.contains("item0: pullRequest(number: $number0) @include(if: $has0)"));
        assert!(query.contains("rateLimit { cost remaining }"));
    }

    #[test]
    fn numbered_variables_pad_with_sentinels() {
        let repo = RepoId::new("owner", "repo");
        let variables = numbered_variables(&repo, &[17, 23], 4);

        assert_eq!(variables["number0"], json!(17));
        assert_eq!(variables["has0"], json!(true));
        assert_eq!(variables["number1"], json!(23));
        assert_eq!(variables["has1"], json!(true));
        assert_eq!(variables["number2"], json!(0));
        assert_eq!(variables["has2"], json!(false));
        assert_eq!(variables["has3"], json!(false));
    }

    #[test]
    #[should_panic(expected = "more (5) than possible (4)")]
    fn numbered_variables_panic_beyond_arity() {
        let repo = RepoId::new("owner", "repo");
        numbered_variables(&repo, &[1, 2, 3, 4, 5], 4);
    }

    #[test]
    fn not_found_errors_are_recognized() {
        assert!(is_not_found_error(&json!({
            "type": "NOT_FOUND",
            "message": "Could not resolve to a PullRequest with the number of 99."
        })));
        assert!(is_not_found_error(&json!({
            "message": "Could not resolve to a Milestone with the number of 3."
        })));
        assert!(!is_not_found_error(&json!({
            "message": "Something went wrong"
        })));
    }

    #[test]
    fn decode_numbered_items_skips_null_aliases() {
        let data = json!({
            "repository": {
                "item0": { "name": "bug" },
                "item1": null,
                "item2": { "name": "feature" },
            }
        });

        let items: Vec<ApiLabel> = decode_numbered_items(&data, 3).unwrap();
        let names: Vec<String> = items.into_iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["bug".to_string(), "feature".to_string()]);
    }

    #[test]
    fn decode_pull_request_node() {
        let node = json!({
            "number": 42,
            "state": "OPEN",
            "createdAt": "2024-03-01T12:00:00Z",
            "updatedAt": "2024-03-02T08:30:00Z",
            "author": { "login": "octocat", "id": "MDQ6VXNlcjE=" },
            "labels": { "nodes": [ { "name": "lgtm" }, { "name": "size/M" } ] },
            "commits": { "nodes": [ { "commit": { "status": {
                "contexts": [ { "context": "ci/test", "state": "SUCCESS" } ]
            } } } ] }
        });

        let api: ApiPullRequest = serde_json::from_value(node).unwrap();
        assert_eq!(api.number, 42);
        assert_eq!(api.state, PrState::Open);
        assert_eq!(api.labels.nodes.len(), 2);
        assert_eq!(api.commits.nodes[0].commit.status.as_ref().unwrap().contexts[0].state,
            ContextState::Success);
    }

    #[test]
    fn decode_pull_request_without_status() {
        let node = json!({
            "number": 7,
            "state": "MERGED",
            "createdAt": "2024-03-01T12:00:00Z",
            "updatedAt": "2024-03-02T08:30:00Z",
            "author": null,
            "labels": { "nodes": [] },
            "commits": { "nodes": [ { "commit": { "status": null } } ] }
        });

        let api: ApiPullRequest = serde_json::from_value(node).unwrap();
        assert!(api.author.is_none());
        assert!(api.commits.nodes[0].commit.status.is_none());
    }

    #[test]
    fn page_info_next_cursor() {
        let more = ApiPageInfo {
            end_cursor: Some("abc".to_string()),
            has_next_page: true,
        };
        assert_eq!(more.next_cursor(), "abc");

        let done = ApiPageInfo {
            end_cursor: Some("abc".to_string()),
            has_next_page: false,
        };
        assert_eq!(done.next_cursor(), "");
    }
}
