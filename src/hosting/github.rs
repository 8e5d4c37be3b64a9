//! GitHub REST v3 client

use crate::domain::{
    Author, Issue, Milestone, NewPullRequest, NewRelease, PullRequest, PullRequestFilter, Release,
    State,
};
use crate::error::{ReleaseError, Result};
use crate::hosting::CodeHosting;
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiPullRequest {
    number: u64,
    title: String,
    user: ApiUser,
    merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    labels: Vec<ApiLabel>,
    milestone: Option<Milestone>,
    body: Option<String>,
    state: State,
    base: ApiRef,
    head: ApiRef,
    html_url: String,
    merge_commit_sha: Option<String>,
}

impl From<ApiPullRequest> for PullRequest {
    fn from(api: ApiPullRequest) -> Self {
        PullRequest {
            number: api.number,
            title: api.title,
            author: Author {
                login: api.user.login,
                html_url: api.user.html_url,
            },
            merged_at: api.merged_at,
            labels: api.labels.into_iter().map(|label| label.name).collect(),
            milestone: api.milestone,
            body: api.body,
            state: api.state,
            base: api.base.name,
            head: api.head.name,
            html_url: api.html_url,
            merge_commit_sha: api.merge_commit_sha,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiIssue {
    number: u64,
    title: String,
    #[serde(default)]
    labels: Vec<ApiLabel>,
}

#[derive(Debug, Deserialize)]
struct ApiRelease {
    tag_name: String,
    name: Option<String>,
    html_url: String,
    prerelease: bool,
    draft: bool,
}

impl From<ApiRelease> for Release {
    fn from(api: ApiRelease) -> Self {
        Release {
            tag_name: api.tag_name,
            name: api.name,
            html_url: api.html_url,
            prerelease: api.prerelease,
            draft: api.draft,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiMergeResult {
    merged: bool,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiRateLimit {
    rate: ApiRate,
}

#[derive(Debug, Deserialize)]
struct ApiRate {
    limit: u64,
    remaining: u64,
    reset: i64,
}

/// Blocking GitHub client scoped to one organization
pub struct GitHubClient {
    client: Client,
    api_base: String,
    owner: String,
}

impl GitHubClient {
    pub fn new(owner: impl Into<String>, token: Option<&str>) -> Result<Self> {
        Self::with_api_base(owner, token, DEFAULT_API_BASE)
    }

    /// Client against a non-default API root (GitHub Enterprise, test servers)
    pub fn with_api_base(
        owner: impl Into<String>,
        token: Option<&str>,
        api_base: impl Into<String>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("esphome-release"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ReleaseError::config("GitHub token contains invalid characters"))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(GitHubClient {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            owner: owner.into(),
        })
    }

    fn repo_url(&self, repo: &str, path: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_base, self.owner, repo, path)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send()?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let remaining = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().unwrap_or_default();
        Err(status_error(
            status.as_u16(),
            remaining.as_deref(),
            &url,
            &body,
        ))
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        Ok(self.send(self.client.get(url))?.json()?)
    }

    fn get_paginated<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1usize;
        loop {
            let mut params = query.to_vec();
            params.push(("per_page", PER_PAGE.to_string()));
            params.push(("page", page.to_string()));

            let batch: Vec<T> = self.send(self.client.get(url).query(&params))?.json()?;
            let count = batch.len();
            items.extend(batch);
            if count < PER_PAGE {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    /// Log the remaining API quota
    pub fn log_rate_limit(&self) -> Result<()> {
        let limit: ApiRateLimit = self.get_json(&format!("{}/rate_limit", self.api_base))?;
        let reset = DateTime::<Utc>::from_timestamp(limit.rate.reset, 0)
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| limit.rate.reset.to_string());
        tracing::info!(
            remaining = limit.rate.remaining,
            limit = limit.rate.limit,
            reset = %reset,
            "GitHub API rate limit"
        );
        Ok(())
    }
}

/// Map a non-success response onto the error taxonomy
fn status_error(status: u16, remaining: Option<&str>, url: &str, body: &str) -> ReleaseError {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|error| error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        404 => ReleaseError::NotFound(url.to_string()),
        429 => ReleaseError::RateLimited(message),
        403 if remaining == Some("0") => ReleaseError::RateLimited(message),
        _ => ReleaseError::Api { status, message },
    }
}

impl CodeHosting for GitHubClient {
    fn pull_request(&self, repo: &str, number: u64) -> Result<PullRequest> {
        tracing::debug!(repo, number, "Fetching pull request");
        let pr: ApiPullRequest = self.get_json(&self.repo_url(repo, &format!("pulls/{}", number)))?;
        Ok(pr.into())
    }

    fn pull_requests(&self, repo: &str, filter: &PullRequestFilter) -> Result<Vec<PullRequest>> {
        let mut query = vec![(
            "state",
            filter.state.map_or("all", |state| state.as_str()).to_string(),
        )];
        if let Some(head) = &filter.head {
            query.push(("head", format!("{}:{}", self.owner, head)));
        }
        if let Some(base) = &filter.base {
            query.push(("base", base.clone()));
        }
        let pulls: Vec<ApiPullRequest> =
            self.get_paginated(&self.repo_url(repo, "pulls"), &query)?;
        Ok(pulls.into_iter().map(PullRequest::from).collect())
    }

    fn merge_pull_request(&self, repo: &str, number: u64) -> Result<bool> {
        let request = self
            .client
            .put(self.repo_url(repo, &format!("pulls/{}/merge", number)))
            .json(&json!({ "merge_method": "merge" }));
        match self.send(request) {
            Ok(response) => Ok(response.json::<ApiMergeResult>()?.merged),
            Err(ReleaseError::Api { status: 405, message }) => {
                tracing::warn!(repo, number, %message, "Pull request is not mergeable");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    fn create_pull_request(&self, repo: &str, request: &NewPullRequest) -> Result<PullRequest> {
        let response = self.send(self.client.post(self.repo_url(repo, "pulls")).json(request))?;
        let pr: ApiPullRequest = response.json()?;
        Ok(pr.into())
    }

    fn milestones(&self, repo: &str, state: State) -> Result<Vec<Milestone>> {
        self.get_paginated(
            &self.repo_url(repo, "milestones"),
            &[("state", state.as_str().to_string())],
        )
    }

    fn create_milestone(&self, repo: &str, title: &str) -> Result<Milestone> {
        let response = self.send(
            self.client
                .post(self.repo_url(repo, "milestones"))
                .json(&json!({ "title": title })),
        )?;
        Ok(response.json()?)
    }

    fn update_milestone_state(&self, repo: &str, number: u64, state: State) -> Result<()> {
        self.send(
            self.client
                .patch(self.repo_url(repo, &format!("milestones/{}", number)))
                .json(&json!({ "state": state })),
        )?;
        Ok(())
    }

    fn milestone_issues(&self, repo: &str, milestone: u64, state: State) -> Result<Vec<Issue>> {
        let issues: Vec<ApiIssue> = self.get_paginated(
            &self.repo_url(repo, "issues"),
            &[
                ("milestone", milestone.to_string()),
                ("state", state.as_str().to_string()),
            ],
        )?;
        Ok(issues
            .into_iter()
            .map(|issue| Issue {
                number: issue.number,
                title: issue.title,
                labels: issue.labels.into_iter().map(|label| label.name).collect(),
            })
            .collect())
    }

    fn add_labels(&self, repo: &str, issue: u64, labels: &[&str]) -> Result<()> {
        self.send(
            self.client
                .post(self.repo_url(repo, &format!("issues/{}/labels", issue)))
                .json(&json!({ "labels": labels })),
        )?;
        Ok(())
    }

    fn releases(&self, repo: &str) -> Result<Vec<Release>> {
        let releases: Vec<ApiRelease> = self.get_paginated(&self.repo_url(repo, "releases"), &[])?;
        Ok(releases.into_iter().map(Release::from).collect())
    }

    fn latest_release(&self, repo: &str) -> Result<Release> {
        let release: ApiRelease = self.get_json(&self.repo_url(repo, "releases/latest"))?;
        Ok(release.into())
    }

    fn create_release(&self, repo: &str, release: &NewRelease) -> Result<Release> {
        let response = self.send(
            self.client
                .post(self.repo_url(repo, "releases"))
                .json(release),
        )?;
        let created: ApiRelease = response.json()?;
        Ok(created.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PULL_JSON: &str = r#"{
        "number": 6001,
        "title": "Add sensor",
        "user": {"login": "jesserockz", "html_url": "https://github.com/jesserockz"},
        "merged_at": "2024-06-19T10:00:00Z",
        "labels": [{"name": "new-feature"}, {"name": "cherry-picked"}],
        "milestone": {"number": 12, "title": "2024.6.1", "state": "open"},
        "body": null,
        "state": "closed",
        "base": {"ref": "dev"},
        "head": {"ref": "add-sensor"},
        "html_url": "https://github.com/esphome/esphome/pull/6001",
        "merge_commit_sha": "abc123",
        "extra_field": true
    }"#;

    #[test]
    fn test_pull_request_dto_conversion() {
        let api: ApiPullRequest = serde_json::from_str(PULL_JSON).unwrap();
        let pr = PullRequest::from(api);
        assert_eq!(pr.number, 6001);
        assert_eq!(pr.author.login, "jesserockz");
        assert_eq!(pr.labels, vec!["new-feature", "cherry-picked"]);
        assert_eq!(pr.milestone.unwrap().title, "2024.6.1");
        assert_eq!(pr.base, "dev");
        assert_eq!(pr.head, "add-sensor");
        assert!(pr.merged_at.is_some());
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(404, None, "https://x", "{\"message\":\"Not Found\"}"),
            ReleaseError::NotFound(_)
        ));
        assert!(matches!(
            status_error(403, Some("0"), "https://x", "{\"message\":\"API rate limit exceeded\"}"),
            ReleaseError::RateLimited(_)
        ));
        assert!(matches!(
            status_error(429, None, "https://x", ""),
            ReleaseError::RateLimited(_)
        ));
        match status_error(403, Some("4999"), "https://x", "{\"message\":\"Forbidden\"}") {
            ReleaseError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Forbidden");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_repo_url_uses_owner() {
        let client = GitHubClient::with_api_base("esphome", None, "http://localhost:1/").unwrap();
        assert_eq!(
            client.repo_url("esphome-docs", "pulls/5"),
            "http://localhost:1/repos/esphome/esphome-docs/pulls/5"
        );
    }
}
