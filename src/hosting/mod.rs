//! Code-hosting service abstraction
//!
//! The release engine talks to the hosting service (pull requests, labels, milestones,
//! releases) only through [`CodeHosting`]. Implementations:
//!
//! - [github::GitHubClient]: GitHub REST v3 over a blocking HTTP client
//! - [mock::MockHosting]: in-memory implementation for tests
//!
//! Every method takes the repository name; the owner/organization is a property of the
//! implementation.

pub mod github;
pub mod mock;

pub use github::GitHubClient;
pub use mock::MockHosting;

use crate::domain::{
    Issue, Milestone, NewPullRequest, NewRelease, PullRequest, PullRequestFilter, Release, State,
    Version,
};
use crate::error::Result;

/// Operations the release engine needs from the hosting service
///
/// Implementors must be `Send + Sync`: pull requests of one changelog window are fetched
/// from a worker pool.
///
/// Errors map to [crate::error::ReleaseError::NotFound],
/// [crate::error::ReleaseError::RateLimited] or [crate::error::ReleaseError::Api].
pub trait CodeHosting: Send + Sync {
    /// Fetch a single pull request by number
    fn pull_request(&self, repo: &str, number: u64) -> Result<PullRequest>;

    /// List pull requests matching the filter
    fn pull_requests(&self, repo: &str, filter: &PullRequestFilter) -> Result<Vec<PullRequest>>;

    /// Merge a pull request with a merge commit; `Ok(false)` when it is not mergeable
    fn merge_pull_request(&self, repo: &str, number: u64) -> Result<bool>;

    fn create_pull_request(&self, repo: &str, request: &NewPullRequest) -> Result<PullRequest>;

    fn milestones(&self, repo: &str, state: State) -> Result<Vec<Milestone>>;

    fn create_milestone(&self, repo: &str, title: &str) -> Result<Milestone>;

    fn update_milestone_state(&self, repo: &str, number: u64, state: State) -> Result<()>;

    /// Issues and pull requests assigned to a milestone
    fn milestone_issues(&self, repo: &str, milestone: u64, state: State) -> Result<Vec<Issue>>;

    fn add_labels(&self, repo: &str, issue: u64, labels: &[&str]) -> Result<()>;

    fn releases(&self, repo: &str) -> Result<Vec<Release>>;

    /// Latest non-prerelease, non-draft release
    fn latest_release(&self, repo: &str) -> Result<Release>;

    fn create_release(&self, repo: &str, release: &NewRelease) -> Result<Release>;
}

/// Find an open milestone by its exact title
pub fn milestone_by_title(
    hosting: &dyn CodeHosting,
    repo: &str,
    title: &str,
) -> Result<Option<Milestone>> {
    Ok(hosting
        .milestones(repo, State::Open)?
        .into_iter()
        .find(|milestone| milestone.title == title))
}

/// Version of the newest published release, parsed from its `v`-prefixed tag
pub fn latest_version(
    hosting: &dyn CodeHosting,
    repo: &str,
    include_prereleases: bool,
) -> Result<Option<Version>> {
    if !include_prereleases {
        let release = hosting.latest_release(repo)?;
        return Ok(version_from_tag(&release.tag_name));
    }
    Ok(hosting
        .releases(repo)?
        .iter()
        .filter(|release| !release.draft)
        .filter_map(|release| version_from_tag(&release.tag_name))
        .max())
}

fn version_from_tag(tag: &str) -> Option<Version> {
    Version::parse(tag.strip_prefix('v').unwrap_or(tag)).ok()
}
