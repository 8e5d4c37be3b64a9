use crate::domain::{
    Issue, Milestone, NewPullRequest, NewRelease, PullRequest, PullRequestFilter, Release, State,
};
use crate::error::{ReleaseError, Result};
use crate::hosting::CodeHosting;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MockState {
    pulls: BTreeMap<(String, u64), PullRequest>,
    fetches: HashMap<(String, u64), usize>,
    milestones: Vec<(String, Milestone)>,
    milestone_issues: HashMap<(String, u64), Vec<Issue>>,
    releases: HashMap<String, Vec<Release>>,
    created_pulls: Vec<(String, NewPullRequest)>,
    created_releases: Vec<(String, NewRelease)>,
    merged: Vec<(String, u64)>,
    labels_added: Vec<(String, u64, String)>,
    next_number: u64,
}

/// In-memory hosting service for tests
///
/// Records every mutating call so tests can assert on them.
pub struct MockHosting {
    state: Mutex<MockState>,
}

impl MockHosting {
    /// Create a new empty mock hosting service
    pub fn new() -> Self {
        MockHosting {
            state: Mutex::new(MockState {
                next_number: 1000,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_pull_request(&self, repo: &str, pr: PullRequest) {
        self.lock().pulls.insert((repo.to_string(), pr.number), pr);
    }

    /// Add an open milestone and return its number
    pub fn add_milestone(&self, repo: &str, title: &str) -> u64 {
        let mut state = self.lock();
        state.next_number += 1;
        let number = state.next_number;
        state.milestones.push((
            repo.to_string(),
            Milestone {
                number,
                title: title.to_string(),
                state: State::Open,
            },
        ));
        number
    }

    pub fn add_milestone_issue(&self, repo: &str, milestone: u64, issue: Issue) {
        self.lock()
            .milestone_issues
            .entry((repo.to_string(), milestone))
            .or_default()
            .push(issue);
    }

    pub fn add_release(&self, repo: &str, release: Release) {
        self.lock()
            .releases
            .entry(repo.to_string())
            .or_default()
            .push(release);
    }

    /// How many times a pull request was fetched by number
    pub fn fetch_count(&self, repo: &str, number: u64) -> usize {
        self.lock()
            .fetches
            .get(&(repo.to_string(), number))
            .copied()
            .unwrap_or(0)
    }

    pub fn milestone_titles(&self, repo: &str, state: State) -> Vec<String> {
        self.lock()
            .milestones
            .iter()
            .filter(|(r, m)| r == repo && m.state == state)
            .map(|(_, m)| m.title.clone())
            .collect()
    }

    pub fn created_pull_requests(&self) -> Vec<(String, NewPullRequest)> {
        self.lock().created_pulls.clone()
    }

    pub fn created_releases(&self) -> Vec<(String, NewRelease)> {
        self.lock().created_releases.clone()
    }

    pub fn merged(&self) -> Vec<(String, u64)> {
        self.lock().merged.clone()
    }

    pub fn labels_added(&self) -> Vec<(String, u64, String)> {
        self.lock().labels_added.clone()
    }
}

impl Default for MockHosting {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeHosting for MockHosting {
    fn pull_request(&self, repo: &str, number: u64) -> Result<PullRequest> {
        let mut state = self.lock();
        let key = (repo.to_string(), number);
        *state.fetches.entry(key.clone()).or_default() += 1;
        state
            .pulls
            .get(&key)
            .cloned()
            .ok_or_else(|| ReleaseError::NotFound(format!("{}#{}", repo, number)))
    }

    fn pull_requests(&self, repo: &str, filter: &PullRequestFilter) -> Result<Vec<PullRequest>> {
        Ok(self
            .lock()
            .pulls
            .iter()
            .filter(|((r, _), _)| r == repo)
            .map(|(_, pr)| pr)
            .filter(|pr| filter.head.as_ref().map_or(true, |head| &pr.head == head))
            .filter(|pr| filter.base.as_ref().map_or(true, |base| &pr.base == base))
            .filter(|pr| filter.state.map_or(true, |state| pr.state == state))
            .cloned()
            .collect())
    }

    fn merge_pull_request(&self, repo: &str, number: u64) -> Result<bool> {
        let mut state = self.lock();
        let key = (repo.to_string(), number);
        let pr = state
            .pulls
            .get_mut(&key)
            .ok_or_else(|| ReleaseError::NotFound(format!("{}#{}", repo, number)))?;
        pr.state = State::Closed;
        pr.merged_at = Some(chrono::Utc::now());
        state.merged.push(key);
        Ok(true)
    }

    fn create_pull_request(&self, repo: &str, request: &NewPullRequest) -> Result<PullRequest> {
        let mut state = self.lock();
        state.next_number += 1;
        let number = state.next_number;
        let pr = PullRequest {
            number,
            title: request.title.clone(),
            author: crate::domain::Author::new("release-bot"),
            merged_at: None,
            labels: Vec::new(),
            milestone: None,
            body: Some(request.body.clone()),
            state: State::Open,
            base: request.base.clone(),
            head: request.head.clone(),
            html_url: format!("https://github.com/mock/{}/pull/{}", repo, number),
            merge_commit_sha: None,
        };
        state.pulls.insert((repo.to_string(), number), pr.clone());
        state.created_pulls.push((repo.to_string(), request.clone()));
        Ok(pr)
    }

    fn milestones(&self, repo: &str, state: State) -> Result<Vec<Milestone>> {
        Ok(self
            .lock()
            .milestones
            .iter()
            .filter(|(r, m)| r == repo && m.state == state)
            .map(|(_, m)| m.clone())
            .collect())
    }

    fn create_milestone(&self, repo: &str, title: &str) -> Result<Milestone> {
        let number = self.add_milestone(repo, title);
        Ok(Milestone {
            number,
            title: title.to_string(),
            state: State::Open,
        })
    }

    fn update_milestone_state(&self, repo: &str, number: u64, state: State) -> Result<()> {
        let mut inner = self.lock();
        let milestone = inner
            .milestones
            .iter_mut()
            .find(|(r, m)| r == repo && m.number == number)
            .ok_or_else(|| ReleaseError::NotFound(format!("{} milestone {}", repo, number)))?;
        milestone.1.state = state;
        Ok(())
    }

    fn milestone_issues(&self, repo: &str, milestone: u64, _state: State) -> Result<Vec<Issue>> {
        Ok(self
            .lock()
            .milestone_issues
            .get(&(repo.to_string(), milestone))
            .cloned()
            .unwrap_or_default())
    }

    fn add_labels(&self, repo: &str, issue: u64, labels: &[&str]) -> Result<()> {
        let mut state = self.lock();
        for label in labels {
            state
                .labels_added
                .push((repo.to_string(), issue, label.to_string()));
            if let Some(pr) = state.pulls.get_mut(&(repo.to_string(), issue)) {
                pr.labels.push(label.to_string());
            }
        }
        Ok(())
    }

    fn releases(&self, repo: &str) -> Result<Vec<Release>> {
        Ok(self.lock().releases.get(repo).cloned().unwrap_or_default())
    }

    fn latest_release(&self, repo: &str) -> Result<Release> {
        self.lock()
            .releases
            .get(repo)
            .and_then(|releases| {
                releases
                    .iter()
                    .rev()
                    .find(|release| !release.prerelease && !release.draft)
                    .cloned()
            })
            .ok_or_else(|| ReleaseError::NotFound(format!("latest release of {}", repo)))
    }

    fn create_release(&self, repo: &str, release: &NewRelease) -> Result<Release> {
        let created = Release {
            tag_name: release.tag_name.clone(),
            name: Some(release.name.clone()),
            html_url: format!(
                "https://github.com/mock/{}/releases/tag/{}",
                repo, release.tag_name
            ),
            prerelease: release.prerelease,
            draft: release.draft,
        };
        let mut state = self.lock();
        state
            .releases
            .entry(repo.to_string())
            .or_default()
            .push(created.clone());
        state
            .created_releases
            .push((repo.to_string(), release.clone()));
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_pull_request_is_not_found() {
        let hosting = MockHosting::new();
        let err = hosting.pull_request("esphome", 1).unwrap_err();
        assert!(matches!(err, ReleaseError::NotFound(_)));
        assert_eq!(hosting.fetch_count("esphome", 1), 1);
    }

    #[test]
    fn test_milestone_lifecycle() {
        let hosting = MockHosting::new();
        let number = hosting.add_milestone("esphome", "1.0.1");
        hosting
            .update_milestone_state("esphome", number, State::Closed)
            .unwrap();
        assert!(hosting.milestone_titles("esphome", State::Open).is_empty());
        assert_eq!(
            hosting.milestone_titles("esphome", State::Closed),
            vec!["1.0.1".to_string()]
        );
    }
}
