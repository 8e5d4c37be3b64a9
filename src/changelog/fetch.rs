//! Pull request lookup: commit-subject parsing, per-project cache, parallel fetch.

use crate::domain::PullRequest;
use crate::error::Result;
use crate::hosting::CodeHosting;
use rayon::prelude::*;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, RwLock};

fn pr_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^.+\(#(\d+)\)$").expect("valid PR suffix pattern"))
}

/// Extract pull request numbers from commit subjects.
///
/// Consecutive identical subjects are collapsed, subjects without a trailing
/// `(#NNN)` are skipped, and each number is kept once at its first position.
pub fn parse_pr_numbers<S: AsRef<str>>(subjects: &[S]) -> Vec<u64> {
    let mut seen = HashSet::new();
    let mut previous: Option<&str> = None;
    let mut numbers = Vec::new();

    for subject in subjects {
        let subject = subject.as_ref().trim();
        if previous == Some(subject) {
            continue;
        }
        previous = Some(subject);

        let Some(captures) = pr_suffix().captures(subject) else {
            continue;
        };
        if let Ok(number) = captures[1].parse::<u64>() {
            if seen.insert(number) {
                numbers.push(number);
            }
        }
    }
    numbers
}

/// Pull requests fetched during this run, keyed by number
///
/// Shared read access; a number is written at most once.
#[derive(Default)]
pub struct PullRequestCache {
    entries: RwLock<HashMap<u64, Arc<PullRequest>>>,
}

impl PullRequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, number: u64) -> Option<Arc<PullRequest>> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(&number).cloned())
    }

    /// Store a pull request, keeping an existing entry for the same number
    pub fn insert(&self, pr: PullRequest) -> Arc<PullRequest> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .entry(pr.number)
            .or_insert_with(|| Arc::new(pr))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached pull request, fetching it from the hosting service on a miss
    pub fn get_or_fetch(
        &self,
        hosting: &dyn CodeHosting,
        repo: &str,
        number: u64,
    ) -> Result<Arc<PullRequest>> {
        if let Some(pr) = self.get(number) {
            tracing::debug!(repo, number, "PR cache hit");
            return Ok(pr);
        }
        let pr = hosting.pull_request(repo, number)?;
        Ok(self.insert(pr))
    }
}

/// Fetch every numbered pull request, in input order.
///
/// Runs on the rayon pool; the first failure is returned.
pub fn fetch_all(
    hosting: &dyn CodeHosting,
    repo: &str,
    cache: &PullRequestCache,
    numbers: &[u64],
) -> Result<Vec<Arc<PullRequest>>> {
    tracing::info!(repo, count = numbers.len(), "Fetching pull requests");
    numbers
        .par_iter()
        .map(|&number| cache.get_or_fetch(hosting, repo, number))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Author, State};
    use crate::hosting::MockHosting;

    fn pr(number: u64) -> PullRequest {
        PullRequest {
            number,
            title: format!("Change {}", number),
            author: Author::new("dev"),
            merged_at: None,
            labels: Vec::new(),
            milestone: None,
            body: None,
            state: State::Closed,
            base: "dev".to_string(),
            head: format!("branch-{}", number),
            html_url: String::new(),
            merge_commit_sha: None,
        }
    }

    #[test]
    fn test_parse_pr_numbers() {
        let subjects = [
            "Add sensor (#12)",
            "Add sensor (#12)",
            "Merge branch 'dev' into beta",
            "Fix wifi (#13)",
            "Revert \"Add sensor (#12)\" (#14)",
            "Bump version to 1.2.3",
            "Cherry-pick of fix (#13)",
        ];
        assert_eq!(parse_pr_numbers(&subjects), vec![12, 13, 14]);
    }

    #[test]
    fn test_parse_requires_trailing_suffix() {
        let subjects = ["(#12) at the start", "Middle (#13) text"];
        assert!(parse_pr_numbers(&subjects).is_empty());
    }

    #[test]
    fn test_fetch_all_preserves_order_and_fetches_once() {
        let hosting = MockHosting::new();
        for number in 1..=20 {
            hosting.add_pull_request("esphome", pr(number));
        }
        let cache = PullRequestCache::new();
        let numbers: Vec<u64> = (1..=20).rev().collect();

        let first = fetch_all(&hosting, "esphome", &cache, &numbers).unwrap();
        let second = fetch_all(&hosting, "esphome", &cache, &numbers).unwrap();

        let fetched: Vec<u64> = first.iter().map(|pr| pr.number).collect();
        assert_eq!(fetched, numbers);
        assert_eq!(second.len(), 20);
        for number in 1..=20 {
            assert_eq!(hosting.fetch_count("esphome", number), 1);
        }
        assert_eq!(cache.len(), 20);
    }

    #[test]
    fn test_fetch_all_propagates_failure() {
        let hosting = MockHosting::new();
        hosting.add_pull_request("esphome", pr(1));
        let cache = PullRequestCache::new();
        assert!(fetch_all(&hosting, "esphome", &cache, &[1, 2]).is_err());
    }

    #[test]
    fn test_insert_keeps_first_entry() {
        let cache = PullRequestCache::new();
        cache.insert(pr(5));
        let mut changed = pr(5);
        changed.title = "Other".to_string();
        let stored = cache.insert(changed);
        assert_eq!(stored.title, "Change 5");
    }
}
