use crate::error::{ReleaseError, Result};
use crate::git::{MergeStrategy, SourceControl};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MockState {
    current: String,
    branches: HashSet<String>,
    subjects: HashMap<(String, String), Vec<String>>,
    operations: Vec<String>,
    failures: HashMap<String, usize>,
    dirty: bool,
    staged: bool,
}

/// Mock working copy for testing without actual git operations
///
/// Every call is recorded as a `git`-like command line, e.g. `checkout beta`
/// or `merge dev (ours)`. Clones share state, so a test can keep a handle to
/// a mock it moved into a project.
#[derive(Clone)]
pub struct MockSourceControl {
    state: Arc<Mutex<MockState>>,
}

impl MockSourceControl {
    /// Create a mock with the given branches, checked out on the first one
    pub fn new(branches: &[&str]) -> Self {
        let current = branches.first().copied().unwrap_or("dev").to_string();
        MockSourceControl {
            state: Arc::new(Mutex::new(MockState {
                current,
                branches: branches.iter().map(|b| b.to_string()).collect(),
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subjects returned by `log_subjects(base, head)`
    pub fn set_subjects(&self, base: &str, head: &str, subjects: &[&str]) {
        self.lock().subjects.insert(
            (base.to_string(), head.to_string()),
            subjects.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Make the next `times` operations starting with `prefix` fail
    pub fn fail_on(&self, prefix: &str, times: usize) {
        self.lock().failures.insert(prefix.to_string(), times);
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.lock().dirty = dirty;
    }

    /// Pretend the next commit has staged changes
    pub fn stage_changes(&self) {
        self.lock().staged = true;
    }

    pub fn operations(&self) -> Vec<String> {
        self.lock().operations.clone()
    }

    fn record(&self, operation: String) -> Result<()> {
        let mut state = self.lock();
        let failing = state
            .failures
            .iter_mut()
            .find(|(prefix, remaining)| **remaining > 0 && operation.starts_with(prefix.as_str()));
        if let Some((_, remaining)) = failing {
            *remaining -= 1;
            return Err(ReleaseError::command_failed(
                format!("git {}", operation),
                "simulated failure",
            ));
        }
        state.operations.push(operation);
        Ok(())
    }
}

impl SourceControl for MockSourceControl {
    fn current_branch(&self) -> Result<String> {
        Ok(self.lock().current.clone())
    }

    fn branch_exists(&self, branch: &str) -> Result<bool> {
        Ok(self.lock().branches.contains(branch))
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        if !self.lock().branches.contains(branch) {
            return Err(ReleaseError::command_failed(
                format!("git checkout {}", branch),
                format!("error: pathspec '{}' did not match", branch),
            ));
        }
        self.record(format!("checkout {}", branch))?;
        self.lock().current = branch.to_string();
        Ok(())
    }

    fn checkout_new_branch(&self, branch: &str) -> Result<()> {
        self.record(format!("checkout -b {}", branch))?;
        let mut state = self.lock();
        state.branches.insert(branch.to_string());
        state.current = branch.to_string();
        Ok(())
    }

    fn delete_branch(&self, branch: &str) -> Result<()> {
        self.record(format!("branch -D {}", branch))?;
        self.lock().branches.remove(branch);
        Ok(())
    }

    fn merge(&self, branch: &str, strategy: MergeStrategy) -> Result<()> {
        match strategy.option() {
            None => self.record(format!("merge {}", branch)),
            Some(option) => self.record(format!("merge {} ({})", branch, option)),
        }
    }

    fn cherry_pick(&self, commit: &str) -> Result<()> {
        self.record(format!("cherry-pick {}", commit))
    }

    fn add_all(&self) -> Result<()> {
        self.record("add -A".to_string())
    }

    fn commit(&self, message: &str, ignore_if_empty: bool) -> Result<bool> {
        let staged = std::mem::take(&mut self.lock().staged);
        if ignore_if_empty && !staged {
            return Ok(false);
        }
        self.record(format!("commit {}", message))?;
        Ok(true)
    }

    fn push(&self, branch: &str, tags: bool) -> Result<()> {
        if tags {
            self.record(format!("push {} --tags", branch))
        } else {
            self.record(format!("push {}", branch))
        }
    }

    fn pull(&self) -> Result<()> {
        let current = self.lock().current.clone();
        self.record(format!("pull {}", current))
    }

    fn fetch(&self) -> Result<()> {
        self.record("fetch".to_string())
    }

    fn has_local_changes(&self) -> Result<bool> {
        Ok(self.lock().dirty)
    }

    fn diff(&self, base: &str, head: &str) -> Result<String> {
        Ok(format!("diff {}..{}", base, head))
    }

    fn log_subjects(&self, base: &str, head: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()
            .subjects
            .get(&(base.to_string(), head.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn reset(&self, target: &str, hard: bool) -> Result<()> {
        if hard {
            self.record(format!("reset --hard {}", target))
        } else {
            self.record(format!("reset {}", target))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_tracks_current_branch() {
        let scm = MockSourceControl::new(&["dev", "beta"]);
        assert_eq!(scm.current_branch().unwrap(), "dev");
        scm.checkout("beta").unwrap();
        assert_eq!(scm.current_branch().unwrap(), "beta");
        assert!(scm.checkout("missing").is_err());
        assert_eq!(scm.operations(), vec!["checkout beta"]);
    }

    #[test]
    fn test_fail_on_is_consumed() {
        let scm = MockSourceControl::new(&["dev"]);
        scm.fail_on("cherry-pick", 1);
        assert!(scm.cherry_pick("abc").is_err());
        scm.cherry_pick("abc").unwrap();
        assert_eq!(scm.operations(), vec!["cherry-pick abc"]);
    }

    #[test]
    fn test_empty_commit_is_skipped() {
        let scm = MockSourceControl::new(&["dev"]);
        assert!(!scm.commit("Bump", true).unwrap());
        scm.stage_changes();
        assert!(scm.commit("Bump", true).unwrap());
    }
}
