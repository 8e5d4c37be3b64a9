//! Source-control abstraction layer
//!
//! The orchestrator drives each project's local working copy through the
//! [SourceControl] trait. Implementations:
//!
//! - [repository::GitWorkingCopy]: `git2` for read queries, the system `git`
//!   binary for mutating commands
//! - [mock::MockSourceControl]: an in-memory recorder for tests
//!
//! Every failing command surfaces as [crate::error::ReleaseError::CommandFailed]
//! carrying the captured stderr, which the orchestrator classifies as recoverable
//! by a human.

pub mod command;
pub mod mock;
pub mod repository;

pub use command::GitCommand;
pub use mock::MockSourceControl;
pub use repository::GitWorkingCopy;

use crate::error::Result;
use std::fmt;

/// Merge strategy option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    #[default]
    Default,
    /// Resolve conflicting hunks in favour of the current branch (`-X ours`)
    Ours,
    /// Resolve conflicting hunks in favour of the merged branch (`-X theirs`)
    Theirs,
}

impl MergeStrategy {
    /// Value for `git merge -X`
    pub fn option(&self) -> Option<&'static str> {
        match self {
            MergeStrategy::Default => None,
            MergeStrategy::Ours => Some("ours"),
            MergeStrategy::Theirs => Some("theirs"),
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.option().unwrap_or("default"))
    }
}

/// Operations on one local working copy
///
/// All implementors must be `Send + Sync`: projects are held in a shared
/// release context.
pub trait SourceControl: Send + Sync {
    fn current_branch(&self) -> Result<String>;

    fn branch_exists(&self, branch: &str) -> Result<bool>;

    fn checkout(&self, branch: &str) -> Result<()>;

    /// Create `branch` from the current HEAD and switch to it
    fn checkout_new_branch(&self, branch: &str) -> Result<()>;

    fn delete_branch(&self, branch: &str) -> Result<()>;

    fn merge(&self, branch: &str, strategy: MergeStrategy) -> Result<()>;

    fn cherry_pick(&self, commit: &str) -> Result<()>;

    /// Stage every change in the working tree
    fn add_all(&self) -> Result<()>;

    /// Commit staged changes; returns `false` when there was nothing to commit
    /// and `ignore_if_empty` is set
    fn commit(&self, message: &str, ignore_if_empty: bool) -> Result<bool>;

    /// Push `branch` to origin; with `tags` also pushes tags
    fn push(&self, branch: &str, tags: bool) -> Result<()>;

    /// Pull the current branch from origin
    fn pull(&self) -> Result<()>;

    fn fetch(&self) -> Result<()>;

    /// `true` when the working tree or index differ from HEAD
    fn has_local_changes(&self) -> Result<bool>;

    /// Diffstat of `base..head` for human review
    fn diff(&self, base: &str, head: &str) -> Result<String>;

    /// Subject lines of the commits reachable from `head` but not from `base`,
    /// oldest first
    fn log_subjects(&self, base: &str, head: &str) -> Result<Vec<String>>;

    fn reset(&self, target: &str, hard: bool) -> Result<()>;
}
