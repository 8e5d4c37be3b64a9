use crate::error::Result;
use crate::git::{GitCommand, MergeStrategy, SourceControl};
use crate::ui::Confirm;
use git2::{BranchType, ErrorCode, Repository, Sort, StatusOptions};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// A project's local clone
///
/// Queries go through `git2`; anything that changes the working copy or talks
/// to a remote runs the `git` binary, so hooks, credentials and merge drivers
/// behave exactly as on the command line.
pub struct GitWorkingCopy {
    repo: Mutex<Repository>,
    git: GitCommand,
}

impl GitWorkingCopy {
    /// Open the repository rooted at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Repository::open(path.as_ref())?;
        Ok(GitWorkingCopy {
            repo: Mutex::new(repo),
            git: GitCommand::new(path.as_ref()),
        })
    }

    /// Confirm every mutating command before it runs
    pub fn with_step(mut self, prompter: Arc<dyn Confirm>) -> Self {
        self.git = self.git.with_step(prompter);
        self
    }

    fn repo(&self) -> MutexGuard<'_, Repository> {
        self.repo
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn has_staged_changes(&self) -> Result<bool> {
        let repo = self.repo();
        let head_tree = match repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            Err(e) if e.code() == ErrorCode::UnbornBranch => None,
            Err(e) => return Err(e.into()),
        };
        let diff = repo.diff_tree_to_index(head_tree.as_ref(), None, None)?;
        Ok(diff.deltas().len() > 0)
    }
}

impl SourceControl for GitWorkingCopy {
    fn current_branch(&self) -> Result<String> {
        let repo = self.repo();
        let head = repo.head()?;
        Ok(head.shorthand().unwrap_or("HEAD").to_string())
    }

    fn branch_exists(&self, branch: &str) -> Result<bool> {
        match self.repo().find_branch(branch, BranchType::Local) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.git.run(&["checkout", branch])?;
        Ok(())
    }

    fn checkout_new_branch(&self, branch: &str) -> Result<()> {
        self.git.run(&["checkout", "-b", branch])?;
        Ok(())
    }

    fn delete_branch(&self, branch: &str) -> Result<()> {
        self.git.run(&["branch", "-D", branch])?;
        Ok(())
    }

    fn merge(&self, branch: &str, strategy: MergeStrategy) -> Result<()> {
        let mut args = vec!["merge", "--no-edit"];
        if let Some(option) = strategy.option() {
            args.extend(["-X", option]);
        }
        args.push(branch);
        self.git.run(&args)?;
        Ok(())
    }

    fn cherry_pick(&self, commit: &str) -> Result<()> {
        self.git.run(&["cherry-pick", commit])?;
        Ok(())
    }

    fn add_all(&self) -> Result<()> {
        self.git.run(&["add", "-A"])?;
        Ok(())
    }

    fn commit(&self, message: &str, ignore_if_empty: bool) -> Result<bool> {
        if ignore_if_empty && !self.has_staged_changes()? {
            tracing::info!(dir = %self.git.workdir().display(), "Nothing to commit");
            return Ok(false);
        }
        self.git.run(&["commit", "-m", message])?;
        Ok(true)
    }

    fn push(&self, branch: &str, tags: bool) -> Result<()> {
        self.git.run(&["push", "--set-upstream", "origin", branch])?;
        if tags {
            self.git.run(&["push", "origin", "--tags"])?;
        }
        Ok(())
    }

    fn pull(&self) -> Result<()> {
        self.git.run(&["pull", "--ff-only"])?;
        Ok(())
    }

    fn fetch(&self) -> Result<()> {
        self.git.run(&["fetch", "origin"])?;
        Ok(())
    }

    fn has_local_changes(&self) -> Result<bool> {
        let repo = self.repo();
        let mut options = StatusOptions::new();
        options.include_untracked(true).include_ignored(false);
        let statuses = repo.statuses(Some(&mut options))?;
        Ok(!statuses.is_empty())
    }

    fn diff(&self, base: &str, head: &str) -> Result<String> {
        self.git.run(&["diff", "--stat", &format!("{}..{}", base, head)])
    }

    fn log_subjects(&self, base: &str, head: &str) -> Result<Vec<String>> {
        let repo = self.repo();
        let head_oid = repo.revparse_single(head)?.peel_to_commit()?.id();
        let base_oid = repo.revparse_single(base)?.peel_to_commit()?.id();

        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        revwalk.push(head_oid)?;
        revwalk.hide(base_oid)?;

        let mut subjects = Vec::new();
        for oid in revwalk {
            let commit = repo.find_commit(oid?)?;
            subjects.push(commit.summary().unwrap_or_default().to_string());
        }
        tracing::debug!(base, head, count = subjects.len(), "Collected commit subjects");
        Ok(subjects)
    }

    fn reset(&self, target: &str, hard: bool) -> Result<()> {
        let mode = if hard { "--hard" } else { "--mixed" };
        self.git.run(&["reset", mode, target])?;
        Ok(())
    }
}
