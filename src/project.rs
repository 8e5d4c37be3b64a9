//! A repository taking part in a release: its local working copy, branch roles
//! and cached hosting-service lookups.

use crate::changelog::{parse_pr_numbers, PullRequestCache};
use crate::config::ProjectConfig;
use crate::domain::{
    BranchRef, Milestone, NewPullRequest, NewRelease, ProjectBranches, PullRequest,
    PullRequestFilter, Release, State, Version,
};
use crate::error::{ReleaseError, Result};
use crate::git::{GitWorkingCopy, MergeStrategy, SourceControl};
use crate::hosting::{self, CodeHosting};
use crate::ui::{recover_manually, Confirm};
use crate::warning::ReleaseWarning;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub const CHERRY_PICKED_LABEL: &str = "cherry-picked";

pub struct Project {
    config: ProjectConfig,
    branches: ProjectBranches,
    scm: Box<dyn SourceControl>,
    cache: PullRequestCache,
    lease: Mutex<Option<String>>,
    step: Option<Arc<dyn Confirm>>,
}

/// Exclusive hold on a project's checked-out branch
///
/// While a lease is alive, checking out any other branch fails and a second
/// lease cannot be taken. Dropping the lease releases it.
#[must_use = "the branch is released as soon as the lease is dropped"]
pub struct BranchLease<'a> {
    project: &'a Project,
    branch: String,
}

impl BranchLease<'_> {
    pub fn branch(&self) -> &str {
        &self.branch
    }
}

impl fmt::Debug for BranchLease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BranchLease")
            .field("project", &self.project.name())
            .field("branch", &self.branch)
            .finish()
    }
}

impl Drop for BranchLease<'_> {
    fn drop(&mut self) {
        *self.project.lease() = None;
        tracing::debug!(project = %self.project.name(), branch = %self.branch, "Released branch");
    }
}

/// Result of replaying a milestone onto the current branch
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CherryPickOutcome {
    /// Picked issue numbers, in the order they were applied
    pub picked: Vec<u64>,
    pub warnings: Vec<ReleaseWarning>,
}

impl Project {
    pub fn new(config: ProjectConfig, scm: Box<dyn SourceControl>) -> Self {
        let branches = config.branches();
        Project {
            config,
            branches,
            scm,
            cache: PullRequestCache::new(),
            lease: Mutex::new(None),
            step: None,
        }
    }

    /// Confirm every external command before it runs
    pub fn with_step(mut self, prompter: Arc<dyn Confirm>) -> Self {
        self.step = Some(prompter);
        self
    }

    /// Open the project's working copy from disk
    pub fn open(config: ProjectConfig, step: Option<Arc<dyn Confirm>>) -> Result<Self> {
        let mut working_copy = GitWorkingCopy::open(&config.path).map_err(|e| {
            ReleaseError::config(format!(
                "project {} at {}: {}",
                config.name,
                config.path.display(),
                e
            ))
        })?;
        let Some(prompter) = step else {
            return Ok(Self::new(config, Box::new(working_copy)));
        };
        working_copy = working_copy.with_step(prompter.clone());
        Ok(Self::new(config, Box::new(working_copy)).with_step(prompter))
    }

    /// Repository name on the hosting service
    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn shortname(&self) -> &str {
        &self.config.shortname
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn branches(&self) -> &ProjectBranches {
        &self.branches
    }

    pub fn scm(&self) -> &dyn SourceControl {
        self.scm.as_ref()
    }

    pub fn step(&self) -> Option<&dyn Confirm> {
        self.step.as_deref()
    }

    pub fn cache(&self) -> &PullRequestCache {
        &self.cache
    }

    fn lease(&self) -> MutexGuard<'_, Option<String>> {
        self.lease
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn lookup_branch(&self, branch: impl Into<BranchRef>) -> Result<String> {
        self.branches.resolve(&branch.into())
    }

    /// Check out `branch` and hold it until the returned lease is dropped
    pub fn workon(&self, branch: impl Into<BranchRef>) -> Result<BranchLease<'_>> {
        let branch = self.lookup_branch(branch)?;
        {
            let mut lease = self.lease();
            if let Some(held) = lease.as_ref() {
                return Err(ReleaseError::BranchLeased {
                    held: held.clone(),
                    requested: branch,
                });
            }
            *lease = Some(branch.clone());
        }
        let lease = BranchLease {
            project: self,
            branch,
        };
        self.scm.checkout(&lease.branch)?;
        tracing::debug!(project = %self.name(), branch = %lease.branch, "Working on branch");
        Ok(lease)
    }

    /// Check out a branch; refused while another branch is leased
    pub fn checkout(&self, branch: impl Into<BranchRef>) -> Result<()> {
        let branch = self.lookup_branch(branch)?;
        if let Some(held) = self.lease().as_ref() {
            if *held != branch {
                return Err(ReleaseError::BranchLeased {
                    held: held.clone(),
                    requested: branch,
                });
            }
        }
        self.scm.checkout(&branch)
    }

    /// Create and switch to a fresh branch, offering to delete a stale one.
    ///
    /// Returns `false` when the user keeps the existing branch.
    pub fn checkout_new_branch(&self, branch: &str, prompter: &dyn Confirm) -> Result<bool> {
        if self.scm.branch_exists(branch)? {
            if !prompter.confirm(&format!(
                "Branch {} already exists in {}. Delete first?",
                branch,
                self.name()
            ))? {
                return Ok(false);
            }
            self.scm.delete_branch(branch)?;
        }
        self.scm.checkout_new_branch(branch)?;
        Ok(true)
    }

    pub fn merge(&self, branch: impl Into<BranchRef>, strategy: MergeStrategy) -> Result<()> {
        let branch = self.lookup_branch(branch)?;
        self.scm.merge(&branch, strategy)
    }

    /// Pull request numbers merged between two refs, first occurrence order
    pub fn prs_between(
        &self,
        base: impl Into<BranchRef>,
        head: impl Into<BranchRef>,
    ) -> Result<Vec<u64>> {
        let base = self.lookup_branch(base)?;
        let head = self.lookup_branch(head)?;
        let subjects = self.scm.log_subjects(&base, &head)?;
        Ok(parse_pr_numbers(&subjects))
    }

    pub fn pull_request(&self, hosting: &dyn CodeHosting, number: u64) -> Result<Arc<PullRequest>> {
        self.cache.get_or_fetch(hosting, self.name(), number)
    }

    /// Pull requests with an exact title; every listed PR is cached
    pub fn pull_requests_by_title(
        &self,
        hosting: &dyn CodeHosting,
        title: &str,
        head: Option<BranchRef>,
        base: Option<BranchRef>,
    ) -> Result<Vec<Arc<PullRequest>>> {
        let filter = PullRequestFilter {
            head: head.map(|b| self.lookup_branch(b)).transpose()?,
            base: base.map(|b| self.lookup_branch(b)).transpose()?,
            state: None,
        };
        let mut found = Vec::new();
        for pr in hosting.pull_requests(self.name(), &filter)? {
            let matches = pr.title == title;
            let cached = self.cache.insert(pr);
            if matches {
                found.push(cached);
            }
        }
        Ok(found)
    }

    pub fn milestone_by_title(
        &self,
        hosting: &dyn CodeHosting,
        title: &str,
    ) -> Result<Option<Milestone>> {
        hosting::milestone_by_title(hosting, self.name(), title)
    }

    /// Newest published version of this project
    pub fn latest_release(
        &self,
        hosting: &dyn CodeHosting,
        include_prereleases: bool,
    ) -> Result<Version> {
        hosting::latest_version(hosting, self.name(), include_prereleases)?.ok_or_else(|| {
            ReleaseError::NotFound(format!("no versioned release in {}", self.name()))
        })
    }

    /// Cherry-pick every merged pull request of `milestone` onto the current branch.
    ///
    /// Unmerged pull requests are reported and skipped once the user confirms;
    /// pull requests already labelled cherry-picked are skipped. The rest are
    /// applied in merge order, a conflicting pick waits for a manual fix.
    pub fn cherry_pick_from_milestone(
        &self,
        hosting: &dyn CodeHosting,
        prompter: &dyn Confirm,
        milestone: &Milestone,
    ) -> Result<CherryPickOutcome> {
        let mut outcome = CherryPickOutcome::default();
        let mut to_pick = Vec::new();

        for issue in hosting.milestone_issues(self.name(), milestone.number, State::Closed)? {
            let pull = self.pull_request(hosting, issue.number)?;
            if !pull.is_merged() {
                let warning = ReleaseWarning::NotMerged {
                    pr: pull.number,
                    title: pull.title.clone(),
                };
                warning.log();
                prompter.require(&format!(
                    "{}\nIf you want to add it please merge it manually then confirm.",
                    warning
                ))?;
                outcome.warnings.push(warning);
                continue;
            }
            if issue.has_label(CHERRY_PICKED_LABEL) {
                let warning = ReleaseWarning::AlreadyCherryPicked {
                    pr: pull.number,
                    title: pull.title.clone(),
                };
                warning.log();
                outcome.warnings.push(warning);
                continue;
            }
            to_pick.push(pull);
        }

        to_pick.sort_by(|a, b| a.merged_at.cmp(&b.merged_at).then(a.number.cmp(&b.number)));

        for pull in &to_pick {
            let sha = pull.merge_commit_sha.as_deref().ok_or_else(|| {
                ReleaseError::NotFound(format!("merge commit of {}#{}", self.name(), pull.number))
            })?;
            tracing::info!(project = %self.name(), pr = pull.number, sha, "Cherry picking {}", pull.title);
            if let Err(e) = self.scm.cherry_pick(sha) {
                recover_manually(prompter, e)?;
            }
            outcome.picked.push(pull.number);
        }
        Ok(outcome)
    }

    /// Push the current branch and open a pull request against `target`
    pub fn create_pr(
        &self,
        hosting: &dyn CodeHosting,
        title: &str,
        target: impl Into<BranchRef>,
        body: &str,
    ) -> Result<PullRequest> {
        let target = self.lookup_branch(target)?;
        let head = self.scm.current_branch()?;
        self.scm.push(&head, false)?;
        let pr = hosting.create_pull_request(
            self.name(),
            &NewPullRequest {
                title: title.to_string(),
                base: target.clone(),
                head: head.clone(),
                body: body.to_string(),
            },
        )?;
        tracing::info!(project = %self.name(), pr = pr.number, %head, %target, "Created pull request");
        Ok(pr)
    }

    /// Push the current branch and create a release tagged `v{version}` from it.
    ///
    /// Drafts must be published by the user on the hosting service before this returns.
    pub fn create_release(
        &self,
        hosting: &dyn CodeHosting,
        prompter: &dyn Confirm,
        version: &Version,
        body: &str,
        prerelease: bool,
        draft: bool,
    ) -> Result<Release> {
        let branch = self.scm.current_branch()?;
        self.scm.push(&branch, false)?;
        let release = hosting.create_release(
            self.name(),
            &NewRelease {
                tag_name: version.tag(),
                target_commitish: branch,
                name: version.to_string(),
                body: body.to_string(),
                prerelease,
                draft,
            },
        )?;
        if draft {
            let url = release.html_url.replace("/tag/", "/edit/");
            prompter.require(&format!("Please go to {} and publish the draft.", url))?;
        } else {
            tracing::info!(project = %self.name(), tag = %release.tag_name, "Created release");
        }
        self.scm.pull()?;
        Ok(release)
    }

    /// Reset a branch to its state on origin
    pub fn reset_hard_remote(&self, branch: impl Into<BranchRef>) -> Result<()> {
        let lease = self.workon(branch)?;
        self.scm.reset(&format!("origin/{}", lease.branch()), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Author, Branch, Issue};
    use crate::git::MockSourceControl;
    use crate::hosting::MockHosting;
    use crate::ui::ScriptedPrompter;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn project() -> Project {
        let config = ProjectConfig {
            name: "esphome".to_string(),
            shortname: "esphome".to_string(),
            path: PathBuf::from("."),
            stable_branch: Some("release".to_string()),
            beta_branch: Some("beta".to_string()),
            dev_branch: Some("dev".to_string()),
            release: true,
            milestones: true,
            website_changelog: true,
            bump_command: Vec::new(),
            version_files: Vec::new(),
        };
        Project::new(
            config,
            Box::new(MockSourceControl::new(&["dev", "beta", "release"])),
        )
    }

    fn merged_pr(number: u64, minute: u32, labels: &[&str]) -> PullRequest {
        PullRequest {
            number,
            title: format!("Fix {}", number),
            author: Author::new("dev"),
            merged_at: Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, minute, 0).unwrap()),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            milestone: None,
            body: None,
            state: State::Closed,
            base: "dev".to_string(),
            head: format!("fix-{}", number),
            html_url: String::new(),
            merge_commit_sha: Some(format!("sha{}", number)),
        }
    }

    #[test]
    fn test_lease_blocks_second_lease_and_other_checkouts() {
        let project = project();
        let lease = project.workon(Branch::Beta).unwrap();
        assert_eq!(lease.branch(), "beta");
        assert!(format!("{:?}", lease).contains("\"beta\""));

        let err = project.workon(Branch::Dev).unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::BranchLeased { ref held, ref requested } if held == "beta" && requested == "dev"
        ));
        assert!(project.checkout(Branch::Dev).is_err());
        project.checkout("beta").unwrap();

        drop(lease);
        let _again = project.workon(Branch::Dev).unwrap();
    }

    #[test]
    fn test_lease_released_when_checkout_fails() {
        let project = project();
        assert!(project.workon("missing-branch").is_err());
        let _lease = project.workon(Branch::Dev).unwrap();
    }

    #[test]
    fn test_unknown_role_is_config_error() {
        let mut config = project().config.clone();
        config.stable_branch = None;
        let project = Project::new(config, Box::new(MockSourceControl::new(&["dev"])));
        assert!(matches!(
            project.lookup_branch(Branch::Stable),
            Err(ReleaseError::Config(_))
        ));
    }

    #[test]
    fn test_cherry_pick_from_milestone() {
        let project = project();
        let hosting = MockHosting::new();
        let milestone_number = hosting.add_milestone("esphome", "2024.6.1");

        let mut unmerged = merged_pr(3, 0, &[]);
        unmerged.merged_at = None;
        for pr in [merged_pr(1, 30, &[]), merged_pr(2, 10, &[]), unmerged, merged_pr(4, 5, &[])] {
            let labels = if pr.number == 4 {
                vec![CHERRY_PICKED_LABEL.to_string()]
            } else {
                Vec::new()
            };
            hosting.add_milestone_issue(
                "esphome",
                milestone_number,
                Issue {
                    number: pr.number,
                    title: pr.title.clone(),
                    labels,
                },
            );
            hosting.add_pull_request("esphome", pr);
        }

        let prompter = ScriptedPrompter::always_yes();
        let milestone = project
            .milestone_by_title(&hosting, "2024.6.1")
            .unwrap()
            .unwrap();
        let outcome = project
            .cherry_pick_from_milestone(&hosting, &prompter, &milestone)
            .unwrap();

        assert_eq!(outcome.picked, vec![2, 1]);
        assert_eq!(outcome.warnings.len(), 2);
        assert!(matches!(outcome.warnings[0], ReleaseWarning::NotMerged { pr: 3, .. }));
        assert!(matches!(
            outcome.warnings[1],
            ReleaseWarning::AlreadyCherryPicked { pr: 4, .. }
        ));
    }

    #[test]
    fn test_pull_requests_by_title_fills_cache() {
        let project = project();
        let hosting = MockHosting::new();
        let mut release_pr = merged_pr(10, 0, &[]);
        release_pr.title = "2024.6.0b1".to_string();
        release_pr.head = "bump-2024.6.0b1".to_string();
        release_pr.base = "beta".to_string();
        hosting.add_pull_request("esphome", release_pr);
        hosting.add_pull_request("esphome", merged_pr(11, 0, &[]));

        let found = project
            .pull_requests_by_title(
                &hosting,
                "2024.6.0b1",
                Some(BranchRef::from("bump-2024.6.0b1")),
                Some(BranchRef::from(Branch::Beta)),
            )
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].number, 10);
        assert!(project.cache().get(10).is_some());
        project.pull_request(&hosting, 10).unwrap();
        assert_eq!(hosting.fetch_count("esphome", 10), 0);
    }

    #[test]
    fn test_conflicting_cherry_pick_waits_for_manual_fix() {
        let scm = MockSourceControl::new(&["dev", "beta", "release"]);
        let project = Project::new(project().config.clone(), Box::new(scm.clone()));
        let hosting = MockHosting::new();
        let milestone_number = hosting.add_milestone("esphome", "2024.6.2");
        for pr in [merged_pr(7, 1, &[]), merged_pr(8, 2, &[])] {
            hosting.add_milestone_issue(
                "esphome",
                milestone_number,
                Issue {
                    number: pr.number,
                    title: pr.title.clone(),
                    labels: Vec::new(),
                },
            );
            hosting.add_pull_request("esphome", pr);
        }
        scm.fail_on("cherry-pick sha7", 1);

        let prompter = ScriptedPrompter::always_yes();
        let milestone = project
            .milestone_by_title(&hosting, "2024.6.2")
            .unwrap()
            .unwrap();
        let outcome = project
            .cherry_pick_from_milestone(&hosting, &prompter, &milestone)
            .unwrap();

        assert_eq!(outcome.picked, vec![7, 8]);
        assert_eq!(scm.operations(), vec!["cherry-pick sha8"]);
        assert!(prompter.asked()[0].contains("resolve this manually"));

        scm.fail_on("cherry-pick", 1);
        let declined = ScriptedPrompter::new([false], false);
        let err = project
            .cherry_pick_from_milestone(&hosting, &declined, &milestone)
            .unwrap_err();
        assert!(matches!(err, ReleaseError::Aborted(_)));
    }
}
