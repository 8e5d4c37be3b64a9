//! Release sequences: cut, publish, milestone cherry-pick, release notes and reset.
//!
//! Every sequence takes the [`ReleaseContext`] explicitly. Cutting a first beta
//! (`bN` with N = 1) or a first full release (`X.Y.0`) merges the whole upstream
//! branch; later betas and patch releases cherry-pick the merged pull requests of
//! the version's milestone.

use crate::bump::bump_version;
use crate::changelog::{self, fit_to_limit, website_url, Changelog, ChangelogRequest, Format};
use crate::context::ReleaseContext;
use crate::domain::{Branch, BranchRef, PullRequest, State, Version, VersionFields};
use crate::error::{Recovery, ReleaseError, Result};
use crate::git::MergeStrategy;
use crate::hosting;
use crate::project::{Project, CHERRY_PICKED_LABEL};
use crate::ui::{
    display_changelog, display_error, display_status, format_transition, recover_manually,
};
use crate::warning::ReleaseWarning;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const DO_NOT_MERGE: &str = "**Do not merge, release script will automatically merge**";

pub const METADATA_MD: &str = "
<details>
<summary>Metadata</summary>

@coderabbitai ignore
</details>
";

const MAX_ATTEMPTS: usize = 3;

/// What a sequence did, for the final summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleaseReport {
    /// Release pull requests opened, per repository
    pub pull_requests: Vec<(String, u64)>,
    /// Release pull requests merged while publishing
    pub merged: Vec<(String, u64)>,
    /// Releases created, as `(repository, tag)`
    pub releases: Vec<(String, String)>,
    /// Issues cherry-picked from the milestone
    pub cherry_picked: Vec<(String, u64)>,
    /// Changelog committed to the docs project
    pub docs_changelog: Option<String>,
    pub warnings: Vec<ReleaseWarning>,
}

impl ReleaseReport {
    fn warn(&mut self, warning: ReleaseWarning) {
        warning.log();
        self.warnings.push(warning);
    }
}

/// Inputs of the `release-notes` command; unset refs are asked for
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseNotesOptions {
    pub base_ref: Option<String>,
    pub head_ref: Option<String>,
    pub head_version: Option<String>,
    pub with_sections: bool,
    pub include_author: bool,
    pub format: Format,
}

impl Default for ReleaseNotesOptions {
    fn default() -> Self {
        ReleaseNotesOptions {
            base_ref: None,
            head_ref: None,
            head_version: None,
            with_sections: false,
            include_author: true,
            format: Format::ReStructuredText,
        }
    }
}

pub fn bump_branch_name(version: &Version) -> String {
    format!("bump-{}", version)
}

/// Body of a release pull request
pub fn release_pr_body(changelog: &str) -> String {
    format!("{}\n{}{}", DO_NOT_MERGE, changelog, METADATA_MD)
}

/// Run a hosting call, repeating it while the service rate-limits us
pub fn retry<T>(what: &str, delay: Duration, mut call: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 1;
    loop {
        match call() {
            Err(e) if e.recovery() == Recovery::Retry && attempt < MAX_ATTEMPTS => {
                tracing::warn!(error = %e, attempt, "{} rate limited, retrying in {:?}", what, delay);
                thread::sleep(delay);
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn parse_answer(answer: &str) -> Result<Version> {
    let answer = answer.trim();
    Version::parse(answer.strip_prefix('v').unwrap_or(answer))
}

fn require_beta(version: &Version) -> Result<()> {
    if version.is_prerelease() {
        Ok(())
    } else {
        Err(ReleaseError::invalid_version(
            version.to_string(),
            "must be a beta release",
        ))
    }
}

fn require_full(version: &Version) -> Result<()> {
    if version.is_prerelease() || version.dev() {
        Err(ReleaseError::invalid_version(
            version.to_string(),
            "must be a full release",
        ))
    } else {
        Ok(())
    }
}

/// Ask for the version the changelog is compared against
pub fn prompt_base_version(ctx: &ReleaseContext, include_prereleases: bool) -> Result<Version> {
    let primary = ctx.primary()?;
    let latest = retry("latest release", ctx.retry_delay, || {
        primary.latest_release(ctx.hosting(), include_prereleases)
    })?;
    let answer = ctx.prompter().prompt(
        "Please enter base (what release to compare with for changelog)",
        &latest.to_string(),
    )?;
    parse_answer(&answer)
}

/// Refuse to run on dirty working copies, then bring every role branch up to date
pub fn update_local_copies(ctx: &ReleaseContext) -> Result<()> {
    for project in &ctx.projects {
        if project.scm().has_local_changes()? {
            return Err(ReleaseError::aborted(format!(
                "{} has local changes, commit or stash them first",
                project.name()
            )));
        }
    }
    for project in &ctx.projects {
        project.scm().fetch()?;
        for (role, _) in project.branches().roles() {
            let _lease = project.workon(role)?;
            project.scm().pull()?;
        }
        tracing::info!(project = %project.name(), "Updated local copy");
    }
    Ok(())
}

fn start_bump_branch(ctx: &ReleaseContext, project: &Project, version: &Version) -> Result<()> {
    let branch = bump_branch_name(version);
    if !project.checkout_new_branch(&branch, ctx.prompter())? {
        tracing::info!(project = %project.name(), %branch, "Reusing existing branch");
        project.checkout(branch.as_str())?;
    }
    Ok(())
}

/// Bump branch off `base` with everything from `head` merged in
pub fn strategy_merge(
    ctx: &ReleaseContext,
    project: &Project,
    version: &Version,
    base: Branch,
    head: Branch,
) -> Result<()> {
    project.checkout(base)?;
    start_bump_branch(ctx, project, version)?;
    if let Err(e) = project.merge(head, MergeStrategy::Theirs) {
        recover_manually(ctx.prompter(), e)?;
    }
    bump_version(project, version)?;
    Ok(())
}

/// Bump branch off `base` with the version's milestone cherry-picked onto it
///
/// Returns the picked issue numbers.
pub fn strategy_cherry_pick(
    ctx: &ReleaseContext,
    project: &Project,
    version: &Version,
    base: Branch,
    report: &mut ReleaseReport,
) -> Result<Vec<u64>> {
    let title = version.to_string();
    let milestone = retry("milestone lookup", ctx.retry_delay, || {
        project.milestone_by_title(ctx.hosting(), &title)
    })?;

    project.checkout(base)?;
    start_bump_branch(ctx, project, version)?;

    let picked = match milestone {
        Some(milestone) => {
            let outcome = project.cherry_pick_from_milestone(ctx.hosting(), ctx.prompter(), &milestone)?;
            report.warnings.extend(outcome.warnings);
            outcome.picked
        }
        None => {
            report.warn(ReleaseWarning::MilestoneMissing {
                project: project.name().to_string(),
                title,
            });
            Vec::new()
        }
    };
    bump_version(project, version)?;
    Ok(picked)
}

/// Body text of a release PR or release for one project.
///
/// First betas and first full releases of website projects link to the
/// website; everything else is generated and capped at the size limit.
#[allow(clippy::too_many_arguments)]
pub fn release_changelog(
    ctx: &ReleaseContext,
    project: &Project,
    version: &Version,
    base: &Version,
    head: BranchRef,
    prerelease: bool,
    include_author: bool,
    report: &mut ReleaseReport,
) -> Result<String> {
    let config = &ctx.config.changelog;
    if project.config().website_changelog && (version.is_first_beta() || version.is_first_release())
    {
        tracing::info!(project = %project.name(), "Using website link for changelog");
        return Ok(website_url(version, &config.website_url));
    }

    let mut request =
        ChangelogRequest::new(BranchRef::Named(base.tag()), head, *base, *version, ctx.today)
            .with_config(config);
    request.options.gh_release = true;
    request.options.with_sections = false;
    request.options.prerelease = prerelease;
    request.options.include_author = include_author;

    let generated = changelog::generate(project, ctx.hosting(), &request)?;
    report.warnings.extend(generated.warnings);
    let (text, too_large) = fit_to_limit(generated.text, version, config);
    report.warnings.extend(too_large);
    Ok(text)
}

/// Commit the primary project's changelog to the docs bump branch
///
/// First betas and full releases get the sectioned layout. The text is shown
/// for pasting into the changelog page and committed once the user confirms.
pub fn docs_insert_changelog(
    ctx: &ReleaseContext,
    version: &Version,
    base: &Version,
    report: &mut ReleaseReport,
) -> Result<()> {
    let config = &ctx.config.changelog;
    let Some(docs) = config.docs_project.as_deref().and_then(|name| ctx.project(name)) else {
        tracing::debug!("No docs project, skipping changelog page");
        return Ok(());
    };
    let primary = ctx.primary()?;
    let branch = bump_branch_name(version);

    let _lease = docs.workon(branch.as_str())?;
    let mut request = ChangelogRequest::new(
        BranchRef::Named(base.tag()),
        BranchRef::from(branch.as_str()),
        *base,
        *version,
        ctx.today,
    )
    .with_config(config);
    request.options.prerelease = version.is_prerelease();
    request.options.with_sections = version.beta() <= 1;
    let generated = changelog::generate(primary, ctx.hosting(), &request)?;
    report.warnings.extend(generated.warnings);

    let page = docs.path().join(
        config
            .docs_page
            .replace("{version}", &version.release_line().to_string()),
    );
    display_status(&format!("Changelog for {}, paste it into {}", version, page.display()));
    display_changelog(&generated.text);
    ctx.prompter().require("Pasted changelog?")?;

    docs.scm().add_all()?;
    if let Err(e) = docs
        .scm()
        .commit(&format!("Update changelog for {}", version), false)
    {
        recover_manually(ctx.prompter(), e)?;
    }
    report.docs_changelog = Some(generated.text);
    Ok(())
}

fn confirm_correct(
    ctx: &ReleaseContext,
    version: &Version,
    base: &Version,
    target: Branch,
) -> Result<()> {
    let branch = bump_branch_name(version);
    for project in &ctx.projects {
        let target_branch = project.lookup_branch(target)?;
        let stat = project.scm().diff(&target_branch, &branch)?;
        display_status(&format_transition(
            project.name(),
            &base.to_string(),
            &version.to_string(),
            &target_branch,
        ));
        if !stat.trim().is_empty() {
            eprintln!("{}", stat.trim_end());
        }
    }
    ctx.prompter()
        .require(&console::style("Please confirm everything is correct").red().to_string())
}

fn create_prs(
    ctx: &ReleaseContext,
    version: &Version,
    base: &Version,
    target: Branch,
    report: &mut ReleaseReport,
) -> Result<()> {
    let branch = bump_branch_name(version);
    for project in &ctx.projects {
        // no author mentions, release PRs would ping every contributor
        let changelog = release_changelog(
            ctx,
            project,
            version,
            base,
            BranchRef::from(branch.as_str()),
            target == Branch::Beta,
            false,
            report,
        )?;
        let body = release_pr_body(&changelog);

        let _lease = project.workon(branch.as_str())?;
        let pr = retry("create pull request", ctx.retry_delay, || {
            project.create_pr(ctx.hosting(), &version.to_string(), target, &body)
        })?;
        display_status(&format!(
            "Created pull request #{} in {}: {}",
            pr.number,
            project.name(),
            pr.html_url
        ));
        report
            .pull_requests
            .push((project.name().to_string(), pr.number));
    }
    Ok(())
}

/// Open the `next` milestone and close the `version` one in every milestone repository
pub fn update_milestones(ctx: &ReleaseContext, version: &Version, next: &Version) -> Result<()> {
    let current = version.to_string();
    let next = next.to_string();
    for repo in ctx.milestone_repos() {
        retry("create milestone", ctx.retry_delay, || {
            ctx.hosting().create_milestone(repo, &next)
        })?;
        if let Some(old) = hosting::milestone_by_title(ctx.hosting(), repo, &current)? {
            ctx.hosting()
                .update_milestone_state(repo, old.number, State::Closed)?;
        }
        tracing::info!(%repo, from = %current, to = %next, "Rolled over milestone");
    }
    Ok(())
}

pub fn mark_cherry_picked(ctx: &ReleaseContext, picked: &[(String, u64)]) -> Result<()> {
    for (repo, number) in picked {
        retry("add label", ctx.retry_delay, || {
            ctx.hosting()
                .add_labels(repo, *number, &[CHERRY_PICKED_LABEL])
        })?;
    }
    Ok(())
}

/// Cut a beta: open release pull requests against the beta branches
pub fn cut_beta_release(ctx: &ReleaseContext, version: &Version) -> Result<ReleaseReport> {
    require_beta(version)?;
    let base = prompt_base_version(ctx, !version.is_first_beta())?;
    update_local_copies(ctx)?;

    let mut report = ReleaseReport::default();
    if version.is_first_beta() {
        display_status("Creating first beta version using merge");
        let answer = ctx.prompter().prompt(
            "Please enter next dev version (what will be seen on dev branches after release)",
            &version.next_dev()?.to_string(),
        )?;
        let dev = parse_answer(&answer)?;

        for project in &ctx.projects {
            strategy_merge(ctx, project, version, Branch::Beta, Branch::Dev)?;
            display_status(&format!("Updating {} dev version number to {}", project.name(), dev));
            let _lease = project.workon(Branch::Dev)?;
            bump_version(project, &dev)?;
        }
    } else {
        display_status("Creating next beta version using cherry-pick");
        for project in &ctx.projects {
            let picked = strategy_cherry_pick(ctx, project, version, Branch::Beta, &mut report)?;
            report
                .cherry_picked
                .extend(picked.into_iter().map(|n| (project.name().to_string(), n)));
        }
    }

    docs_insert_changelog(ctx, version, &base, &mut report)?;
    confirm_correct(ctx, version, &base, Branch::Beta)?;
    create_prs(ctx, version, &base, Branch::Beta, &mut report)?;
    update_milestones(ctx, version, &version.next_beta()?)?;
    mark_cherry_picked(ctx, &report.cherry_picked)?;

    if version.is_first_beta() {
        for project in &ctx.projects {
            let lease = project.workon(Branch::Dev)?;
            project.scm().push(lease.branch(), false)?;
        }
    }
    Ok(report)
}

/// Cut a full release: open release pull requests against the stable branches
pub fn cut_release(ctx: &ReleaseContext, version: &Version) -> Result<ReleaseReport> {
    require_full(version)?;
    let base = prompt_base_version(ctx, false)?;
    update_local_copies(ctx)?;

    let mut report = ReleaseReport::default();
    if version.is_first_release() {
        display_status("Creating first release version using merge");
        for project in &ctx.projects {
            strategy_merge(ctx, project, version, Branch::Stable, Branch::Beta)?;
        }
    } else {
        display_status("Creating next full release using cherry-pick");
        for project in &ctx.projects {
            let picked = strategy_cherry_pick(ctx, project, version, Branch::Stable, &mut report)?;
            report
                .cherry_picked
                .extend(picked.into_iter().map(|n| (project.name().to_string(), n)));
        }
    }

    docs_insert_changelog(ctx, version, &base, &mut report)?;
    confirm_correct(ctx, version, &base, Branch::Stable)?;
    create_prs(ctx, version, &base, Branch::Stable, &mut report)?;
    update_milestones(ctx, version, &version.next_patch()?)?;
    mark_cherry_picked(ctx, &report.cherry_picked)?;
    Ok(report)
}

/// Cut either kind of release depending on the version
pub fn cut(ctx: &ReleaseContext, version: &Version) -> Result<ReleaseReport> {
    if version.is_prerelease() {
        cut_beta_release(ctx, version)
    } else {
        cut_release(ctx, version)
    }
}

fn select_release_pr(
    ctx: &ReleaseContext,
    project: &Project,
    prs: &[Arc<PullRequest>],
) -> Result<Option<Arc<PullRequest>>> {
    display_status("Found multiple release PRs. Please select the matching one");
    for (i, pr) in prs.iter().enumerate() {
        eprintln!(" [{}] #{} by @{} ({})", i + 1, pr.number, pr.author.login, pr.html_url);
    }
    let none = prs.len() + 1;
    eprintln!(" [{}] Auto-merge none", none);

    loop {
        let answer = ctx.prompter().prompt(
            &format!("Please select release PR for {}", project.shortname()),
            "1",
        )?;
        match answer.trim().parse::<usize>() {
            Ok(n) if n == none => return Ok(None),
            Ok(n) if (1..none).contains(&n) => return Ok(Some(prs[n - 1].clone())),
            _ => display_error(&format!("Please enter a number between 1 and {}", none)),
        }
    }
}

/// Merge the open release pull request of `version` into `head`
///
/// Returns the merged pull request number, if any was merged by us.
pub fn merge_release_pr(
    ctx: &ReleaseContext,
    project: &Project,
    version: &Version,
    head: Branch,
    report: &mut ReleaseReport,
) -> Result<Option<u64>> {
    let prs = project.pull_requests_by_title(
        ctx.hosting(),
        &version.to_string(),
        Some(BranchRef::from(bump_branch_name(version))),
        Some(BranchRef::from(head)),
    )?;

    let release_pr = match prs.as_slice() {
        [] => {
            let warning = ReleaseWarning::NoReleasePullRequest {
                project: project.name().to_string(),
            };
            let message = format!("{}, please verify it has been merged.", warning);
            report.warn(warning);
            ctx.prompter().require(&message)?;
            None
        }
        [pr] => Some(pr.clone()),
        _ => select_release_pr(ctx, project, &prs)?,
    };

    let Some(pr) = release_pr else {
        return Ok(None);
    };
    if pr.state != State::Open {
        return Ok(None);
    }
    let merged = retry("merge pull request", ctx.retry_delay, || {
        ctx.hosting().merge_pull_request(project.name(), pr.number)
    })?;
    if !merged {
        ctx.prompter()
            .require("Merging failed, please check and confirm when ready")?;
        return Ok(None);
    }
    tracing::info!(project = %project.name(), pr = pr.number, "Merged release pull request");
    Ok(Some(pr.number))
}

fn merge_down(ctx: &ReleaseContext, project: &Project, from: Branch, into: Branch) -> Result<()> {
    let lease = project.workon(into)?;
    project.scm().pull()?;
    if let Err(e) = project.merge(from, MergeStrategy::Ours) {
        recover_manually(ctx.prompter(), e)?;
    }
    project.scm().push(lease.branch(), false)
}

fn publish(
    ctx: &ReleaseContext,
    version: &Version,
    base: &Version,
    head: Branch,
    prerelease: bool,
) -> Result<ReleaseReport> {
    update_local_copies(ctx)?;
    ctx.prompter()
        .require(&format!("Publish version {}?", version))?;

    let mut report = ReleaseReport::default();
    let branch = bump_branch_name(version);
    for project in &ctx.projects {
        let changelog = release_changelog(
            ctx,
            project,
            version,
            base,
            BranchRef::from(branch.as_str()),
            prerelease,
            true,
            &mut report,
        )?;

        if let Some(number) = merge_release_pr(ctx, project, version, head, &mut report)? {
            report.merged.push((project.name().to_string(), number));
        }

        let _lease = project.workon(head)?;
        project.scm().pull()?;
        let release = retry("create release", ctx.retry_delay, || {
            project.create_release(
                ctx.hosting(),
                ctx.prompter(),
                version,
                &changelog,
                prerelease,
                true,
            )
        })?;
        report
            .releases
            .push((project.name().to_string(), release.tag_name));
    }
    Ok(report)
}

/// Publish a beta, then merge it back into the dev branches
pub fn publish_beta_release(ctx: &ReleaseContext, version: &Version) -> Result<ReleaseReport> {
    require_beta(version)?;
    let base = prompt_base_version(ctx, !version.is_first_beta())?;
    let report = publish(ctx, version, &base, Branch::Beta, true)?;
    for project in &ctx.projects {
        merge_down(ctx, project, Branch::Beta, Branch::Dev)?;
    }
    Ok(report)
}

/// Publish a full release, then merge it back into the beta and dev branches
pub fn publish_release(ctx: &ReleaseContext, version: &Version) -> Result<ReleaseReport> {
    require_full(version)?;
    let base = prompt_base_version(ctx, false)?;
    let report = publish(ctx, version, &base, Branch::Stable, false)?;
    for project in &ctx.projects {
        merge_down(ctx, project, Branch::Stable, Branch::Beta)?;
        merge_down(ctx, project, Branch::Stable, Branch::Dev)?;
    }
    Ok(report)
}

/// Publish either kind of release depending on the version
pub fn publish_version(ctx: &ReleaseContext, version: &Version) -> Result<ReleaseReport> {
    if version.is_prerelease() {
        publish_beta_release(ctx, version)
    } else {
        publish_release(ctx, version)
    }
}

/// Cherry-pick a milestone onto each project's current branch
pub fn milestone_cherry_pick(ctx: &ReleaseContext, title: &str) -> Result<ReleaseReport> {
    let mut report = ReleaseReport::default();
    for project in &ctx.projects {
        let Some(milestone) = project.milestone_by_title(ctx.hosting(), title)? else {
            let warning = ReleaseWarning::MilestoneMissing {
                project: project.name().to_string(),
                title: title.to_string(),
            };
            let message = format!("{}. Continue?", warning);
            report.warn(warning);
            ctx.prompter().require(&message)?;
            continue;
        };
        if !ctx.prompter().confirm(&format!(
            "Cherry-pick commits for {} on current branch?",
            project.name()
        ))? {
            continue;
        }

        let outcome = project.cherry_pick_from_milestone(ctx.hosting(), ctx.prompter(), &milestone)?;
        report.warnings.extend(outcome.warnings);
        let picked: Vec<_> = outcome
            .picked
            .into_iter()
            .map(|n| (project.name().to_string(), n))
            .collect();
        if ctx
            .prompter()
            .confirm("Label picked commits as cherry-picked?")?
        {
            mark_cherry_picked(ctx, &picked)?;
        }
        report.cherry_picked.extend(picked);
    }
    Ok(report)
}

/// Map a `release-notes` head argument to a ref and the default head version
///
/// `dev`, `beta` and `stable` (or `release`) name branch roles; anything else is
/// a version whose tag is used as the ref.
pub fn resolve_head_ref(head: &str, base: &Version) -> Result<(BranchRef, Version)> {
    match head {
        "dev" => Ok((Branch::Dev.into(), base.next_dev()?)),
        "beta" => {
            let version = if base.is_prerelease() {
                base.next_beta()?
            } else {
                base.next_dev()?.replace(VersionFields {
                    beta: Some(1),
                    dev: Some(false),
                    ..Default::default()
                })?
            };
            Ok((Branch::Beta.into(), version))
        }
        "stable" | "release" => Ok((Branch::Stable.into(), base.next_patch()?)),
        other => {
            let version = parse_answer(other)?;
            Ok((BranchRef::Named(version.tag()), version))
        }
    }
}

/// Generate release notes for the primary project
pub fn release_notes(ctx: &ReleaseContext, options: &ReleaseNotesOptions) -> Result<Changelog> {
    let primary = ctx.primary()?;

    let base_version = match &options.base_ref {
        Some(base) => parse_answer(base)?,
        None => {
            let latest = retry("latest release", ctx.retry_delay, || {
                primary.latest_release(ctx.hosting(), true)
            })?;
            parse_answer(
                &ctx.prompter()
                    .prompt("Please enter base version", &latest.to_string())?,
            )?
        }
    };

    let head = match &options.head_ref {
        Some(head) => head.clone(),
        None => ctx
            .prompter()
            .prompt("Please enter head ref (dev/beta/stable)", "dev")?,
    };
    let (head_ref, default_head) = resolve_head_ref(head.trim(), &base_version)?;

    let head_version = match &options.head_version {
        Some(version) => parse_answer(version)?,
        None => parse_answer(
            &ctx.prompter()
                .prompt("Please enter head version", &default_head.to_string())?,
        )?,
    };

    let mut request = ChangelogRequest::new(
        BranchRef::Named(base_version.tag()),
        head_ref,
        base_version,
        head_version,
        ctx.today,
    )
    .with_config(&ctx.config.changelog);
    request.options.format = options.format;
    request.options.with_sections = options.with_sections;
    request.options.include_author = options.include_author;

    changelog::generate(primary, ctx.hosting(), &request)
}

/// Offer to reset every role branch of every project to origin
pub fn reset(ctx: &ReleaseContext) -> Result<()> {
    for project in &ctx.projects {
        for (role, branch) in project.branches().roles() {
            if ctx
                .prompter()
                .confirm(&format!("Reset {}/{} ?", project.name(), branch))?
            {
                project.reset_hard_remote(role)?;
                tracing::info!(project = %project.name(), %branch, "Reset to origin");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_branch_name() {
        let version = Version::parse("2024.6.0b2").unwrap();
        assert_eq!(bump_branch_name(&version), "bump-2024.6.0b2");
    }

    #[test]
    fn test_release_pr_body() {
        let body = release_pr_body("- Fix esphome#1");
        assert!(body.starts_with(DO_NOT_MERGE));
        assert!(body.contains("\n- Fix esphome#1\n<details>"));
        assert!(body.ends_with("</details>\n"));
    }

    #[test]
    fn test_retry_repeats_rate_limited_calls() {
        let mut calls = 0;
        let value = retry("fetch", Duration::ZERO, || {
            calls += 1;
            if calls < 3 {
                Err(ReleaseError::RateLimited("quota".into()))
            } else {
                Ok(calls)
            }
        })
        .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn test_retry_gives_up() {
        let mut calls = 0;
        let err = retry("fetch", Duration::ZERO, || -> Result<()> {
            calls += 1;
            Err(ReleaseError::RateLimited("quota".into()))
        })
        .unwrap_err();
        assert!(matches!(err, ReleaseError::RateLimited(_)));
        assert_eq!(calls, MAX_ATTEMPTS);
    }

    #[test]
    fn test_retry_does_not_repeat_other_errors() {
        let mut calls = 0;
        let err = retry("fetch", Duration::ZERO, || -> Result<()> {
            calls += 1;
            Err(ReleaseError::NotFound("pr".into()))
        })
        .unwrap_err();
        assert!(matches!(err, ReleaseError::NotFound(_)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_resolve_head_ref() {
        let base = Version::parse("2024.5.2").unwrap();
        let (head, version) = resolve_head_ref("dev", &base).unwrap();
        assert_eq!(head, BranchRef::Role(Branch::Dev));
        assert_eq!(version.to_string(), "2024.6.0-dev");

        let (head, version) = resolve_head_ref("beta", &base).unwrap();
        assert_eq!(head, BranchRef::Role(Branch::Beta));
        assert_eq!(version.to_string(), "2024.6.0b1");

        let beta = Version::parse("2024.6.0b1").unwrap();
        let (_, version) = resolve_head_ref("beta", &beta).unwrap();
        assert_eq!(version.to_string(), "2024.6.0b2");

        let (head, version) = resolve_head_ref("release", &base).unwrap();
        assert_eq!(head, BranchRef::Role(Branch::Stable));
        assert_eq!(version.to_string(), "2024.5.3");

        let (head, version) = resolve_head_ref("v2024.6.1", &base).unwrap();
        assert_eq!(head, BranchRef::Named("v2024.6.1".to_string()));
        assert_eq!(version.to_string(), "2024.6.1");

        assert!(resolve_head_ref("main", &base).is_err());
    }

    #[test]
    fn test_release_kind_checks() {
        assert!(require_beta(&Version::parse("1.2.0b1").unwrap()).is_ok());
        assert!(require_beta(&Version::parse("1.2.0").unwrap()).is_err());
        assert!(require_full(&Version::parse("1.2.0").unwrap()).is_ok());
        assert!(require_full(&Version::parse("1.2.0-dev").unwrap()).is_err());
        assert!(require_full(&Version::parse("1.2.0b3").unwrap()).is_err());
    }
}
