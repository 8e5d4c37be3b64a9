//! Changelog generation
//!
//! The pipeline for one project and one release window:
//!
//! 1. commit subjects between the base and head refs are parsed into pull request numbers
//! 2. the pull requests are fetched in parallel through the project's cache
//! 3. each one is [classified](classify::classify) against the window
//! 4. the included entries are [rendered](render::render)
//!
//! Oversized output is replaced by a link to the website changelog with [fit_to_limit].

pub mod classify;
pub mod fetch;
pub mod render;

pub use classify::{classify, Classification, ExclusionReason, LowerBound, ReleaseWindow};
pub use fetch::{fetch_all, parse_pr_numbers, PullRequestCache};
pub use render::{format_line, render, ChangelogEntry, Format, RenderOptions};

use crate::config::ChangelogConfig;
use crate::domain::{BranchRef, Version};
use crate::error::Result;
use crate::hosting::CodeHosting;
use crate::project::Project;
use crate::warning::ReleaseWarning;
use chrono::NaiveDate;

/// Refs to read history from, the version window, and how to render
#[derive(Debug, Clone)]
pub struct ChangelogRequest {
    pub base: BranchRef,
    pub head: BranchRef,
    pub window: ReleaseWindow,
    pub options: RenderOptions,
}

impl ChangelogRequest {
    /// Markdown flat list of `base_version..head_version`, read from `base..head`
    pub fn new(
        base: impl Into<BranchRef>,
        head: impl Into<BranchRef>,
        base_version: Version,
        head_version: Version,
        today: NaiveDate,
    ) -> Self {
        ChangelogRequest {
            base: base.into(),
            head: head.into(),
            window: ReleaseWindow::new(base_version, head_version),
            options: RenderOptions::new(Format::Markdown, head_version, today),
        }
    }

    /// Apply the configured author silencing and cherry-pick bound
    pub fn with_config(mut self, config: &ChangelogConfig) -> Self {
        self.window = self.window.with_lower_bound(config.cherry_pick_lower_bound);
        self.options.silent_authors = config.silent_authors.clone();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Changelog {
    pub text: String,
    pub included: usize,
    pub excluded: usize,
    pub warnings: Vec<ReleaseWarning>,
}

/// Fetch and classify the pull requests of one project's window
pub fn collect_entries(
    project: &Project,
    hosting: &dyn CodeHosting,
    request: &ChangelogRequest,
) -> Result<(Vec<ChangelogEntry>, Vec<ReleaseWarning>, usize)> {
    let numbers = project.prs_between(request.base.clone(), request.head.clone())?;
    tracing::info!(
        project = %project.name(),
        base = %request.window.base,
        head = %request.window.head,
        count = numbers.len(),
        "Collecting pull requests"
    );

    let pulls = fetch_all(hosting, project.name(), project.cache(), &numbers)?;

    let mut entries = Vec::with_capacity(pulls.len());
    let mut warnings = Vec::new();
    let mut excluded = 0;
    for pr in pulls {
        match classify(&pr, &pr.parsed_labels(), &request.window) {
            Classification::Included { sections, warning } => {
                if let Some(warning) = warning {
                    warning.log();
                    warnings.push(warning);
                }
                entries.push(ChangelogEntry::new(project.shortname(), pr, sections));
            }
            Classification::Excluded(reason) => {
                tracing::debug!(pr = pr.number, ?reason, "Excluded from changelog");
                excluded += 1;
            }
        }
    }
    Ok((entries, warnings, excluded))
}

/// Generate the changelog text for one project
pub fn generate(
    project: &Project,
    hosting: &dyn CodeHosting,
    request: &ChangelogRequest,
) -> Result<Changelog> {
    let (entries, warnings, excluded) = collect_entries(project, hosting, request)?;
    let text = render(&entries, &request.options);
    Ok(Changelog {
        text,
        included: entries.len(),
        excluded,
        warnings,
    })
}

/// Website changelog page of the version's release line
pub fn website_url(version: &Version, template: &str) -> String {
    template.replace("{version}", &version.release_line().to_string())
}

/// Replace text longer than the configured limit with the website link.
///
/// Length is counted in characters.
pub fn fit_to_limit(
    text: String,
    version: &Version,
    config: &ChangelogConfig,
) -> (String, Option<ReleaseWarning>) {
    let length = text.chars().count();
    if length <= config.size_limit {
        return (text, None);
    }
    let url = website_url(version, &config.website_url);
    let warning = ReleaseWarning::ChangelogTooLarge {
        length,
        limit: config.size_limit,
        url: url.clone(),
    };
    warning.log();
    (url, Some(warning))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_website_url_uses_release_line() {
        let version = Version::parse("2024.6.3").unwrap();
        assert_eq!(
            website_url(&version, "https://esphome.io/changelog/{version}.html"),
            "https://esphome.io/changelog/2024.6.0.html"
        );
    }

    #[test]
    fn test_fit_to_limit_boundary() {
        let config = ChangelogConfig {
            size_limit: 5,
            ..Default::default()
        };
        let version = Version::parse("1.2.0b3").unwrap();

        let (kept, warning) = fit_to_limit("ééééé".to_string(), &version, &config);
        assert_eq!(kept, "ééééé");
        assert!(warning.is_none());

        let (replaced, warning) = fit_to_limit("123456".to_string(), &version, &config);
        assert_eq!(replaced, "https://esphome.io/changelog/1.2.0.html");
        assert!(matches!(
            warning,
            Some(ReleaseWarning::ChangelogTooLarge { length: 6, limit: 5, .. })
        ));
    }
}
