//! Changelog text rendering.
//!
//! Rendering is a pure function of the classified entries and [`RenderOptions`]: the only
//! date that can appear in the output is the injected `today`.

use crate::domain::{PullRequest, SectionLabel, Version};
use chrono::{Datelike, NaiveDate};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Target markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// GitHub-flavoured Markdown (release bodies, PR bodies, docs pages)
    Markdown,
    /// reStructuredText with the docs site's `:<project>pr:` and `:ghuser:` roles
    ReStructuredText,
}

/// One included pull request with its section membership
#[derive(Debug, Clone, PartialEq)]
pub struct ChangelogEntry {
    /// Project shortname used in references (`esphome`, `docs`)
    pub project: String,
    pub pull_request: Arc<PullRequest>,
    pub sections: BTreeSet<SectionLabel>,
}

impl ChangelogEntry {
    pub fn new(
        project: impl Into<String>,
        pull_request: Arc<PullRequest>,
        sections: BTreeSet<SectionLabel>,
    ) -> Self {
        ChangelogEntry {
            project: project.into(),
            pull_request,
            sections,
        }
    }

    fn in_section(&self, section: SectionLabel) -> bool {
        self.sections.contains(&section)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub format: Format,
    /// Group lines under section headings instead of a flat list
    pub with_sections: bool,
    /// Show "All changes" inline instead of inside a collapsible block
    pub gh_release: bool,
    pub include_author: bool,
    /// Render the "Beta Changes" section
    pub prerelease: bool,
    /// Logins that are never mentioned
    pub silent_authors: Vec<String>,
    /// Version being released, selects the patch-release layout
    pub version: Version,
    pub today: NaiveDate,
}

impl RenderOptions {
    pub fn new(format: Format, version: Version, today: NaiveDate) -> Self {
        RenderOptions {
            format,
            with_sections: false,
            gh_release: false,
            include_author: true,
            prerelease: version.is_prerelease(),
            silent_authors: Vec::new(),
            version,
            today,
        }
    }

    fn mentions(&self, login: &str) -> bool {
        self.include_author && !self.silent_authors.iter().any(|silent| silent == login)
    }
}

// Merge timestamp ascending; unmerged last; number breaks ties.
fn merge_order(a: &ChangelogEntry, b: &ChangelogEntry) -> Ordering {
    let left = &a.pull_request;
    let right = &b.pull_request;
    match (left.merged_at, right.merged_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| left.number.cmp(&right.number))
    .then_with(|| a.project.cmp(&b.project))
}

/// Format a single changelog line, annotations included
pub fn format_line(entry: &ChangelogEntry, options: &RenderOptions) -> String {
    let pr = &entry.pull_request;
    let mut line = match options.format {
        Format::Markdown => format!(
            "- {} [{}#{}]({})",
            pr.title, entry.project, pr.number, pr.html_url
        ),
        Format::ReStructuredText => {
            format!("- {} :{}pr:`{}`", pr.title, entry.project, pr.number)
        }
    };

    if options.mentions(&pr.author.login) {
        let author = match options.format {
            Format::Markdown => format!("[@{}]({})", pr.author.login, pr.author.html_url),
            Format::ReStructuredText => format!(":ghuser:`{}`", pr.author.login),
        };
        line.push_str(" by ");
        line.push_str(&author);
    }

    for section in entry.sections.iter().filter(|section| section.is_inline()) {
        line.push_str(&format!(" ({})", section.name()));
    }
    line
}

fn push_heading(out: &mut Vec<String>, title: &str, depth: usize, format: Format) {
    match format {
        Format::Markdown => out.push(format!("{} {}", "#".repeat(depth), title)),
        Format::ReStructuredText => {
            let marker = match depth {
                1 => '=',
                2 => '-',
                _ => '^',
            };
            let rule: String = std::iter::repeat(marker)
                .take(title.chars().count())
                .collect();
            if depth == 1 {
                out.push(rule.clone());
            }
            out.push(title.to_string());
            out.push(rule);
        }
    }
    out.push(String::new());
}

fn push_collapsible(out: &mut Vec<String>, lines: &[String], format: Format) {
    match format {
        Format::Markdown => {
            out.push("<details>".to_string());
            out.push("<summary>Show</summary>".to_string());
            out.push(String::new());
            out.extend(lines.iter().cloned());
            out.push(String::new());
            out.push("</details>".to_string());
        }
        Format::ReStructuredText => {
            out.push(".. collapse:: Expand".to_string());
            out.push(String::new());
            out.extend(lines.iter().map(|line| format!("    {}", line)));
        }
    }
    out.push(String::new());
}

/// Render the changelog for already classified entries
pub fn render(entries: &[ChangelogEntry], options: &RenderOptions) -> String {
    let mut ordered: Vec<&ChangelogEntry> = entries.iter().collect();
    ordered.sort_by(|a, b| merge_order(a, b));

    let lines: Vec<(String, &ChangelogEntry)> = ordered
        .into_iter()
        .map(|entry| (format_line(entry, options), entry))
        .collect();

    let mut out = Vec::new();

    if !options.with_sections {
        out.extend(lines.iter().map(|(line, _)| line.clone()));
        out.push(String::new());
        return finish(out);
    }

    if options.version.is_patch_release() {
        let title = format!(
            "Release {} - {} {}",
            options.version,
            options.today.format("%B"),
            options.today.day()
        );
        // one flat list, dependency updates included
        push_heading(&mut out, &title, 2, options.format);
        out.extend(lines.iter().map(|(line, _)| line.clone()));
        out.push(String::new());
        return finish(out);
    }

    let collect = |keep: &dyn Fn(&ChangelogEntry) -> bool| -> Vec<String> {
        lines
            .iter()
            .filter(|(_, entry)| keep(entry))
            .map(|(line, _)| line.clone())
            .collect()
    };
    let main = collect(&|entry| !entry.in_section(SectionLabel::Dependencies));
    let dependencies = collect(&|entry| entry.in_section(SectionLabel::Dependencies));

    push_heading(&mut out, "Full list of changes", 2, options.format);

    for section in SectionLabel::ALL {
        if matches!(section, SectionLabel::Dependencies | SectionLabel::Reverted) {
            continue;
        }
        if section == SectionLabel::CherryPicked && !options.prerelease {
            continue;
        }
        let Some(heading) = section.heading() else {
            continue;
        };
        let members = collect(&|entry| entry.in_section(section));
        if members.is_empty() {
            continue;
        }
        push_heading(&mut out, heading, 3, options.format);
        out.extend(members);
        out.push(String::new());
    }

    push_heading(&mut out, "All changes", 3, options.format);
    if options.gh_release {
        out.extend(main);
        out.push(String::new());
    } else {
        push_collapsible(&mut out, &main, options.format);
    }

    if !dependencies.is_empty() {
        let heading = SectionLabel::Dependencies
            .heading()
            .unwrap_or("Dependency Changes");
        push_heading(&mut out, heading, 3, options.format);
        push_collapsible(&mut out, &dependencies, options.format);
    }

    finish(out)
}

fn finish(lines: Vec<String>) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Author, State};
    use chrono::{TimeZone, Utc};

    fn entry(number: u64, minute: u32, labels: &[SectionLabel]) -> ChangelogEntry {
        let pr = PullRequest {
            number,
            title: format!("Change {}", number),
            author: Author::new("contributor"),
            merged_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()),
            labels: Vec::new(),
            milestone: None,
            body: None,
            state: State::Closed,
            base: "dev".to_string(),
            head: "topic".to_string(),
            html_url: format!("https://github.com/esphome/esphome/pull/{}", number),
            merge_commit_sha: None,
        };
        ChangelogEntry::new("esphome", Arc::new(pr), labels.iter().copied().collect())
    }

    fn options(format: Format, version: &str) -> RenderOptions {
        RenderOptions::new(
            format,
            Version::parse(version).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 19).unwrap(),
        )
    }

    #[test]
    fn test_markdown_line() {
        let line = format_line(
            &entry(5, 0, &[SectionLabel::NewFeature, SectionLabel::CherryPicked]),
            &options(Format::Markdown, "1.2.0"),
        );
        assert_eq!(
            line,
            "- Change 5 [esphome#5](https://github.com/esphome/esphome/pull/5) by [@contributor](https://github.com/contributor) (new-feature)"
        );
    }

    #[test]
    fn test_rst_line_without_author() {
        let mut opts = options(Format::ReStructuredText, "1.2.0");
        opts.include_author = false;
        let line = format_line(&entry(5, 0, &[SectionLabel::BreakingChange]), &opts);
        assert_eq!(line, "- Change 5 :esphomepr:`5` (breaking-change)");
    }

    #[test]
    fn test_silent_author_is_not_mentioned() {
        let mut opts = options(Format::ReStructuredText, "1.2.0");
        opts.silent_authors = vec!["contributor".to_string()];
        let line = format_line(&entry(5, 0, &[]), &opts);
        assert!(!line.contains("ghuser"));
    }

    #[test]
    fn test_flat_list_is_sorted_and_terminated() {
        let entries = vec![entry(2, 30, &[]), entry(1, 10, &[SectionLabel::Dependencies])];
        let mut opts = options(Format::ReStructuredText, "1.2.0");
        opts.include_author = false;
        let text = render(&entries, &opts);
        assert_eq!(text, "- Change 1 :esphomepr:`1`\n- Change 2 :esphomepr:`2`\n\n");
    }

    #[test]
    fn test_patch_release_heading() {
        let mut opts = options(Format::ReStructuredText, "1.2.3");
        opts.with_sections = true;
        opts.include_author = false;
        let text = render(&[entry(1, 0, &[SectionLabel::NewFeature])], &opts);
        let expected = format!("Release 1.2.3 - June 19\n{}\n\n- Change 1", "-".repeat(23));
        assert!(text.starts_with(&expected), "{}", text);
        assert!(!text.contains("New Features"));
    }

    #[test]
    fn test_patch_release_keeps_dependencies_in_flat_list() {
        let entries = vec![entry(1, 0, &[]), entry(2, 1, &[SectionLabel::Dependencies])];
        let mut opts = options(Format::Markdown, "1.2.3");
        opts.with_sections = true;
        opts.include_author = false;
        let text = render(&entries, &opts);
        assert_eq!(
            text,
            "## Release 1.2.3 - June 19\n\n\
             - Change 1 [esphome#1](https://github.com/esphome/esphome/pull/1)\n\
             - Change 2 [esphome#2](https://github.com/esphome/esphome/pull/2)\n\n"
        );
    }

    #[test]
    fn test_sections_in_declared_order() {
        let entries = vec![
            entry(1, 0, &[SectionLabel::BreakingChange]),
            entry(2, 1, &[SectionLabel::NewFeature]),
        ];
        let mut opts = options(Format::Markdown, "1.2.0");
        opts.with_sections = true;
        let text = render(&entries, &opts);
        let features = text.find("### New Features").unwrap();
        let breaking = text.find("### Breaking Changes").unwrap();
        let all = text.find("### All changes").unwrap();
        assert!(text.starts_with("## Full list of changes\n\n"));
        assert!(features < breaking && breaking < all);
        assert!(text.contains("<details>"));
    }

    #[test]
    fn test_gh_release_omits_collapsible() {
        let mut opts = options(Format::Markdown, "1.2.0");
        opts.with_sections = true;
        opts.gh_release = true;
        let text = render(&[entry(1, 0, &[])], &opts);
        assert!(!text.contains("<details>"));
    }

    #[test]
    fn test_dependencies_get_own_section() {
        let entries = vec![entry(1, 0, &[]), entry(2, 1, &[SectionLabel::Dependencies])];
        let mut opts = options(Format::Markdown, "1.2.0");
        opts.with_sections = true;
        opts.gh_release = true;
        let text = render(&entries, &opts);
        let (main, deps) = text.split_once("### Dependency Changes").unwrap();
        assert!(!main.contains("[esphome#2]"));
        assert!(deps.contains("[esphome#2]"));
        assert!(deps.contains("<details>"));
    }

    #[test]
    fn test_rst_heading_styles() {
        let mut out = Vec::new();
        push_heading(&mut out, "Title", 1, Format::ReStructuredText);
        push_heading(&mut out, "Sub", 3, Format::ReStructuredText);
        assert_eq!(out, vec!["=====", "Title", "=====", "", "Sub", "^^^", ""]);
    }

    #[test]
    fn test_rst_collapsible_indents() {
        let mut out = Vec::new();
        push_collapsible(&mut out, &["- a".to_string()], Format::ReStructuredText);
        assert_eq!(out, vec![".. collapse:: Expand", "", "    - a", ""]);
    }
}
