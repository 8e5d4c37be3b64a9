use crate::domain::label::Label;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a pull request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Author {
    pub login: String,
    pub html_url: String,
}

impl Author {
    pub fn new(login: impl Into<String>) -> Self {
        let login = login.into();
        let html_url = format!("https://github.com/{}", login);
        Author { login, html_url }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Open,
    Closed,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Open => "open",
            State::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Milestone {
    pub number: u64,
    pub title: String,
    pub state: State,
}

/// Pull request as read from the hosting service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub author: Author,
    pub merged_at: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
    pub milestone: Option<Milestone>,
    pub body: Option<String>,
    pub state: State,
    pub base: String,
    pub head: String,
    pub html_url: String,
    pub merge_commit_sha: Option<String>,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|label| label == name)
    }

    /// Labels mapped onto the taxonomy
    pub fn parsed_labels(&self) -> Vec<Label> {
        self.labels.iter().map(|name| Label::parse(name)).collect()
    }
}

/// Issue as listed inside a milestone; pull requests show up here too
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub labels: Vec<String>,
}

impl Issue {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|label| label == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub tag_name: String,
    pub name: Option<String>,
    pub html_url: String,
    pub prerelease: bool,
    pub draft: bool,
}

/// Filter for listing pull requests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestFilter {
    pub head: Option<String>,
    pub base: Option<String>,
    pub state: Option<State>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub base: String,
    pub head: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRelease {
    pub tag_name: String,
    pub target_commitish: String,
    pub name: String,
    pub body: String,
    pub prerelease: bool,
    pub draft: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::label::SectionLabel;

    fn pull(labels: &[&str]) -> PullRequest {
        PullRequest {
            number: 7,
            title: "Add sensor".to_string(),
            author: Author::new("octocat"),
            merged_at: None,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            milestone: None,
            body: None,
            state: State::Open,
            base: "dev".to_string(),
            head: "feature".to_string(),
            html_url: "https://github.com/esphome/esphome/pull/7".to_string(),
            merge_commit_sha: None,
        }
    }

    #[test]
    fn test_author_url() {
        assert_eq!(Author::new("octocat").html_url, "https://github.com/octocat");
    }

    #[test]
    fn test_parsed_labels() {
        let pr = pull(&["new-feature", "component: wifi"]);
        assert_eq!(
            pr.parsed_labels(),
            vec![
                Label::Section(SectionLabel::NewFeature),
                Label::Other("component: wifi".to_string())
            ]
        );
        assert!(pr.has_label("new-feature"));
        assert!(!pr.is_merged());
    }
}
