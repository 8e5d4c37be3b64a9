use std::fmt;

/// Non-fatal issues hit while preparing a release.
/// The run continues; these are reported to the user and logged.
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseWarning {
    /// A cherry-picked pull request whose milestone title is not a version
    MilestoneParseFailure { pr: u64, milestone: String },
    /// Rendered changelog was replaced with a link to the website
    ChangelogTooLarge {
        length: usize,
        limit: usize,
        url: String,
    },
    /// Pull request in a milestone that has not been merged yet
    NotMerged { pr: u64, title: String },
    /// Pull request already carries the cherry-picked label
    AlreadyCherryPicked { pr: u64, title: String },
    /// No open milestone with this title
    MilestoneMissing { project: String, title: String },
    /// No release pull request found when publishing
    NoReleasePullRequest { project: String },
}

impl fmt::Display for ReleaseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseWarning::MilestoneParseFailure { pr, milestone } => {
                if milestone.is_empty() {
                    write!(
                        f,
                        "PR #{} is labeled cherry-picked but has no milestone; treating it as not cherry-picked",
                        pr
                    )
                } else {
                    write!(
                        f,
                        "PR #{} has milestone '{}' which is not a version; treating it as not cherry-picked",
                        pr, milestone
                    )
                }
            }
            ReleaseWarning::ChangelogTooLarge { length, limit, url } => write!(
                f,
                "Changelog too long ({} chars, limit {}), replaced with {}",
                length, limit, url
            ),
            ReleaseWarning::NotMerged { pr, title } => {
                write!(f, "Not merged yet: {} (#{})", title, pr)
            }
            ReleaseWarning::AlreadyCherryPicked { pr, title } => {
                write!(f, "Already cherry picked: {} (#{})", title, pr)
            }
            ReleaseWarning::MilestoneMissing { project, title } => {
                write!(f, "No open milestone '{}' in {}", title, project)
            }
            ReleaseWarning::NoReleasePullRequest { project } => {
                write!(f, "No release pull request found for {}", project)
            }
        }
    }
}

impl ReleaseWarning {
    /// Log the warning through tracing
    pub fn log(&self) {
        tracing::warn!("{}", self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_milestone_message() {
        let warning = ReleaseWarning::MilestoneParseFailure {
            pr: 12,
            milestone: String::new(),
        };
        assert!(warning.to_string().contains("has no milestone"));

        let warning = ReleaseWarning::MilestoneParseFailure {
            pr: 12,
            milestone: "Next".to_string(),
        };
        assert!(warning.to_string().contains("'Next' which is not a version"));
    }

    #[test]
    fn test_messages_name_the_project() {
        let warning = ReleaseWarning::MilestoneMissing {
            project: "esphome-docs".to_string(),
            title: "2024.6.1".to_string(),
        };
        assert_eq!(
            warning.to_string(),
            "No open milestone '2024.6.1' in esphome-docs"
        );
        let warning = ReleaseWarning::NoReleasePullRequest {
            project: "esphome".to_string(),
        };
        assert_eq!(warning.to_string(), "No release pull request found for esphome");
    }
}
