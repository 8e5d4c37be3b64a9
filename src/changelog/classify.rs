//! Per-pull-request inclusion and section membership.

use crate::domain::{Label, PullRequest, SectionLabel, Version};
use crate::warning::ReleaseWarning;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How the base version bounds a cherry-picked milestone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LowerBound {
    /// `base < milestone`
    #[default]
    Exclusive,
    /// `base <= milestone`
    Inclusive,
}

/// The `(base, head]` version range a changelog is generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseWindow {
    pub base: Version,
    pub head: Version,
    pub lower_bound: LowerBound,
}

impl ReleaseWindow {
    pub fn new(base: Version, head: Version) -> Self {
        ReleaseWindow {
            base,
            head,
            lower_bound: LowerBound::default(),
        }
    }

    pub fn with_lower_bound(mut self, lower_bound: LowerBound) -> Self {
        self.lower_bound = lower_bound;
        self
    }

    pub fn contains(&self, version: &Version) -> bool {
        let above_base = match self.lower_bound {
            LowerBound::Exclusive => self.base < *version,
            LowerBound::Inclusive => self.base <= *version,
        };
        above_base && *version <= self.head
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    Reverted,
    /// Cherry-picked into a release outside this window
    OutsideWindow { milestone: Version },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Included {
        sections: BTreeSet<SectionLabel>,
        /// Set when the cherry-picked label was dropped
        warning: Option<ReleaseWarning>,
    },
    Excluded(ExclusionReason),
}

impl Classification {
    pub fn is_included(&self) -> bool {
        matches!(self, Classification::Included { .. })
    }

    pub fn sections(&self) -> Option<&BTreeSet<SectionLabel>> {
        match self {
            Classification::Included { sections, .. } => Some(sections),
            Classification::Excluded(_) => None,
        }
    }
}

/// Decide whether `pr` belongs in the changelog for `window`, and under which sections.
pub fn classify(pr: &PullRequest, labels: &[Label], window: &ReleaseWindow) -> Classification {
    let mut sections: BTreeSet<SectionLabel> = labels.iter().filter_map(Label::section).collect();

    if sections.contains(&SectionLabel::Reverted) {
        return Classification::Excluded(ExclusionReason::Reverted);
    }

    let mut warning = None;
    if sections.contains(&SectionLabel::CherryPicked) {
        let title = pr
            .milestone
            .as_ref()
            .map(|milestone| milestone.title.as_str())
            .unwrap_or("");
        match Version::parse(title) {
            Ok(milestone) if window.contains(&milestone) => {}
            Ok(milestone) => {
                return Classification::Excluded(ExclusionReason::OutsideWindow { milestone });
            }
            Err(_) => {
                sections.remove(&SectionLabel::CherryPicked);
                warning = Some(ReleaseWarning::MilestoneParseFailure {
                    pr: pr.number,
                    milestone: title.to_string(),
                });
            }
        }
    }

    Classification::Included { sections, warning }
}
