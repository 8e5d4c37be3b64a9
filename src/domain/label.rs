//! Pull-request label taxonomy.
//!
//! Section labels are a closed set; anything else the hosting service reports is kept as
//! [`Label::Other`] and ignored for sectioning.

use std::fmt;

/// Labels that drive changelog placement, in their declared order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SectionLabel {
    NewFeature,
    NewComponent,
    NewPlatform,
    BreakingChange,
    NotableChange,
    CherryPicked,
    Dependencies,
    Reverted,
}

impl SectionLabel {
    pub const ALL: [SectionLabel; 8] = [
        SectionLabel::NewFeature,
        SectionLabel::NewComponent,
        SectionLabel::NewPlatform,
        SectionLabel::BreakingChange,
        SectionLabel::NotableChange,
        SectionLabel::CherryPicked,
        SectionLabel::Dependencies,
        SectionLabel::Reverted,
    ];

    /// Name of the label on the hosting service
    pub fn name(&self) -> &'static str {
        match self {
            SectionLabel::NewFeature => "new-feature",
            SectionLabel::NewComponent => "new-component",
            SectionLabel::NewPlatform => "new-platform",
            SectionLabel::BreakingChange => "breaking-change",
            SectionLabel::NotableChange => "notable-change",
            SectionLabel::CherryPicked => "cherry-picked",
            SectionLabel::Dependencies => "dependencies",
            SectionLabel::Reverted => "reverted",
        }
    }

    pub fn from_name(name: &str) -> Option<SectionLabel> {
        SectionLabel::ALL
            .iter()
            .copied()
            .find(|label| label.name() == name)
    }

    /// Changelog heading, `None` for labels that never get a section
    pub fn heading(&self) -> Option<&'static str> {
        match self {
            SectionLabel::NewFeature => Some("New Features"),
            SectionLabel::NewComponent => Some("New Components"),
            SectionLabel::NewPlatform => Some("New Platforms"),
            SectionLabel::BreakingChange => Some("Breaking Changes"),
            SectionLabel::NotableChange => Some("Notable Changes"),
            SectionLabel::CherryPicked => Some("Beta Changes"),
            SectionLabel::Dependencies => Some("Dependency Changes"),
            SectionLabel::Reverted => None,
        }
    }

    /// Shown as a `(label)` annotation after the changelog line
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            SectionLabel::NewFeature
                | SectionLabel::NewComponent
                | SectionLabel::NewPlatform
                | SectionLabel::BreakingChange
                | SectionLabel::NotableChange
        )
    }
}

impl fmt::Display for SectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Any label attached to a pull request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    Section(SectionLabel),
    Other(String),
}

impl Label {
    pub fn parse(name: &str) -> Label {
        match SectionLabel::from_name(name) {
            Some(section) => Label::Section(section),
            None => Label::Other(name.to_string()),
        }
    }

    pub fn section(&self) -> Option<SectionLabel> {
        match self {
            Label::Section(section) => Some(*section),
            Label::Other(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Label::Section(section) => section.name(),
            Label::Other(name) => name,
        }
    }
}

impl From<&str> for Label {
    fn from(name: &str) -> Self {
        Label::parse(name)
    }
}

impl From<SectionLabel> for Label {
    fn from(section: SectionLabel) -> Self {
        Label::Section(section)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
