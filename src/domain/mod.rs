//! Domain logic - pure value types independent of git and the hosting service

pub mod branch;
pub mod label;
pub mod pull_request;
pub mod version;

pub use branch::{Branch, BranchRef, ProjectBranches};
pub use label::{Label, SectionLabel};
pub use pull_request::{
    Author, Issue, Milestone, NewPullRequest, NewRelease, PullRequest, PullRequestFilter, Release,
    State,
};
pub use version::{Version, VersionFields};
