use crate::error::{ReleaseError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbolic branch role, resolved per project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    Stable,
    Beta,
    Dev,
}

impl Branch {
    pub const ALL: [Branch; 3] = [Branch::Stable, Branch::Beta, Branch::Dev];
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::Stable => write!(f, "stable"),
            Branch::Beta => write!(f, "beta"),
            Branch::Dev => write!(f, "dev"),
        }
    }
}

/// Either a role or a literal branch/ref name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BranchRef {
    Role(Branch),
    Named(String),
}

impl From<Branch> for BranchRef {
    fn from(branch: Branch) -> Self {
        BranchRef::Role(branch)
    }
}

impl From<&str> for BranchRef {
    fn from(name: &str) -> Self {
        BranchRef::Named(name.to_string())
    }
}

impl From<String> for BranchRef {
    fn from(name: String) -> Self {
        BranchRef::Named(name)
    }
}

impl fmt::Display for BranchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchRef::Role(role) => write!(f, "{}", role),
            BranchRef::Named(name) => write!(f, "{}", name),
        }
    }
}

/// A project's role-to-branch mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProjectBranches {
    #[serde(default)]
    pub stable: Option<String>,
    #[serde(default)]
    pub beta: Option<String>,
    #[serde(default)]
    pub dev: Option<String>,
}

impl ProjectBranches {
    pub fn get(&self, role: Branch) -> Option<&str> {
        match role {
            Branch::Stable => self.stable.as_deref(),
            Branch::Beta => self.beta.as_deref(),
            Branch::Dev => self.dev.as_deref(),
        }
    }

    /// Resolve a reference to a literal branch name
    pub fn resolve(&self, branch: &BranchRef) -> Result<String> {
        match branch {
            BranchRef::Named(name) => Ok(name.clone()),
            BranchRef::Role(role) => self.get(*role).map(str::to_string).ok_or_else(|| {
                ReleaseError::config(format!("no {} branch configured", role))
            }),
        }
    }

    /// Configured roles with their branch names
    pub fn roles(&self) -> Vec<(Branch, &str)> {
        Branch::ALL
            .iter()
            .filter_map(|role| self.get(*role).map(|name| (*role, name)))
            .collect()
    }
}
