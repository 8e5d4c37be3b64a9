use crate::changelog::LowerBound;
use crate::domain::ProjectBranches;
use crate::error::{ReleaseError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "esphome-release.toml";
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// Represents the complete configuration for esphome-release.
///
/// Contains the hosting organization, changelog policy and the set of projects
/// the release is cut across.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_organization")]
    pub organization: String,

    /// Overridden by the `GITHUB_TOKEN` environment variable
    #[serde(default)]
    pub github_token: Option<String>,

    /// Prompt before every git command
    #[serde(default)]
    pub step: bool,

    #[serde(default)]
    pub changelog: ChangelogConfig,

    #[serde(default = "default_projects")]
    pub projects: Vec<ProjectConfig>,
}

fn default_organization() -> String {
    "esphome".to_string()
}

fn default_size_limit() -> usize {
    65_000
}

fn default_website_url() -> String {
    "https://esphome.io/changelog/{version}.html".to_string()
}

fn default_docs_project() -> Option<String> {
    Some("docs".to_string())
}

fn default_docs_page() -> String {
    "src/content/docs/changelog/{version}.mdx".to_string()
}

/// Changelog rendering policy
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ChangelogConfig {
    /// Characters above which a release body is replaced by the website link
    #[serde(default = "default_size_limit")]
    pub size_limit: usize,

    /// Changelog page template, `{version}` is the release line
    #[serde(default = "default_website_url")]
    pub website_url: String,

    #[serde(default)]
    pub cherry_pick_lower_bound: LowerBound,

    /// Logins that are never mentioned
    #[serde(default)]
    pub silent_authors: Vec<String>,

    /// Shortname of the project that hosts the changelog pages
    #[serde(default = "default_docs_project")]
    pub docs_project: Option<String>,

    /// Changelog page inside the docs project, `{version}` is the release line
    #[serde(default = "default_docs_page")]
    pub docs_page: String,
}

impl Default for ChangelogConfig {
    fn default() -> Self {
        ChangelogConfig {
            size_limit: default_size_limit(),
            website_url: default_website_url(),
            cherry_pick_lower_bound: LowerBound::default(),
            silent_authors: Vec::new(),
            docs_project: default_docs_project(),
            docs_page: default_docs_page(),
        }
    }
}

/// A regex replacement applied to one file when bumping the version.
///
/// `{version}` in `replacement` is substituted with the new version.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VersionFile {
    pub path: PathBuf,
    pub pattern: String,
    pub replacement: String,
}

/// One repository taking part in the release.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Repository name on the hosting service
    pub name: String,

    /// Prefix used in PR references
    pub shortname: String,

    /// Local working copy
    pub path: PathBuf,

    #[serde(default)]
    pub stable_branch: Option<String>,

    #[serde(default)]
    pub beta_branch: Option<String>,

    #[serde(default)]
    pub dev_branch: Option<String>,

    /// Participates in cut/publish
    #[serde(default)]
    pub release: bool,

    /// Participates in milestone rollover
    #[serde(default)]
    pub milestones: bool,

    /// First beta and first full release bodies link to the website changelog
    #[serde(default)]
    pub website_changelog: bool,

    /// Program run with the new version as last argument
    #[serde(default)]
    pub bump_command: Vec<String>,

    #[serde(default)]
    pub version_files: Vec<VersionFile>,
}

impl ProjectConfig {
    pub fn branches(&self) -> ProjectBranches {
        ProjectBranches {
            stable: self.stable_branch.clone(),
            beta: self.beta_branch.clone(),
            dev: self.dev_branch.clone(),
        }
    }
}

fn default_projects() -> Vec<ProjectConfig> {
    let bump = vec!["script/bump-version.py".to_string()];
    vec![
        ProjectConfig {
            name: "esphome".to_string(),
            shortname: "esphome".to_string(),
            path: PathBuf::from("../esphome"),
            stable_branch: Some("release".to_string()),
            beta_branch: Some("beta".to_string()),
            dev_branch: Some("dev".to_string()),
            release: true,
            milestones: true,
            website_changelog: true,
            bump_command: bump.clone(),
            version_files: Vec::new(),
        },
        ProjectConfig {
            name: "esphome-docs".to_string(),
            shortname: "docs".to_string(),
            path: PathBuf::from("../esphome-docs"),
            stable_branch: Some("current".to_string()),
            beta_branch: Some("beta".to_string()),
            dev_branch: Some("next".to_string()),
            release: true,
            milestones: true,
            website_changelog: false,
            bump_command: bump,
            version_files: Vec::new(),
        },
        ProjectConfig {
            name: "issues".to_string(),
            shortname: "issues".to_string(),
            path: PathBuf::from("../issues"),
            stable_branch: None,
            beta_branch: None,
            dev_branch: None,
            release: false,
            milestones: true,
            website_changelog: false,
            bump_command: Vec::new(),
            version_files: Vec::new(),
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Config {
            organization: default_organization(),
            github_token: None,
            step: false,
            changelog: ChangelogConfig::default(),
            projects: default_projects(),
        }
    }
}

impl Config {
    /// Parse and validate a TOML document
    pub fn from_toml(text: &str) -> Result<Config> {
        let config: Config = toml::from_str(text)
            .map_err(|e| ReleaseError::config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field rules that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.projects.is_empty() {
            return Err(ReleaseError::config("at least one project is required"));
        }
        if self.changelog.size_limit == 0 {
            return Err(ReleaseError::config("changelog.size_limit must be positive"));
        }
        if !self.changelog.website_url.contains("{version}") {
            return Err(ReleaseError::config(format!(
                "changelog.website_url '{}' has no {{version}} placeholder",
                self.changelog.website_url
            )));
        }

        let mut shortnames = HashSet::new();
        let mut names = HashSet::new();
        for project in &self.projects {
            if !shortnames.insert(project.shortname.as_str()) {
                return Err(ReleaseError::config(format!(
                    "duplicate project shortname '{}'",
                    project.shortname
                )));
            }
            if !names.insert(project.name.as_str()) {
                return Err(ReleaseError::config(format!(
                    "duplicate project name '{}'",
                    project.name
                )));
            }
            if project.release
                && (project.stable_branch.is_none()
                    || project.beta_branch.is_none()
                    || project.dev_branch.is_none())
            {
                return Err(ReleaseError::config(format!(
                    "release project '{}' needs stable, beta and dev branches",
                    project.name
                )));
            }
            if !project.bump_command.is_empty() && !project.version_files.is_empty() {
                return Err(ReleaseError::config(format!(
                    "project '{}' sets both bump_command and version_files",
                    project.name
                )));
            }
            for file in &project.version_files {
                Regex::new(&file.pattern).map_err(|e| {
                    ReleaseError::config(format!(
                        "invalid version pattern for {}: {}",
                        file.path.display(),
                        e
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Token from the environment, falling back to the file
    pub fn github_token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV_VAR)
            .ok()
            .filter(|token| !token.is_empty())
            .or_else(|| self.github_token.clone())
    }

    pub fn project(&self, shortname: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.shortname == shortname)
    }

    /// Projects that are cut and published
    pub fn release_projects(&self) -> impl Iterator<Item = &ProjectConfig> {
        self.projects.iter().filter(|p| p.release)
    }
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `esphome-release.toml` in current directory
/// 3. `esphome-release.toml` in the user config directory
/// 4. Default configuration if no file found
///
/// # Returns
/// * `Ok(Config)` - Loaded or default configuration
/// * `Err` - If a file exists but cannot be read, parsed or validated
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => discover_config(),
    };

    match path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading configuration");
            let text = fs::read_to_string(&path).map_err(|e| {
                ReleaseError::config(format!("cannot read {}: {}", path.display(), e))
            })?;
            Config::from_toml(&text)
        }
        None => {
            tracing::debug!("No configuration file found, using defaults");
            Ok(Config::default())
        }
    }
}

fn discover_config() -> Option<PathBuf> {
    let local = Path::new(".").join(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.release_projects().count(), 2);
        assert_eq!(config.changelog.size_limit, 65_000);
        assert_eq!(
            config.project("docs").unwrap().branches().dev.as_deref(),
            Some("next")
        );
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = Config::from_toml("organisation = \"typo\"").unwrap_err();
        assert!(err.to_string().contains("organisation"));
    }

    #[test]
    fn test_website_url_requires_placeholder() {
        let err = Config::from_toml("[changelog]\nwebsite_url = \"https://example.com\"\n")
            .unwrap_err();
        assert!(matches!(err, ReleaseError::Config(_)));
    }

    #[test]
    fn test_release_project_requires_branches() {
        let text = r#"
[[projects]]
name = "firmware"
shortname = "fw"
path = "."
release = true
stable_branch = "main"
"#;
        let err = Config::from_toml(text).unwrap_err();
        assert!(err.to_string().contains("needs stable, beta and dev"));
    }

    #[test]
    fn test_duplicate_shortnames_are_rejected() {
        let text = r#"
[[projects]]
name = "a"
shortname = "x"
path = "a"

[[projects]]
name = "b"
shortname = "x"
path = "b"
"#;
        assert!(Config::from_toml(text).is_err());
    }
}
