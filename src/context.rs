use crate::config::Config;
use crate::error::{ReleaseError, Result};
use crate::hosting::{CodeHosting, GitHubClient};
use crate::project::Project;
use crate::ui::Confirm;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

/// Everything one release run works with
///
/// Built once by the binary (or a test) and passed explicitly to every
/// orchestration step.
pub struct ReleaseContext {
    pub config: Config,
    /// Projects that are cut and published, in configuration order
    pub projects: Vec<Project>,
    pub hosting: Arc<dyn CodeHosting>,
    pub prompter: Arc<dyn Confirm>,
    /// Date used in patch-release headings
    pub today: NaiveDate,
    /// Wait before repeating a rate-limited hosting call
    pub retry_delay: Duration,
}

impl ReleaseContext {
    pub fn new(
        config: Config,
        projects: Vec<Project>,
        hosting: Arc<dyn CodeHosting>,
        prompter: Arc<dyn Confirm>,
        today: NaiveDate,
    ) -> Self {
        ReleaseContext {
            config,
            projects,
            hosting,
            prompter,
            today,
            retry_delay: RATE_LIMIT_BACKOFF,
        }
    }

    /// Open every release project's working copy and connect to GitHub
    pub fn open(config: Config, prompter: Arc<dyn Confirm>, today: NaiveDate) -> Result<Self> {
        let token = config.github_token();
        if token.is_none() {
            tracing::warn!("No GitHub token configured, API requests are unauthenticated");
        }
        let client = GitHubClient::new(config.organization.clone(), token.as_deref())?;
        if let Err(e) = client.log_rate_limit() {
            tracing::debug!(error = %e, "Could not read rate limit");
        }

        let step = config.step.then(|| prompter.clone());
        let projects = config
            .release_projects()
            .map(|project| Project::open(project.clone(), step.clone()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(config, projects, Arc::new(client), prompter, today))
    }

    pub fn hosting(&self) -> &dyn CodeHosting {
        self.hosting.as_ref()
    }

    pub fn prompter(&self) -> &dyn Confirm {
        self.prompter.as_ref()
    }

    pub fn project(&self, shortname: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.shortname() == shortname)
    }

    /// The project whose releases define the base version
    pub fn primary(&self) -> Result<&Project> {
        self.projects
            .first()
            .ok_or_else(|| ReleaseError::config("no release project configured"))
    }

    /// Hosting repositories that take part in milestone rollover
    pub fn milestone_repos(&self) -> Vec<&str> {
        self.config
            .projects
            .iter()
            .filter(|p| p.milestones)
            .map(|p| p.name.as_str())
            .collect()
    }
}
