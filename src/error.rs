use thiserror::Error;

/// Unified error type for release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Invalid version '{value}': {reason}")]
    InvalidVersionFormat { value: String, reason: String },

    #[error("Invalid version transition from {version}: {reason}")]
    InvalidTransition { version: String, reason: String },

    #[error("Command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Branch is leased to '{held}', cannot work on '{requested}'")]
    BranchLeased { held: String, requested: String },

    #[error("Aborted: {0}")]
    Aborted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in esphome-release
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// What the orchestrator should do with a failed step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Transient, the same call can be issued again
    Retry,
    /// A human can fix the working copy and resume
    Escalate,
    /// Give up on the step
    Abort,
}

impl ReleaseError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseError::Config(msg.into())
    }

    /// Create a version format error naming the offending value and the broken rule
    pub fn invalid_version(value: impl Into<String>, reason: impl Into<String>) -> Self {
        ReleaseError::InvalidVersionFormat {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a transition error for a derived-version precondition
    pub fn invalid_transition(version: impl ToString, reason: impl Into<String>) -> Self {
        ReleaseError::InvalidTransition {
            version: version.to_string(),
            reason: reason.into(),
        }
    }

    pub fn command_failed(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        ReleaseError::CommandFailed {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    pub fn aborted(msg: impl Into<String>) -> Self {
        ReleaseError::Aborted(msg.into())
    }

    /// Classify the failure for the orchestrator's recovery policy
    pub fn recovery(&self) -> Recovery {
        match self {
            ReleaseError::RateLimited(_) => Recovery::Retry,
            ReleaseError::CommandFailed { .. } => Recovery::Escalate,
            _ => Recovery::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReleaseError::config("missing projects");
        assert_eq!(err.to_string(), "Configuration error: missing projects");
    }

    #[test]
    fn test_invalid_version_names_value_and_rule() {
        let err = ReleaseError::invalid_version("1.2.3b0", "beta number must be at least 1");
        let msg = err.to_string();
        assert!(msg.contains("1.2.3b0"));
        assert!(msg.contains("beta number must be at least 1"));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = ReleaseError::invalid_transition("1.2.0", "patch is already 0");
        assert_eq!(
            err.to_string(),
            "Invalid version transition from 1.2.0: patch is already 0"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ReleaseError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_recovery_classification() {
        assert_eq!(
            ReleaseError::RateLimited("reset in 10s".into()).recovery(),
            Recovery::Retry
        );
        assert_eq!(
            ReleaseError::command_failed("git merge dev", "CONFLICT").recovery(),
            Recovery::Escalate
        );
        assert_eq!(
            ReleaseError::NotFound("pull request #3".into()).recovery(),
            Recovery::Abort
        );
        assert_eq!(
            ReleaseError::invalid_version("x", "y").recovery(),
            Recovery::Abort
        );
    }

    #[test]
    fn test_command_failed_keeps_stderr() {
        let err = ReleaseError::command_failed("git cherry-pick abc", "error: could not apply");
        let msg = err.to_string();
        assert!(msg.starts_with("Command failed: git cherry-pick abc"));
        assert!(msg.contains("could not apply"));
    }
}
