use crate::error::{ReleaseError, Result};
use crate::ui::Confirm;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

/// Runs the system `git` binary against one working copy
///
/// In step mode every command is shown and must be confirmed before it runs.
pub struct GitCommand {
    workdir: PathBuf,
    step: Option<Arc<dyn Confirm>>,
}

impl GitCommand {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        GitCommand {
            workdir: workdir.into(),
            step: None,
        }
    }

    pub fn with_step(mut self, prompter: Arc<dyn Confirm>) -> Self {
        self.step = Some(prompter);
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Run `git <args>` and return stdout
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let command_line = format!("git {}", args.join(" "));

        if let Some(prompter) = &self.step {
            let question = format!("Run `{}` in {}?", command_line, self.workdir.display());
            if !prompter.confirm(&question)? {
                return Err(ReleaseError::aborted(command_line));
            }
        }

        tracing::debug!(command = %command_line, dir = %self.workdir.display(), "Running git");
        let output = self.git_cmd().args(args).output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let captured = if stderr.is_empty() { stdout } else { stderr };
            return Err(ReleaseError::command_failed(command_line, captured));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }

    fn git_cmd(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.workdir);
        cmd.arg("-c").arg("advice.detachedHead=false");
        cmd.arg("-c").arg("core.quotePath=false");
        cmd
    }
}
