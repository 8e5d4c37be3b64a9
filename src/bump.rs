//! Writing a new version into a project's tracked files.

use crate::config::VersionFile;
use crate::domain::Version;
use crate::error::{ReleaseError, Result};
use crate::project::Project;
use crate::ui::Confirm;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Bump the project to `version` and commit the result.
///
/// Returns `false` when nothing changed and no commit was made.
pub fn bump_version(project: &Project, version: &Version) -> Result<bool> {
    let config = project.config();
    if !config.bump_command.is_empty() {
        run_bump_command(project.path(), &config.bump_command, version, project.step())?;
    } else if !config.version_files.is_empty() {
        apply_version_files(project.path(), &config.version_files, version)?;
    } else {
        tracing::warn!(project = %project.name(), "No version bump configured");
    }

    project.scm().add_all()?;
    let committed = project
        .scm()
        .commit(&format!("Bump version to {}", version.tag()), true)?;
    tracing::info!(project = %project.name(), %version, committed, "Bumped version");
    Ok(committed)
}

fn command_line(command: &[String], version: &str) -> String {
    command
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(version))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `command` in `dir` with the version appended as the last argument
///
/// With a `step` prompter the command line must be confirmed first.
pub fn run_bump_command(
    dir: &Path,
    command: &[String],
    version: &Version,
    step: Option<&dyn Confirm>,
) -> Result<()> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| ReleaseError::config("empty bump command"))?;
    let version = version.to_string();
    let shown = command_line(command, &version);

    if let Some(prompter) = step {
        let question = format!("Run `{}` in {}?", shown, dir.display());
        if !prompter.confirm(&question)? {
            return Err(ReleaseError::aborted(shown));
        }
    }

    tracing::debug!(command = %shown, dir = %dir.display(), "Running bump command");
    let output = Command::new(program)
        .args(args)
        .arg(&version)
        .current_dir(dir)
        .output()?;
    if !output.status.success() {
        return Err(ReleaseError::command_failed(
            shown,
            String::from_utf8_lossy(&output.stderr).trim(),
        ));
    }
    Ok(())
}

/// Apply each regex replacement; every pattern must match exactly once
pub fn apply_version_files(
    dir: &Path,
    files: &[VersionFile],
    version: &Version,
) -> Result<Vec<PathBuf>> {
    let version = version.to_string();
    let mut changed = Vec::new();

    for file in files {
        let path = dir.join(&file.path);
        let pattern = Regex::new(&file.pattern)
            .map_err(|e| ReleaseError::config(format!("invalid version pattern: {}", e)))?;
        let content = fs::read_to_string(&path)?;

        let matches = pattern.find_iter(&content).count();
        if matches != 1 {
            return Err(ReleaseError::config(format!(
                "version pattern '{}' matched {} times in {}, expected exactly once",
                file.pattern,
                matches,
                path.display()
            )));
        }

        let replacement = file.replacement.replace("{version}", &version);
        let updated = pattern.replace(&content, replacement.as_str());
        if updated != content {
            fs::write(&path, updated.as_bytes())?;
            changed.push(path);
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::ScriptedPrompter;

    fn const_file() -> VersionFile {
        VersionFile {
            path: PathBuf::from("const.py"),
            pattern: r#"__version__ = "[^"]+""#.to_string(),
            replacement: r#"__version__ = "{version}""#.to_string(),
        }
    }

    #[test]
    fn test_apply_version_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("const.py"),
            "MAJOR = 2024\n__version__ = \"2024.6.0-dev\"\n",
        )
        .unwrap();

        let version = Version::parse("2024.6.0b1").unwrap();
        let changed = apply_version_files(dir.path(), &[const_file()], &version).unwrap();

        assert_eq!(changed.len(), 1);
        let content = fs::read_to_string(dir.path().join("const.py")).unwrap();
        assert_eq!(content, "MAJOR = 2024\n__version__ = \"2024.6.0b1\"\n");
    }

    #[test]
    fn test_pattern_must_match_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("const.py"), "nothing here\n").unwrap();
        let version = Version::new(1, 0, 0);
        let err = apply_version_files(dir.path(), &[const_file()], &version).unwrap_err();
        assert!(err.to_string().contains("matched 0 times"));

        fs::write(
            dir.path().join("const.py"),
            "__version__ = \"1\"\n__version__ = \"2\"\n",
        )
        .unwrap();
        let err = apply_version_files(dir.path(), &[const_file()], &version).unwrap_err();
        assert!(err.to_string().contains("matched 2 times"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_bump_command_appends_version() {
        let dir = tempfile::tempdir().unwrap();
        let command = vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo \"$0\" > VERSION".to_string(),
        ];
        run_bump_command(dir.path(), &command, &Version::new_dev(1, 3, 0), None).unwrap();
        let written = fs::read_to_string(dir.path().join("VERSION")).unwrap();
        assert_eq!(written.trim(), "1.3.0-dev");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_bump_command() {
        let dir = tempfile::tempdir().unwrap();
        let command = vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
        let err = run_bump_command(dir.path(), &command, &Version::new(1, 0, 0), None).unwrap_err();
        assert!(matches!(err, ReleaseError::CommandFailed { .. }));
    }

    #[test]
    fn test_command_line_single_spaced() {
        assert_eq!(command_line(&["bump.py".to_string()], "1.2.3"), "bump.py 1.2.3");
        assert_eq!(
            command_line(&["python".to_string(), "bump.py".to_string()], "1.2.3"),
            "python bump.py 1.2.3"
        );
    }

    #[test]
    fn test_step_mode_declined_skips_bump_command() {
        let dir = tempfile::tempdir().unwrap();
        let prompter = ScriptedPrompter::new([false], false);
        let command = vec!["touch".to_string()];
        let err = run_bump_command(dir.path(), &command, &Version::new(1, 0, 0), Some(&prompter))
            .unwrap_err();
        assert!(matches!(err, ReleaseError::Aborted(_)));
        assert_eq!(prompter.asked().len(), 1);
        assert!(prompter.asked()[0].starts_with("Run `touch 1.0.0` in "));
        assert!(!dir.path().join("1.0.0").exists());
    }
}
