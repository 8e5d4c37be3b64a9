//! User interface module - interaction (prompts) and formatting.
//!
//! Separates concerns:
//! - `formatter` - Pure formatting functions
//! - This module - the human-confirmation channel

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Mutex;

use crate::error::{Recovery, ReleaseError, Result};

pub mod formatter;

pub use formatter::{
    display_changelog, display_error, display_status, display_success, display_warning,
    format_transition,
};

/// Blocking human-confirmation channel
///
/// Used at every state-mutating checkpoint: diff review, merge-conflict
/// resolution, final go-ahead, draft-release publish.
pub trait Confirm: Send + Sync {
    /// Ask a yes/no question
    fn confirm(&self, message: &str) -> Result<bool>;

    /// Ask for a line of input, falling back to `default` on an empty answer
    fn prompt(&self, message: &str, default: &str) -> Result<String>;

    /// Block until the user acknowledges, aborting on "no"
    fn require(&self, message: &str) -> Result<()> {
        if self.confirm(message)? {
            Ok(())
        } else {
            Err(ReleaseError::aborted(message.to_string()))
        }
    }
}

/// Let the user repair a failed git step by hand.
///
/// Failures that a human can fix in the working copy (conflicting merges or
/// cherry-picks) block until the user confirms the fix; anything else is
/// returned unchanged.
pub fn recover_manually(prompter: &dyn Confirm, err: ReleaseError) -> Result<()> {
    if err.recovery() != Recovery::Escalate {
        return Err(err);
    }
    display_error(&err.to_string());
    prompter.require(
        "Please resolve this manually (git status, fix conflicts, git add ., git commit), then confirm",
    )
}

/// Prompts on the controlling terminal.
///
/// Accepts "y" or "yes" (case-insensitive) as confirmation. Default is "no"
/// if the user presses Enter.
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn read_line() -> Result<String> {
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_string())
    }
}

impl Confirm for TerminalPrompter {
    fn confirm(&self, message: &str) -> Result<bool> {
        print!("\n{} (y/N): ", console::style(message).bold());
        let response = Self::read_line()?.to_lowercase();
        Ok(response == "y" || response == "yes")
    }

    fn prompt(&self, message: &str, default: &str) -> Result<String> {
        print!("\n{} [{}]: ", console::style(message).bold(), default);
        let response = Self::read_line()?;
        if response.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(response)
        }
    }
}

/// Answers from a fixed script, recording every question asked
///
/// Once the script runs out every confirmation is answered with `fallback`
/// and every prompt with its default.
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<bool>>,
    inputs: Mutex<VecDeque<String>>,
    fallback: bool,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = bool>, fallback: bool) -> Self {
        ScriptedPrompter {
            answers: Mutex::new(answers.into_iter().collect()),
            inputs: Mutex::new(VecDeque::new()),
            fallback,
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Answer yes to everything
    pub fn always_yes() -> Self {
        Self::new([], true)
    }

    /// Answers for `prompt`, consumed in order
    pub fn with_inputs<S: Into<String>>(self, inputs: impl IntoIterator<Item = S>) -> Self {
        if let Ok(mut queue) = self.inputs.lock() {
            queue.extend(inputs.into_iter().map(Into::into));
        }
        self
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .map(|asked| asked.clone())
            .unwrap_or_default()
    }

    fn record(&self, message: &str) {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(message.to_string());
        }
    }
}

impl Confirm for ScriptedPrompter {
    fn confirm(&self, message: &str) -> Result<bool> {
        self.record(message);
        let next = self
            .answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front());
        Ok(next.unwrap_or(self.fallback))
    }

    fn prompt(&self, message: &str, default: &str) -> Result<String> {
        self.record(message);
        let next = self
            .inputs
            .lock()
            .ok()
            .and_then(|mut inputs| inputs.pop_front());
        Ok(next.unwrap_or_else(|| default.to_string()))
    }
}
