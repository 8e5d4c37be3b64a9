//! Pure formatting functions for UI output.
//!
//! Diagnostics go to stderr; the rendered changelog goes to stdout so it can be piped.

use crate::warning::ReleaseWarning;
use console::style;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    eprintln!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    eprintln!("{} {}", style("→").yellow(), message);
}

pub fn display_warning(warning: &ReleaseWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

/// Print a rendered changelog, framed when writing to a terminal.
pub fn display_changelog(text: &str) {
    if console::user_attended() {
        eprintln!("{}", style("----- changelog -----").dim());
        println!("{}", text.trim_end());
        eprintln!("{}", style("---------------------").dim());
    } else {
        print!("{}", text);
    }
}

/// One-line summary of a pending cut, e.g. `esphome: 2024.6.0b1 -> 2024.6.0b2 (beta)`
pub fn format_transition(project: &str, from: &str, to: &str, branch: &str) -> String {
    format!("{}: {} -> {} ({})", project, from, to, branch)
}
