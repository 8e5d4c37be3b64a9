use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use esphome_release::changelog::Format;
use esphome_release::config;
use esphome_release::context::ReleaseContext;
use esphome_release::cutting::{self, ReleaseNotesOptions, ReleaseReport};
use esphome_release::domain::Version;
use esphome_release::logging;
use esphome_release::ui::{self, TerminalPrompter};

#[derive(Parser)]
#[command(
    name = "esphome-release",
    version,
    about = "Cut and publish ESPHome releases across its repositories"
)]
struct Args {
    #[arg(short, long, global = true, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Prompt before each git command is executed")]
    step: bool,

    #[arg(short, long, global = true, action = clap::ArgAction::Count, help = "More log output (-v, -vv)")]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Cut a release: prepare bump branches and open release pull requests
    Cut { version: String },

    /// Publish a release: merge the release pull requests and create the releases
    Publish { version: String },

    /// Generate release notes
    ReleaseNotes {
        #[arg(long, help = "Group entries under section headings")]
        with_sections: bool,

        #[arg(long, help = "Leave out author mentions")]
        no_author: bool,

        #[arg(long, help = "Render Markdown instead of reStructuredText")]
        markdown: bool,

        #[arg(long, help = "Base version")]
        base_ref: Option<String>,

        #[arg(long, help = "Head ref: dev, beta, stable or a version")]
        head_ref: Option<String>,

        #[arg(long, help = "Head version")]
        head_version: Option<String>,
    },

    /// Cherry-pick the pull requests of a milestone onto the current branches
    MilestoneCherryPick { milestone: String },

    /// Reset branches to their upstream versions
    Reset,
}

fn main() {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Err(e) = run(args) {
        ui::display_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut config =
        config::load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if args.step {
        config.step = true;
    }

    let today = chrono::Local::now().date_naive();
    let ctx = ReleaseContext::open(config, Arc::new(TerminalPrompter), today)?;

    match args.command {
        Command::Cut { version } => {
            let version = parse_version(&version)?;
            let report = cutting::cut(&ctx, &version)?;
            summarize(&report);
            ui::display_success(&format!("Cut {}", version));
        }
        Command::Publish { version } => {
            let version = parse_version(&version)?;
            let report = cutting::publish_version(&ctx, &version)?;
            summarize(&report);
            ui::display_success(&format!("Published {}", version));
        }
        Command::ReleaseNotes {
            with_sections,
            no_author,
            markdown,
            base_ref,
            head_ref,
            head_version,
        } => {
            let options = ReleaseNotesOptions {
                base_ref,
                head_ref,
                head_version,
                with_sections,
                include_author: !no_author,
                format: if markdown {
                    Format::Markdown
                } else {
                    Format::ReStructuredText
                },
            };
            let changelog = cutting::release_notes(&ctx, &options)?;
            ui::display_changelog(&changelog.text);
            for warning in &changelog.warnings {
                ui::display_warning(warning);
            }
            ui::display_status(&format!(
                "{} pull requests included, {} excluded",
                changelog.included, changelog.excluded
            ));
        }
        Command::MilestoneCherryPick { milestone } => {
            let report = cutting::milestone_cherry_pick(&ctx, &milestone)?;
            summarize(&report);
        }
        Command::Reset => cutting::reset(&ctx)?,
    }
    Ok(())
}

fn parse_version(text: &str) -> Result<Version> {
    Version::parse(text.strip_prefix('v').unwrap_or(text))
        .with_context(|| format!("'{}' is not a release version", text))
}

fn summarize(report: &ReleaseReport) {
    for (repo, number) in &report.pull_requests {
        ui::display_status(&format!("Opened {}#{}", repo, number));
    }
    for (repo, number) in &report.merged {
        ui::display_status(&format!("Merged {}#{}", repo, number));
    }
    for (repo, tag) in &report.releases {
        ui::display_status(&format!("Released {} {}", repo, tag));
    }
    if report.docs_changelog.is_some() {
        ui::display_status("Committed changelog to the docs bump branch");
    }
    if !report.cherry_picked.is_empty() {
        ui::display_status(&format!(
            "Cherry-picked {} pull requests",
            report.cherry_picked.len()
        ));
    }
    for warning in &report.warnings {
        ui::display_warning(warning);
    }
}
