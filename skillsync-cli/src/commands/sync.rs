//! `skillsync sync`: process one event in the foreground.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use skillsync_core::SyncEvent;
use skillsync_daemon::init_tracing;
use skillsync_sync::{SkillSync, SyncReport, UpsertOutcome};

use super::{home_dir, load_config, read_json};

const ORIGINATOR: &str = "skillsync-cli";

/// Arguments for `skillsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Handle of the user to sync; builds an event on the configured topic.
    #[arg(long, conflicts_with = "event", required_unless_present = "event")]
    pub handle: Option<String>,

    /// Path to a JSON sync event (`-` reads stdin).
    #[arg(long)]
    pub event: Option<PathBuf>,

    /// Print the sync report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let config = load_config(&home)?;

        let event = match (self.handle, self.event) {
            (Some(handle), None) => {
                SyncEvent::for_handle(&config.transport.topic, ORIGINATOR, &handle)
            }
            (None, Some(path)) => SyncEvent::from_value(read_json(&path)?)
                .with_context(|| format!("invalid sync event in {}", path.display()))?,
            _ => bail!("provide either --handle or --event"),
        };
        event.validate().context("invalid sync event")?;

        init_tracing(&config);
        let sync = SkillSync::from_config(&config).context("failed to set up sync clients")?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        let report = runtime
            .block_on(sync.process(&event))
            .with_context(|| format!("sync failed for '{}'", event.handle()))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render sync report")?
            );
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_report(report: &SyncReport) {
    if report.outcomes.is_empty() {
        println!(
            "{} '{}' has no skills upstream, nothing to do",
            "✓".green().bold(),
            report.handle
        );
        return;
    }

    println!(
        "{} '{}' synced ({} created, {} updated) in {} ms",
        "✓".green().bold(),
        report.handle,
        report.created(),
        report.updated(),
        report.duration_ms
    );
    for skill in &report.outcomes {
        match &skill.outcome {
            UpsertOutcome::Created { metric_value, .. } => {
                println!("  {}  {} = {}", "+".green(), skill.skill, metric_value);
            }
            UpsertOutcome::Updated {
                previous,
                metric_value,
                ..
            } => {
                let previous = previous.as_deref().unwrap_or("-");
                println!(
                    "  {}  {} {} → {}",
                    "~".yellow(),
                    skill.skill,
                    previous.dimmed(),
                    metric_value
                );
            }
        }
    }
}
