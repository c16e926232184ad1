//! `skillsync daemon`: background sync daemon lifecycle.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;

use skillsync_daemon::paths::socket_path;
use skillsync_daemon::{request_status, request_stop, request_sync, start_blocking, DaemonError};

use super::{home_dir, read_json};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run daemon in foreground (socket server + sync processor).
    Start,
    /// Request graceful daemon shutdown over Unix socket.
    Stop,
    /// Query daemon runtime status over Unix socket.
    Status,
    /// Hand a JSON sync event to the running daemon and wait for the result.
    Submit {
        /// Path to the event (`-` reads stdin).
        event: PathBuf,
    },
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = home_dir()?;

    match command {
        DaemonCommand::Start => {
            start_blocking(&home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => {
            let payload = match request_status(&home) {
                Ok(status) => status,
                Err(DaemonError::DaemonNotRunning { .. }) => serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                }),
                Err(err) => return Err(err).context("failed to query daemon status"),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to render daemon status JSON")?
            );
        }
        DaemonCommand::Submit { event } => {
            let raw = read_json(&event)?;
            let summary = request_sync(&home, raw)
                .with_context(|| format!("daemon rejected {}", event.display()))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&summary)
                    .context("failed to render sync summary JSON")?
            );
        }
    }

    Ok(())
}
