//! skillsync: reconcile member skills into the profile store.
//!
//! # Usage
//!
//! ```text
//! skillsync sync --handle <handle> [--json]
//! skillsync sync --event <file.json> [--json]
//! skillsync daemon start|stop|status
//! skillsync daemon submit <file.json>
//! skillsync config [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigArgs, daemon::DaemonCommand, sync::SyncArgs};

#[derive(Parser, Debug)]
#[command(
    name = "skillsync",
    version,
    about = "Sync member skills from the members service into the profile store",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process one sync event in the foreground.
    Sync(SyncArgs),

    /// Run or talk to the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Print the effective configuration (secrets redacted).
    Config(ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
        Commands::Config(args) => args.run(),
    }
}
