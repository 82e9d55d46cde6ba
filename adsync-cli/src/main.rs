//! adsyncd: directory group to local account synchronisation.
//!
//! # Usage
//!
//! ```text
//! adsyncd [-c <config>] [start]
//! adsyncd [-c <config>] sync|reload|stop
//! adsyncd [-c <config>] status [--json]
//! adsyncd [-c <config>] once [--dry-run]
//! adsyncd [-c <config>] plan [--json]
//! adsyncd [-c <config>] accounts [--json]
//! adsyncd [-c <config>] logs [--lines <n>]
//! adsyncd [-c <config>] check-config
//! adsyncd [-c <config>] service install|uninstall
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use adsync_core::DEFAULT_CONFIG_PATH;
use commands::{
    accounts::AccountsArgs,
    daemon::{LogsArgs, StatusArgs},
    once::{OnceArgs, PlanArgs},
    service::ServiceCommand,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "adsyncd",
    version,
    about = "Keep local Linux accounts in step with a directory group",
    long_about = None,
)]
struct Cli {
    /// Path of the YAML configuration file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the daemon in the foreground (default).
    Start,

    /// Ask the running daemon for an immediate cycle.
    Sync,

    /// Ask the running daemon to re-read its configuration.
    Reload,

    /// Ask the running daemon to shut down.
    Stop,

    /// Show whether the daemon is running.
    Status(StatusArgs),

    /// Run a single cycle in this process and exit.
    Once(OnceArgs),

    /// Show what a cycle would create and remove.
    Plan(PlanArgs),

    /// List local accounts in the sync group.
    Accounts(AccountsArgs),

    /// Print recent lines of the daemon log file.
    Logs(LogsArgs),

    /// Load and validate the configuration file.
    CheckConfig,

    /// Manage the systemd service.
    Service {
        #[command(subcommand)]
        command: ServiceCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config;
    match cli.command.unwrap_or(Commands::Start) {
        Commands::Start => commands::daemon::start(&config),
        Commands::Sync => commands::daemon::forward(&config, adsync_daemon::Trigger::Sync),
        Commands::Reload => commands::daemon::forward(&config, adsync_daemon::Trigger::Reload),
        Commands::Stop => commands::daemon::forward(&config, adsync_daemon::Trigger::Terminate),
        Commands::Status(args) => args.run(&config),
        Commands::Once(args) => args.run(&config),
        Commands::Plan(args) => args.run(&config),
        Commands::Accounts(args) => args.run(&config),
        Commands::Logs(args) => args.run(&config),
        Commands::CheckConfig => commands::check_config::run(&config),
        Commands::Service { command } => commands::service::run(command, &config),
    }
}
