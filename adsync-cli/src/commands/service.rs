//! `adsyncd service install|uninstall`: systemd integration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use adsync_daemon::paths::{DEFAULT_BINARY, SYSTEMD_UNIT_DIR};
use adsync_daemon::{install_service, uninstall_service};

#[derive(Subcommand, Debug)]
pub enum ServiceCommand {
    /// Write the unit file, then enable and start the service.
    Install(InstallArgs),
    /// Stop, disable and remove the service.
    Uninstall(UnitDirArgs),
}

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Binary the unit runs; defaults to this executable.
    #[arg(long)]
    pub binary: Option<PathBuf>,

    #[command(flatten)]
    pub unit: UnitDirArgs,
}

#[derive(Args, Debug)]
pub struct UnitDirArgs {
    /// Directory the unit file is written to.
    #[arg(long, default_value = SYSTEMD_UNIT_DIR)]
    pub unit_dir: PathBuf,
}

pub fn run(command: ServiceCommand, config: &Path) -> Result<()> {
    match command {
        ServiceCommand::Install(args) => {
            let binary = args
                .binary
                .or_else(|| std::env::current_exe().ok())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BINARY));
            let config = absolute(config)?;
            let unit = install_service(&args.unit.unit_dir, &binary, &config)
                .context("failed to install systemd service")?;
            println!("installed systemd service: {}", unit.display());
        }
        ServiceCommand::Uninstall(args) => {
            if uninstall_service(&args.unit_dir).context("failed to uninstall systemd service")? {
                println!("uninstalled systemd service");
            } else {
                println!("systemd service is not installed");
            }
        }
    }
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("could not determine current directory")?;
    Ok(cwd.join(path))
}
