//! `adsyncd start|sync|reload|stop|status|logs`: daemon lifecycle and control.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use adsync_core::{DaemonSettings, SyncConfig};
use adsync_daemon::{send_trigger, start_blocking, DaemonError, Trigger};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,
}

pub fn start(config: &Path) -> Result<()> {
    start_blocking(config).context("daemon exited with error")
}

/// Deliver `trigger` to the running daemon.
pub fn forward(config: &Path, trigger: Trigger) -> Result<()> {
    let pid_file = daemon_settings(config).pid_file;
    match send_trigger(&pid_file, trigger) {
        Ok(pid) => println!("{} requested (pid {pid})", trigger.as_str()),
        Err(DaemonError::NotRunning { .. }) => println!("adsyncd is not running"),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to send {}", trigger.as_str()))
        }
    }
    Ok(())
}

impl StatusArgs {
    pub fn run(self, config: &Path) -> Result<()> {
        let pid_file = daemon_settings(config).pid_file;
        let status = adsync_daemon::status(&pid_file).context("failed to read daemon status")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&status)
                    .context("failed to render daemon status JSON")?
            );
            return Ok(());
        }

        match status.pid {
            Some(pid) if status.running => {
                println!("adsyncd is {} (pid {pid})", "running".green().bold())
            }
            _ => println!("adsyncd is {}", "not running".red().bold()),
        }
        if status.stale_lock {
            println!(
                "{} stale lock file at {}",
                "warning:".yellow(),
                status.pid_file.display()
            );
        }
        Ok(())
    }
}

impl LogsArgs {
    pub fn run(self, config: &Path) -> Result<()> {
        match daemon_settings(config).log_file {
            Some(path) => print_tail(&path, self.lines),
            None => {
                println!("daemon logs to stderr; set daemon.log_file to keep a log file");
                Ok(())
            }
        }
    }
}

/// Daemon settings from the config, tolerating an invalid or missing file so
/// that the control commands keep working against the default lock path.
fn daemon_settings(config: &Path) -> DaemonSettings {
    match SyncConfig::read_at(config) {
        Ok(config) => config.daemon,
        Err(_) => DaemonSettings::default(),
    }
}

fn print_tail(path: &Path, lines: usize) -> Result<()> {
    if !path.exists() {
        println!("log file not found: {}", path.display());
        return Ok(());
    }

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut tail = VecDeque::<String>::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if lines == 0 {
            continue;
        }
        if tail.len() == lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    println!("==> {} <==", path.display());
    for line in tail {
        println!("{line}");
    }
    Ok(())
}
