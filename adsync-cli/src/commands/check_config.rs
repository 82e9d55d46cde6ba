//! `adsyncd check-config`

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use super::load_config;

pub fn run(config: &Path) -> Result<()> {
    let loaded = load_config(config)?;
    println!("{} {}", "config ok:".green(), config.display());
    println!("  sync group:      {}", loaded.local.sync_group);
    println!("  directory group: {}", loaded.directory.group_id);
    println!("  interval:        {}s", loaded.daemon.sync_interval_secs);
    println!("  removal policy:  {:?}", loaded.local.removal_policy);
    if loaded.dry_run {
        println!("  {}", "dry run enabled".yellow());
    }
    Ok(())
}
