//! `adsyncd once` and `adsyncd plan`: single in-process cycles.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use adsync_daemon::init_stderr_tracing;
use adsync_sync::{pipeline, CycleSummary, SyncPlan};

use super::load_config;

#[derive(Args, Debug)]
pub struct OnceArgs {
    /// Echo account commands instead of running them; identity files are
    /// left untouched.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the cycle summary as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Print machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "Display name")]
    display_name: String,
}

impl OnceArgs {
    pub fn run(self, config: &Path) -> Result<()> {
        init_stderr_tracing(true);
        let mut config = (*load_config(config)?).clone();
        if self.dry_run {
            config.dry_run = true;
        }

        let summary =
            pipeline::run_once(Arc::new(config)).context("synchronisation cycle failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary)
                    .context("failed to render cycle summary JSON")?
            );
        } else {
            print_summary(&summary);
        }
        Ok(())
    }
}

impl PlanArgs {
    pub fn run(self, config: &Path) -> Result<()> {
        init_stderr_tracing(false);
        let plan = pipeline::plan_once(load_config(config)?).context("failed to compute plan")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&plan).context("failed to render plan JSON")?
            );
        } else {
            print_plan(plan);
        }
        Ok(())
    }
}

fn print_summary(summary: &CycleSummary) {
    println!(
        "{} directory members | {} synced before | {} ms",
        summary.directory_members, summary.synced_before, summary.duration_ms
    );
    if summary.is_noop() {
        println!("{}", "nothing to do".green());
        return;
    }
    for name in &summary.created {
        println!("{} {name}", "created ".green());
    }
    for name in &summary.repaired {
        println!("{} {name}", "repaired".yellow());
    }
    for name in &summary.removed {
        println!("{} {name}", "removed ".red());
    }
}

fn print_plan(plan: SyncPlan) {
    println!(
        "{} directory members | {} synced locally",
        plan.directory_members, plan.synced
    );
    if plan.create.is_empty() && plan.remove.is_empty() {
        println!("{}", "in sync".green());
        return;
    }

    let rows: Vec<PlanRow> = plan
        .create
        .into_iter()
        .map(|user| PlanRow {
            action: "create".green().to_string(),
            account: user.principal_name,
            display_name: user.display_name,
        })
        .chain(plan.remove.into_iter().map(|name| PlanRow {
            action: "remove".red().to_string(),
            account: name,
            display_name: String::new(),
        }))
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
