//! `adsyncd accounts`: local accounts currently in the sync group.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use adsync_accounts::{AccountBackend, LinuxAccountStore};

use super::load_config;

#[derive(Args, Debug)]
pub struct AccountsArgs {
    /// Print machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct SyncedAccount {
    username: String,
    uid: String,
    comment: String,
    home_dir: String,
    has_password: bool,
    password_set: bool,
}

#[derive(Tabled)]
struct AccountRow {
    #[tabled(rename = "Account")]
    username: String,
    #[tabled(rename = "UID")]
    uid: String,
    #[tabled(rename = "Name")]
    comment: String,
    #[tabled(rename = "Home")]
    home_dir: String,
    #[tabled(rename = "Password")]
    password: String,
}

#[derive(Debug, Serialize)]
struct AccountsJson {
    sync_group: String,
    accounts: Vec<SyncedAccount>,
}

impl AccountsArgs {
    pub fn run(self, config: &Path) -> Result<()> {
        let config = load_config(config)?;
        let sync_group = config.local.sync_group.clone();

        let mut store = LinuxAccountStore::new(config);
        store.sync_accounts().context("failed to read accounts")?;
        store.sync_groups().context("failed to read groups")?;

        let accounts: Vec<SyncedAccount> = store
            .usernames_in_group(&sync_group)
            .into_iter()
            .filter_map(|name| store.get_account(&name).ok())
            .map(|account| SyncedAccount {
                username: account.username.clone(),
                uid: account.uid.clone(),
                comment: account.comment.clone(),
                home_dir: account.home_dir.clone(),
                has_password: account.has_password,
                password_set: account.password_set,
            })
            .collect();

        if self.json {
            let payload = AccountsJson {
                sync_group,
                accounts,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to render accounts JSON")?
            );
            return Ok(());
        }

        print_table(&sync_group, accounts);
        Ok(())
    }
}

fn print_table(sync_group: &str, accounts: Vec<SyncedAccount>) {
    println!("{} accounts in group {}", accounts.len(), sync_group.bold());
    if accounts.is_empty() {
        return;
    }

    let rows: Vec<AccountRow> = accounts
        .into_iter()
        .map(|account| AccountRow {
            password: if account.has_password && account.password_set {
                "set".green().to_string()
            } else {
                "missing".red().to_string()
            },
            username: account.username,
            uid: account.uid,
            comment: account.comment,
            home_dir: account.home_dir,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
