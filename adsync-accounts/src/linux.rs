//! [`AccountBackend`] over the flat identity files.
//!
//! Reads come straight from `passwd` / `group`, with the password state taken
//! from `shadow`. Structural changes go through `useradd`, `userdel`,
//! `groupadd` and `groupdel`; passwords are written to the secrets file
//! directly.

use std::sync::Arc;

use indexmap::IndexMap;

use adsync_core::{LocalAccount, LocalGroup, NewAccount, SyncConfig, SHADOW_MARKER};

use crate::backend::AccountBackend;
use crate::command::{
    groupadd_args, post_create_args, useradd_args, CommandRunner, EchoCommandRunner,
    SystemCommandRunner,
};
use crate::error::{AccountError, RecordKind};
use crate::password::hash_password;
use crate::records::{self, FieldEdit};

/// Trailing fields of a freshly appended secrets line: min age, max age, warn.
const SECRET_AGING: &str = "0:99999:7:::";

pub struct LinuxAccountStore {
    config: Arc<SyncConfig>,
    /// Explicit runner; `None` picks one from `config.dry_run` on every call.
    runner: Option<Box<dyn CommandRunner>>,
    accounts: IndexMap<String, LocalAccount>,
    groups: IndexMap<String, LocalGroup>,
}

impl LinuxAccountStore {
    /// Store with the runner chosen by the config's dry-run flag.
    pub fn new(config: Arc<SyncConfig>) -> Self {
        Self {
            config,
            runner: None,
            accounts: IndexMap::new(),
            groups: IndexMap::new(),
        }
    }

    /// Store with an explicit runner. Files are always written.
    pub fn with_runner(config: Arc<SyncConfig>, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            config,
            runner: Some(runner),
            accounts: IndexMap::new(),
            groups: IndexMap::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn accounts(&self) -> impl Iterator<Item = &LocalAccount> {
        self.accounts.values()
    }

    pub fn groups(&self) -> impl Iterator<Item = &LocalGroup> {
        self.groups.values()
    }

    pub fn get_group(&self, name: &str) -> Option<&LocalGroup> {
        self.groups.get(name)
    }

    fn dry_run(&self) -> bool {
        self.runner.is_none() && self.config.dry_run
    }

    fn runner(&self) -> &dyn CommandRunner {
        match &self.runner {
            Some(runner) => runner.as_ref(),
            None if self.config.dry_run => &EchoCommandRunner,
            None => &SystemCommandRunner,
        }
    }

    fn run(&self, program: &str, args: Vec<String>) -> Result<(), AccountError> {
        self.runner().run(program, &args)
    }

    /// Run the configured post-creation command. Failures are logged only.
    fn run_post_create_hook(&self, account: &NewAccount) {
        let Some((program, args)) = self
            .config
            .local
            .post_create_command
            .as_deref()
            .and_then(<[String]>::split_first)
        else {
            return;
        };

        let args = post_create_args(args, account);
        match self.runner().run(program, &args) {
            Ok(()) => tracing::debug!(user = %account.username, "post-create hook ran"),
            Err(err) => tracing::error!(
                user = %account.username,
                error = %err,
                "post-create hook failed"
            ),
        }
    }

    /// Fill in `password_set` from the secrets file. An unreadable file
    /// leaves every account marked as set, so nothing is repaired blindly.
    fn apply_secrets(&mut self) -> Result<(), AccountError> {
        let path = &self.config.local.files.shadow;
        let secrets = match records::read_file(path) {
            Ok(contents) => Some(records::parse_secrets(path, &contents)?),
            Err(err) => {
                tracing::warn!(error = %err, "secrets file unreadable; password state unknown");
                None
            }
        };

        for account in self.accounts.values_mut() {
            account.password_set = match &secrets {
                Some(secrets) => secrets
                    .get(&account.username)
                    .is_some_and(|hash| records::is_usable_hash(hash)),
                None => true,
            };
        }
        Ok(())
    }

    fn write_account_marker(&self, name: &str) -> Result<(), AccountError> {
        let path = &self.config.local.files.passwd;
        records::rewrite_in_place(path, |contents| {
            match records::edit_field(contents, name, 1, |current| {
                (current != SHADOW_MARKER).then(|| SHADOW_MARKER.to_string())
            }) {
                FieldEdit::Changed(updated) => Ok(Some(updated)),
                FieldEdit::Unchanged => Ok(None),
                FieldEdit::Missing => Err(AccountError::not_found(RecordKind::Account, name)),
            }
        })?;
        Ok(())
    }

    fn write_secret(&self, name: &str, hash: &str) -> Result<(), AccountError> {
        let path = &self.config.local.files.shadow;
        records::rewrite_in_place(path, |contents| {
            match records::edit_field(contents, name, 1, |_| Some(hash.to_string())) {
                FieldEdit::Changed(updated) => Ok(Some(updated)),
                FieldEdit::Unchanged => Ok(None),
                FieldEdit::Missing => {
                    let line = format!("{name}:{hash}:{}:{SECRET_AGING}", days_since_epoch());
                    Ok(Some(records::append_record(contents, &line)))
                }
            }
        })?;
        Ok(())
    }
}

impl AccountBackend for LinuxAccountStore {
    fn sync_accounts(&mut self) -> Result<(), AccountError> {
        let path = &self.config.local.files.passwd;
        let contents = records::read_file(path)?;
        self.accounts = records::parse_accounts(path, &contents)?;
        self.apply_secrets()?;
        tracing::debug!(count = self.accounts.len(), "accounts synced");
        Ok(())
    }

    fn sync_groups(&mut self) -> Result<(), AccountError> {
        let path = &self.config.local.files.group;
        let contents = records::read_file(path)?;
        self.groups = records::parse_groups(path, &contents)?;
        tracing::debug!(count = self.groups.len(), "groups synced");
        Ok(())
    }

    fn account_exists(&self, name: &str) -> bool {
        self.accounts.contains_key(name)
    }

    fn group_exists(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    fn get_account(&self, name: &str) -> Result<&LocalAccount, AccountError> {
        self.accounts
            .get(name)
            .ok_or_else(|| AccountError::not_found(RecordKind::Account, name))
    }

    fn usernames(&self) -> Vec<String> {
        self.accounts.keys().cloned().collect()
    }

    fn usernames_in_group(&self, group: &str) -> Vec<String> {
        let Some(group) = self.groups.get(group) else {
            return Vec::new();
        };
        let mut names = group.members.clone();
        for account in self.accounts.values() {
            if account.gid == group.gid && !names.contains(&account.username) {
                names.push(account.username.clone());
            }
        }
        names
    }

    fn add_account(&mut self, account: &NewAccount) -> Result<(), AccountError> {
        if self.account_exists(&account.username) {
            return Err(AccountError::already_exists(
                RecordKind::Account,
                &account.username,
            ));
        }

        // useradd refuses to create a user whose personal group already exists.
        if self.group_exists(&account.username) {
            tracing::info!(group = %account.username, "removing clashing group before useradd");
            self.run("groupdel", vec![account.username.clone()])?;
        }

        let args = useradd_args(&self.config.local.user_options, account);
        self.run("useradd", args)?;
        tracing::info!(user = %account.username, "account created");

        self.sync_accounts()?;
        self.sync_groups()?;

        self.run_post_create_hook(account);
        Ok(())
    }

    fn remove_account(&mut self, name: &str) -> Result<(), AccountError> {
        if !self.account_exists(name) {
            return Err(AccountError::not_found(RecordKind::Account, name));
        }

        self.run("userdel", vec!["-r".to_string(), name.to_string()])?;
        self.sync_groups()?;
        if self.group_exists(name) {
            self.run("groupdel", vec![name.to_string()])?;
        }
        tracing::info!(user = %name, "account removed");

        self.sync_accounts()?;
        self.sync_groups()
    }

    fn set_password(&mut self, name: &str, plaintext: &str) -> Result<(), AccountError> {
        let has_password = self.get_account(name)?.has_password;

        if self.dry_run() {
            tracing::info!(user = %name, "[dry-run] would set password");
            return Ok(());
        }

        let hash = hash_password(plaintext)?;

        if !has_password {
            self.write_account_marker(name)?;
        }
        self.write_secret(name, &hash)?;
        tracing::info!(user = %name, "password set");

        self.sync_accounts()
    }

    fn add_group(&mut self, name: &str) -> Result<(), AccountError> {
        if self.group_exists(name) {
            return Err(AccountError::already_exists(RecordKind::Group, name));
        }

        let args = groupadd_args(&self.config.local.group_options, name);
        self.run("groupadd", args)?;
        tracing::info!(group = %name, "group created");

        self.sync_groups()
    }

    fn set_config(&mut self, config: Arc<SyncConfig>) {
        self.config = config;
    }
}

fn days_since_epoch() -> i64 {
    chrono::Utc::now().timestamp() / 86_400
}
