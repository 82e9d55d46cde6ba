//! One reconciliation cycle.
//!
//! ```text
//! fetch membership ──► re-sync accounts/groups ──► provision missing
//!                                                   │
//!                      remove stale synced users ◄──┘
//! ```
//!
//! Membership is fetched before any local mutation and provisioning always
//! precedes removal. The first failing operation aborts the cycle; the next
//! cycle starts again from a fresh read of both sides, so a partially applied
//! cycle converges.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use adsync_accounts::AccountBackend;
use adsync_core::{DirectoryUser, LocalAccount, NewAccount, RemovalPolicy, SyncConfig};
use adsync_directory::MembershipSource;

use crate::error::SyncError;

/// Outcome of a successful cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub created: Vec<String>,
    /// Existing accounts whose missing password was set again.
    pub repaired: Vec<String>,
    pub removed: Vec<String>,
    pub directory_members: usize,
    pub synced_before: usize,
    pub duration_ms: u64,
}

impl CycleSummary {
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.repaired.is_empty() && self.removed.is_empty()
    }
}

/// What a cycle would do, computed without touching local state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub create: Vec<DirectoryUser>,
    pub remove: Vec<String>,
    pub directory_members: usize,
    pub synced: usize,
}

pub struct Reconciler<D, B> {
    directory: D,
    accounts: B,
    config: Arc<SyncConfig>,
}

impl<D: MembershipSource, B: AccountBackend> Reconciler<D, B> {
    pub fn new(directory: D, accounts: B, config: Arc<SyncConfig>) -> Self {
        Self {
            directory,
            accounts,
            config,
        }
    }

    pub fn config(&self) -> &Arc<SyncConfig> {
        &self.config
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn accounts(&self) -> &B {
        &self.accounts
    }

    /// Swap the configuration snapshot into the engine and both sides.
    pub fn replace_config(&mut self, config: Arc<SyncConfig>) {
        self.directory.set_config(Arc::clone(&config));
        self.accounts.set_config(Arc::clone(&config));
        self.config = config;
    }

    /// Startup step: make sure the sync group exists.
    pub fn prepare(&mut self) -> Result<(), SyncError> {
        self.accounts.sync_groups()?;
        self.ensure_sync_group()
    }

    /// Run one full cycle.
    pub fn run(&mut self) -> Result<CycleSummary, SyncError> {
        let started = Instant::now();
        let config = Arc::clone(&self.config);
        let local = &config.local;

        let directory = self.directory.fetch_membership()?.to_vec();
        self.accounts.sync_accounts()?;
        self.accounts.sync_groups()?;
        // The group may have been renamed by a reload or deleted since startup.
        self.ensure_sync_group()?;

        let synced_before = self.accounts.usernames_in_group(&local.sync_group).len();
        let mut summary = CycleSummary {
            directory_members: directory.len(),
            synced_before,
            ..CycleSummary::default()
        };

        for user in &directory {
            let account = NewAccount::from(user);
            let needs_password = self
                .accounts
                .get_account(&account.username)
                .ok()
                .map(LocalAccount::needs_password);
            match needs_password {
                Some(false) => continue,
                Some(true) => {
                    self.set_default_password(&account.username)?;
                    summary.repaired.push(account.username);
                }
                None => {
                    self.accounts
                        .add_account(&account)
                        .map_err(|source| SyncError::Provision {
                            user: account.username.clone(),
                            step: "add_account",
                            source,
                        })?;
                    self.set_default_password(&account.username)?;
                    tracing::info!(user = %account.username, "provisioned");
                    summary.created.push(account.username);
                }
            }
        }

        let synced = self.accounts.usernames_in_group(&local.sync_group);
        let stale = removal_candidates(
            &directory,
            &synced,
            local.removal_policy,
            &config.directory.ignore_list,
        );
        for name in stale {
            self.accounts
                .remove_account(&name)
                .map_err(|source| SyncError::Remove {
                    user: name.clone(),
                    source,
                })?;
            tracing::info!(user = %name, "deprovisioned");
            summary.removed.push(name);
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        Ok(summary)
    }

    /// Compute the creates and removals `run` would perform.
    pub fn plan(&mut self) -> Result<SyncPlan, SyncError> {
        let directory = self.directory.fetch_membership()?.to_vec();
        self.accounts.sync_accounts()?;
        self.accounts.sync_groups()?;

        let local = &self.config.local;
        let create: Vec<DirectoryUser> = directory
            .iter()
            .filter(|user| !self.accounts.account_exists(&user.principal_name))
            .cloned()
            .collect();

        // Accounts created this cycle join the sync group through the
        // creation options, so they count as synced for the removal rule.
        let mut synced = self.accounts.usernames_in_group(&local.sync_group);
        let synced_now = synced.len();
        synced.extend(create.iter().map(|user| user.principal_name.clone()));

        let remove = removal_candidates(
            &directory,
            &synced,
            local.removal_policy,
            &self.config.directory.ignore_list,
        );

        Ok(SyncPlan {
            create,
            remove,
            directory_members: directory.len(),
            synced: synced_now,
        })
    }

    fn ensure_sync_group(&mut self) -> Result<(), SyncError> {
        let group = &self.config.local.sync_group;
        if !self.accounts.group_exists(group) {
            tracing::info!(group = %group, "creating sync group");
            self.accounts.add_group(group)?;
        }
        Ok(())
    }

    fn set_default_password(&mut self, username: &str) -> Result<(), SyncError> {
        self.accounts
            .set_password(username, &self.config.local.default_password)
            .map_err(|source| SyncError::Provision {
                user: username.to_string(),
                step: "set_password",
                source,
            })
    }
}

/// Synced usernames that should be removed under `policy`.
///
/// Candidates are synced users absent from `directory` and not on `ignore`.
/// `ShrinkOnly` returns them only while the directory has fewer members than
/// the sync group.
pub fn removal_candidates(
    directory: &[DirectoryUser],
    synced: &[String],
    policy: RemovalPolicy,
    ignore: &[String],
) -> Vec<String> {
    if policy == RemovalPolicy::ShrinkOnly && directory.len() >= synced.len() {
        return Vec::new();
    }

    let present: HashSet<&str> = directory
        .iter()
        .map(|user| user.principal_name.as_str())
        .collect();
    synced
        .iter()
        .filter(|name| !present.contains(name.as_str()) && !ignore.contains(name))
        .cloned()
        .collect()
}
