//! The capability set every OS account backend provides.

use std::sync::Arc;

use adsync_core::{LocalAccount, NewAccount, SyncConfig};

use crate::error::AccountError;

/// Local account administration as seen by the reconciliation engine.
///
/// Lookups answer from the in-memory mirror built by the last
/// `sync_accounts` / `sync_groups` call; mutations re-sync what they touch.
pub trait AccountBackend: Send {
    /// Rebuild the account set from its source of truth.
    fn sync_accounts(&mut self) -> Result<(), AccountError>;

    /// Rebuild the group set from its source of truth.
    fn sync_groups(&mut self) -> Result<(), AccountError>;

    fn account_exists(&self, name: &str) -> bool;

    fn group_exists(&self, name: &str) -> bool;

    fn get_account(&self, name: &str) -> Result<&LocalAccount, AccountError>;

    /// All known usernames, in source order.
    fn usernames(&self) -> Vec<String>;

    /// Usernames belonging to `group`; empty when the group is unknown.
    fn usernames_in_group(&self, group: &str) -> Vec<String>;

    fn add_account(&mut self, account: &NewAccount) -> Result<(), AccountError>;

    fn remove_account(&mut self, name: &str) -> Result<(), AccountError>;

    fn set_password(&mut self, name: &str, plaintext: &str) -> Result<(), AccountError>;

    fn add_group(&mut self, name: &str) -> Result<(), AccountError>;

    /// Swap in a new configuration snapshot between cycles.
    fn set_config(&mut self, config: Arc<SyncConfig>);
}
