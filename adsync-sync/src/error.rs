//! Error types for adsync-sync.

use thiserror::Error;

use adsync_accounts::AccountError;
use adsync_directory::DirectoryError;

/// All errors that can abort a reconciliation cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Membership could not be fetched; nothing local was touched.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Re-reading or preparing local state failed.
    #[error("local account error: {0}")]
    Accounts(#[from] AccountError),

    #[error("provisioning '{user}' failed at {step}: {source}")]
    Provision {
        user: String,
        step: &'static str,
        #[source]
        source: AccountError,
    },

    #[error("removing '{user}' failed: {source}")]
    Remove {
        user: String,
        #[source]
        source: AccountError,
    },
}

impl SyncError {
    /// The entity the failing operation was working on, if any.
    pub fn user(&self) -> Option<&str> {
        match self {
            SyncError::Provision { user, .. } | SyncError::Remove { user, .. } => Some(user),
            _ => None,
        }
    }

    /// Short operation name for structured logs.
    pub fn operation(&self) -> &'static str {
        match self {
            SyncError::Directory(_) => "fetch_membership",
            SyncError::Accounts(_) => "sync_local",
            SyncError::Provision { step, .. } => step,
            SyncError::Remove { .. } => "remove_account",
        }
    }
}
