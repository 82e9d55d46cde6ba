//! Shared reconciliation entrypoints used by the CLI and the daemon.

use std::sync::Arc;

use adsync_accounts::LinuxAccountStore;
use adsync_core::SyncConfig;
use adsync_directory::DirectoryClient;

use crate::{CycleSummary, Reconciler, SyncError, SyncPlan};

/// The engine over the real directory and the real identity files.
pub type SystemReconciler = Reconciler<DirectoryClient, LinuxAccountStore>;

pub fn build(config: Arc<SyncConfig>) -> SystemReconciler {
    Reconciler::new(
        DirectoryClient::new(Arc::clone(&config)),
        LinuxAccountStore::new(Arc::clone(&config)),
        config,
    )
}

/// Prepare and run a single cycle. This is what `adsyncd once` does.
pub fn run_once(config: Arc<SyncConfig>) -> Result<CycleSummary, SyncError> {
    let mut reconciler = build(config);
    reconciler.prepare()?;
    reconciler.run()
}

/// Compute the plan for the current state without changing anything.
pub fn plan_once(config: Arc<SyncConfig>) -> Result<SyncPlan, SyncError> {
    build(config).plan()
}
