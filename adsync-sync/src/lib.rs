//! # adsync-sync
//!
//! Reconciliation of directory membership against local accounts.
//!
//! [`Reconciler`] owns a [`MembershipSource`](adsync_directory::MembershipSource)
//! and an [`AccountBackend`](adsync_accounts::AccountBackend) and runs one
//! cycle per [`Reconciler::run`] call. [`pipeline`] wires up the production
//! pair for the CLI and the daemon.

pub mod engine;
pub mod error;
pub mod pipeline;

pub use engine::{removal_candidates, CycleSummary, Reconciler, SyncPlan};
pub use error::SyncError;
pub use pipeline::SystemReconciler;
