//! Daemon runtime: instance lock, signal triggers, periodic timer and the
//! single reconciliation worker.

mod error;
pub mod lock;
pub mod log_rotation;
pub mod logging;
pub mod paths;
mod runtime;
pub mod signals;
pub mod systemd;

pub use error::DaemonError;
pub use lock::InstanceLock;
pub use logging::{init_stderr_tracing, init_tracing};
pub use runtime::{run, start_blocking, ConfigLoader, Reconcile, TriggerReceivers, Triggers};
pub use signals::{send_trigger, status, DaemonStatus, Trigger};
pub use systemd::{generate_unit, install as install_service, uninstall as uninstall_service};
