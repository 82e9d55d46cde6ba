use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon runtime, signal forwarding and service
/// management.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("adsyncd is already running (pid {pid}, lock {path})")]
    AlreadyRunning { pid: i32, path: PathBuf },

    #[error("adsyncd is not running (no live process in {path})")]
    NotRunning { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(#[from] adsync_core::ConfigError),

    #[error("sync error: {0}")]
    Sync(#[from] adsync_sync::SyncError),

    #[error("signal error: {0}")]
    Signal(String),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("service error: {0}")]
    Service(String),

    #[error("task join failure: {0}")]
    Join(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
