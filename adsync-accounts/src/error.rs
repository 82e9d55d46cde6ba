//! Error types for adsync-accounts.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Which record set a precondition failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Account,
    Group,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Account => write!(f, "account"),
            RecordKind::Group => write!(f, "group"),
        }
    }
}

/// All errors that can arise from local account administration.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: RecordKind, name: String },

    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: RecordKind, name: String },

    /// A record line with the wrong shape; syncing stops rather than skipping it.
    #[error("malformed record at {path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// An account-administration command exited unsuccessfully.
    #[error("command `{command}` failed (status {status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl AccountError {
    pub(crate) fn not_found(kind: RecordKind, name: &str) -> Self {
        AccountError::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    pub(crate) fn already_exists(kind: RecordKind, name: &str) -> Self {
        AccountError::AlreadyExists {
            kind,
            name: name.to_string(),
        }
    }
}

/// Convenience constructor for [`AccountError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> AccountError {
    AccountError::Io {
        path: path.into(),
        source,
    }
}
