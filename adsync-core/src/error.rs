//! Error types for adsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The account-creation options never place new accounts in the sync group.
    #[error(
        "user_options must contain '-g {group}' or a '-G' list including '{group}' so created accounts join the sync group"
    )]
    MissingGroupAssignment { group: String },

    /// Any other semantic validation failure.
    #[error("invalid config: {0}")]
    Invalid(String),
}
