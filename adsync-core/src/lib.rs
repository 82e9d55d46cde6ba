//! adsync core library: configuration snapshot, identity record types, errors.
//!
//! Public API surface:
//! - [`config`]: [`SyncConfig`] and its load / validate pass
//! - [`types`]: directory and local identity records
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    DaemonSettings, DirectoryConfig, LocalConfig, RemovalPolicy, SyncConfig, SystemFiles,
    DEFAULT_CONFIG_PATH, DISPLAY_NAME_PLACEHOLDER, USERNAME_PLACEHOLDER,
};
pub use error::ConfigError;
pub use types::{DirectoryUser, LocalAccount, LocalGroup, NewAccount, SHADOW_MARKER};
