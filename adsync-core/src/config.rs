//! Typed configuration snapshot.
//!
//! # File layout
//!
//! ```yaml
//! directory:
//!   client_id: "..."
//!   client_secret: "..."
//!   group_id: "..."
//!   auth_url: "https://login.microsoftonline.com/<tenant>/oauth2/v2.0/token"
//!   ignore_list: ["breakglass@example.com"]
//! local:
//!   sync_group: adsync
//!   default_password: "change-me"
//!   user_options: { "-m": "", "-g": adsync, "-c": "$DISPLAY_NAME" }
//!   post_create_command: ["/usr/local/sbin/adsync-welcome", "$USERNAME"]
//! daemon:
//!   sync_interval_secs: 300
//! ```
//!
//! A loaded config is immutable; the daemon replaces the whole snapshot on
//! reload instead of patching fields.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/adsyncd/config.yaml";

/// Token in `user_options` values replaced by the directory display name.
pub const DISPLAY_NAME_PLACEHOLDER: &str = "$DISPLAY_NAME";

/// Token in `post_create_command` arguments replaced by the new username.
pub const USERNAME_PLACEHOLDER: &str = "$USERNAME";

const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";
const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com/v1.0";

// ---------------------------------------------------------------------------
// 1. Sections
// ---------------------------------------------------------------------------

/// Root of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub directory: DirectoryConfig,
    pub local: LocalConfig,
    #[serde(default)]
    pub daemon: DaemonSettings,
    /// Echo account-administration commands instead of executing them and
    /// leave the identity files untouched.
    #[serde(default, alias = "debug")]
    pub dry_run: bool,
}

/// Remote directory endpoint and credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub client_id: String,
    pub client_secret: String,
    pub group_id: String,
    pub auth_url: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_graph_url")]
    pub graph_url: String,
    /// Principal names that are never provisioned nor removed.
    #[serde(default)]
    pub ignore_list: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Local OS account administration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default)]
    pub files: SystemFiles,
    /// `useradd` option → value. Empty value means a bare flag.
    #[serde(default)]
    pub user_options: BTreeMap<String, String>,
    /// `groupadd` option → value.
    #[serde(default)]
    pub group_options: BTreeMap<String, String>,
    #[serde(default = "default_sync_group")]
    pub sync_group: String,
    pub default_password: String,
    #[serde(default)]
    pub removal_policy: RemovalPolicy,
    /// Program and arguments run after each created account. `$USERNAME` and
    /// `$DISPLAY_NAME` are substituted. A failing hook is logged only.
    #[serde(default)]
    pub post_create_command: Option<Vec<String>>,
}

/// Paths of the three identity files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemFiles {
    #[serde(default = "default_passwd")]
    pub passwd: PathBuf,
    #[serde(default = "default_shadow")]
    pub shadow: PathBuf,
    #[serde(default = "default_group")]
    pub group: PathBuf,
}

impl Default for SystemFiles {
    fn default() -> Self {
        Self {
            passwd: default_passwd(),
            shadow: default_shadow(),
            group: default_group(),
        }
    }
}

/// When locally synced accounts missing from the directory are removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Remove every synced account absent from the current successful fetch.
    #[default]
    Difference,
    /// Remove only when the directory has fewer members than the sync group.
    ShrinkOnly,
}

/// Process-level settings for the background service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    pub sync_interval_secs: u64,
    /// Run one cycle right after startup instead of waiting a full interval.
    pub sync_on_start: bool,
    pub pid_file: PathBuf,
    /// Log destination; stderr when absent.
    pub log_file: Option<PathBuf>,
    pub log_json: bool,
    pub log_max_bytes: u64,
    pub log_max_files: usize,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            sync_interval_secs: 300,
            sync_on_start: true,
            pid_file: PathBuf::from("/var/run/adsyncd.pid"),
            log_file: None,
            log_json: false,
            log_max_bytes: 10 * 1024 * 1024,
            log_max_files: 5,
        }
    }
}

fn default_scope() -> String {
    DEFAULT_SCOPE.to_string()
}

fn default_graph_url() -> String {
    DEFAULT_GRAPH_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_sync_group() -> String {
    "adsync".to_string()
}

fn default_passwd() -> PathBuf {
    PathBuf::from("/etc/passwd")
}

fn default_shadow() -> PathBuf {
    PathBuf::from("/etc/shadow")
}

fn default_group() -> PathBuf {
    PathBuf::from("/etc/group")
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

impl SyncConfig {
    /// Parse the config at `path` and validate it.
    ///
    /// Returns `ConfigError::Io` if unreadable, `ConfigError::Parse` (with path
    /// and line context) if malformed, and a validation error otherwise.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_at(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse the config at `path` without validating it.
    ///
    /// Used by the signal-forwarding commands, which only need the lock path.
    pub fn read_at(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents, path)
    }

    /// Parse YAML (or JSON) text; `origin` is only used in error messages.
    pub fn from_yaml_str(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    // -----------------------------------------------------------------------
    // 3. Validate
    // -----------------------------------------------------------------------

    /// Reject configurations the daemon must never run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dir = &self.directory;
        for (field, value) in [
            ("directory.client_id", &dir.client_id),
            ("directory.client_secret", &dir.client_secret),
            ("directory.group_id", &dir.group_id),
            ("directory.auth_url", &dir.auth_url),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field} may not be empty")));
            }
        }

        let local = &self.local;
        if local.sync_group.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "local.sync_group may not be empty".to_string(),
            ));
        }
        if local.default_password.is_empty() {
            return Err(ConfigError::Invalid(
                "local.default_password may not be empty".to_string(),
            ));
        }
        if !assigns_sync_group(&local.user_options, &local.sync_group) {
            return Err(ConfigError::MissingGroupAssignment {
                group: local.sync_group.clone(),
            });
        }

        if let Some(hook) = &local.post_create_command {
            if hook.first().map_or(true, |program| program.trim().is_empty()) {
                return Err(ConfigError::Invalid(
                    "local.post_create_command needs a program".to_string(),
                ));
            }
        }

        if self.daemon.sync_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "daemon.sync_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// True when the creation options put new accounts into `group`, either as
/// primary group (`-g`) or as one of the supplementary groups (`-G`).
pub fn assigns_sync_group(options: &BTreeMap<String, String>, group: &str) -> bool {
    let primary = options
        .get("-g")
        .or_else(|| options.get("--gid"))
        .is_some_and(|value| value == group);
    let supplementary = options
        .get("-G")
        .or_else(|| options.get("--groups"))
        .is_some_and(|value| value.split(',').any(|name| name.trim() == group));
    primary || supplementary
}
