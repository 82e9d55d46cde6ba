use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SERVICE_NAME: &str = "adsyncd.service";
pub const SYSTEMD_UNIT_DIR: &str = "/etc/systemd/system";
pub const DEFAULT_BINARY: &str = "/usr/local/bin/adsyncd";

pub const ROTATION_INTERVAL: Duration = Duration::from_secs(5);

/// Shortest timer period accepted at runtime.
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_secs(1);

pub fn unit_path(unit_dir: &Path) -> PathBuf {
    unit_dir.join(SERVICE_NAME)
}
