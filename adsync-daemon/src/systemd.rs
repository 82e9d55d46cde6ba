use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{io_err, DaemonError};
use crate::paths::{unit_path, SERVICE_NAME};

/// Generate the systemd unit running the daemon in the foreground.
pub fn generate_unit(binary_path: &Path, config_path: &Path) -> String {
    format!(
        r#"[Unit]
Description=Directory group to local account synchronisation
Wants=network-online.target
After=network-online.target

[Service]
Type=simple
ExecStart={binary} -c {config} start
ExecReload=/bin/kill -USR2 $MAINPID
Restart=on-failure
RestartSec=10

[Install]
WantedBy=multi-user.target
"#,
        binary = binary_path.display(),
        config = config_path.display(),
    )
}

/// Write the unit into `unit_dir`, then enable and start it.
pub fn install(
    unit_dir: &Path,
    binary_path: &Path,
    config_path: &Path,
) -> Result<PathBuf, DaemonError> {
    ensure_linux()?;

    if !unit_dir.exists() {
        fs::create_dir_all(unit_dir).map_err(|e| io_err(unit_dir, e))?;
    }

    let unit = unit_path(unit_dir);
    fs::write(&unit, generate_unit(binary_path, config_path)).map_err(|e| io_err(&unit, e))?;

    run_systemctl(&["daemon-reload"], false)?;
    run_systemctl(&["enable", "--now", SERVICE_NAME], false)?;

    Ok(unit)
}

/// Stop and disable the service and remove its unit. Returns whether a unit
/// file was present.
pub fn uninstall(unit_dir: &Path) -> Result<bool, DaemonError> {
    ensure_linux()?;

    let unit = unit_path(unit_dir);
    if !unit.exists() {
        return Ok(false);
    }

    run_systemctl(&["disable", "--now", SERVICE_NAME], true)?;
    fs::remove_file(&unit).map_err(|e| io_err(&unit, e))?;
    run_systemctl(&["daemon-reload"], true)?;
    Ok(true)
}

#[cfg(target_os = "linux")]
fn ensure_linux() -> Result<(), DaemonError> {
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn ensure_linux() -> Result<(), DaemonError> {
    Err(DaemonError::Service(
        "systemd management is only supported on Linux".to_string(),
    ))
}

fn run_systemctl(args: &[&str], ignore_failure: bool) -> Result<(), DaemonError> {
    let output = Command::new("systemctl")
        .args(args)
        .output()
        .map_err(|e| io_err("systemctl", e))?;

    if output.status.success() || ignore_failure {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Err(DaemonError::Service(format!(
        "systemctl {} failed (status {}): {} {}",
        args.join(" "),
        output.status,
        stdout,
        stderr
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directives(unit: &str) -> Vec<(String, String)> {
        unit.lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn unit_runs_binary_in_foreground_with_config() {
        let unit = generate_unit(
            Path::new("/usr/local/bin/adsyncd"),
            Path::new("/etc/adsyncd/config.yaml"),
        );
        let pairs = directives(&unit);

        assert_eq!(
            value(&pairs, "ExecStart"),
            Some("/usr/local/bin/adsyncd -c /etc/adsyncd/config.yaml start")
        );
        assert_eq!(value(&pairs, "Type"), Some("simple"));
        assert_eq!(value(&pairs, "ExecReload"), Some("/bin/kill -USR2 $MAINPID"));
        assert_eq!(value(&pairs, "WantedBy"), Some("multi-user.target"));
        assert!(unit.starts_with("[Unit]\n"));
        assert!(unit.contains("\n[Service]\n") && unit.contains("\n[Install]\n"));
    }

    #[test]
    fn uninstall_without_unit_is_a_noop() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        if cfg!(target_os = "linux") {
            assert!(!uninstall(dir.path()).expect("uninstall"));
        }
    }
}
