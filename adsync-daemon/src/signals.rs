//! Control of a running daemon from another process.
//!
//! | trigger   | signal           |
//! |-----------|------------------|
//! | sync      | SIGUSR1          |
//! | reload    | SIGUSR2          |
//! | terminate | SIGTERM / SIGINT |

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::DaemonError;
use crate::lock::{read_pid, running_pid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Sync,
    Reload,
    Terminate,
}

impl Trigger {
    /// Signal number sent by the forwarding commands.
    pub fn signal(self) -> libc::c_int {
        match self {
            Trigger::Sync => libc::SIGUSR1,
            Trigger::Reload => libc::SIGUSR2,
            Trigger::Terminate => libc::SIGTERM,
        }
    }

    pub fn signal_name(self) -> &'static str {
        match self {
            Trigger::Sync => "SIGUSR1",
            Trigger::Reload => "SIGUSR2",
            Trigger::Terminate => "SIGTERM",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Sync => "sync",
            Trigger::Reload => "reload",
            Trigger::Terminate => "terminate",
        }
    }
}

/// Send `trigger` to the daemon recorded in `pid_file`. Returns its pid.
pub fn send_trigger(pid_file: &Path, trigger: Trigger) -> Result<i32, DaemonError> {
    let pid = running_pid(pid_file)?.ok_or_else(|| DaemonError::NotRunning {
        path: pid_file.to_path_buf(),
    })?;

    // SAFETY: plain kill(2) on a pid read from the lock file.
    let rc = unsafe { libc::kill(pid, trigger.signal()) };
    if rc != 0 {
        return Err(DaemonError::Signal(format!(
            "sending {} to pid {pid} failed: {}",
            trigger.signal_name(),
            io::Error::last_os_error()
        )));
    }

    tracing::debug!(pid, signal = trigger.signal_name(), "trigger sent");
    Ok(pid)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaemonStatus {
    pub running: bool,
    pub pid: Option<i32>,
    pub pid_file: PathBuf,
    /// A lock file exists but its process is gone.
    pub stale_lock: bool,
}

pub fn status(pid_file: &Path) -> Result<DaemonStatus, DaemonError> {
    let recorded = read_pid(pid_file)?;
    let live = running_pid(pid_file)?;
    Ok(DaemonStatus {
        running: live.is_some(),
        pid: live,
        pid_file: pid_file.to_path_buf(),
        stale_lock: live.is_none() && (recorded.is_some() || pid_file.exists()),
    })
}
