//! Single-instance lock file holding the daemon's pid.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{io_err, DaemonError};

/// Held for the daemon's lifetime; the file is removed on release or drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    pid: i32,
    released: bool,
}

impl InstanceLock {
    /// Claim `path` for this process.
    ///
    /// A file naming a live process other than this one is
    /// `AlreadyRunning`. A file naming a dead process, or one that does not
    /// parse, is stale and replaced.
    pub fn acquire(path: &Path) -> Result<Self, DaemonError> {
        let own = std::process::id() as i32;

        match read_pid(path)? {
            Some(pid) if pid != own && process_alive(pid) => {
                return Err(DaemonError::AlreadyRunning {
                    pid,
                    path: path.to_path_buf(),
                });
            }
            Some(pid) => {
                tracing::warn!(path = %path.display(), pid, "removing stale lock file");
                remove_if_present(path)?;
            }
            None if path.exists() => {
                tracing::warn!(path = %path.display(), "removing unreadable lock file");
                remove_if_present(path)?;
            }
            None => {}
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| io_err(path, e))?;
        writeln!(file, "{own}").map_err(|e| io_err(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            pid: own,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Remove the lock file now and report failures.
    pub fn release(mut self) -> Result<(), DaemonError> {
        self.released = true;
        remove_if_present(&self.path)
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Pid recorded in `path`; `None` when the file is missing or unparsable.
pub fn read_pid(path: &Path) -> Result<Option<i32>, DaemonError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents.trim().parse::<i32>().ok().filter(|pid| *pid > 0)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Pid of the live process holding `path`, if any.
pub fn running_pid(path: &Path) -> Result<Option<i32>, DaemonError> {
    Ok(read_pid(path)?.filter(|pid| process_alive(*pid)))
}

/// Signal 0 checks for existence; EPERM still means the process exists.
pub fn process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    // SAFETY: kill with signal 0 performs no action beyond the permission
    // and existence checks.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

fn remove_if_present(path: &Path) -> Result<(), DaemonError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(path, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    #[test]
    fn acquire_writes_pid_and_drop_removes_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("run").join("adsyncd.pid");

        {
            let lock = InstanceLock::acquire(&path).expect("acquire");
            assert_eq!(read_pid(&path).expect("read"), Some(lock.pid()));
        }
        assert!(!path.exists(), "lock file removed on drop");
    }

    #[test]
    fn live_holder_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("adsyncd.pid");
        let mut child = Command::new("sleep").arg("30").spawn().expect("spawn sleep");
        fs::write(&path, format!("{}\n", child.id())).expect("write pid");

        let err = InstanceLock::acquire(&path).unwrap_err();
        assert!(
            matches!(err, DaemonError::AlreadyRunning { pid, .. } if pid == child.id() as i32),
            "got: {err}"
        );
        assert!(path.exists(), "a live lock is left alone");

        child.kill().expect("kill");
        child.wait().expect("wait");
    }

    #[test]
    fn stale_pid_is_replaced() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("adsyncd.pid");
        let mut child = Command::new("true").spawn().expect("spawn true");
        let dead = child.id();
        child.wait().expect("wait");
        fs::write(&path, format!("{dead}\n")).expect("write pid");

        let lock = InstanceLock::acquire(&path).expect("stale lock replaced");
        assert_eq!(read_pid(&path).expect("read"), Some(lock.pid()));
        lock.release().expect("release");
        assert!(!path.exists());
    }

    #[test]
    fn garbage_lock_file_is_replaced() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("adsyncd.pid");
        fs::write(&path, "not a pid").expect("write");

        let lock = InstanceLock::acquire(&path).expect("acquire");
        assert_eq!(running_pid(&path).expect("read"), Some(lock.pid()));
    }

    #[test]
    fn running_pid_is_none_without_file() {
        let dir = TempDir::new().expect("tempdir");
        assert_eq!(running_pid(&dir.path().join("missing.pid")).expect("read"), None);
    }
}
