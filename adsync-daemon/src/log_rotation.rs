//! Size-based log rotation for the daemon log file.
//!
//! Keeps at most `max_files` rotated copies using the scheme:
//!   adsyncd.log → adsyncd.log.1 → adsyncd.log.2 → … → adsyncd.log.<max_files>

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Rotate `log_path` if its size reached `max_bytes`.
///
/// Rotation sequence (oldest first):
///   `<name>.<max_files>` deleted
///   `<name>.<n>` → `<name>.<n+1>` for n = max_files-1 … 1
///   `<name>` → `<name>.1`
///   Create fresh empty `<name>`.
///
/// Returns `true` if rotation occurred. A missing log file is not an error.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };

    if size < max_bytes {
        return Ok(false);
    }

    if max_files == 0 {
        fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(log_path)?;
        return Ok(true);
    }

    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    for n in (1..max_files).rev() {
        let src = numbered_path(log_path, n);
        if src.exists() {
            fs::rename(&src, numbered_path(log_path, n + 1))?;
        }
    }

    fs::rename(log_path, numbered_path(log_path, 1))?;

    fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(log_path)?;

    Ok(true)
}

/// Rotate `log_path`, logging the outcome instead of returning it.
pub fn rotate_log(log_path: &Path, max_bytes: u64, max_files: usize) {
    match rotate_if_needed(log_path, max_bytes, max_files) {
        Ok(true) => tracing::info!(path = %log_path.display(), "log file rotated"),
        Ok(false) => {}
        Err(err) => {
            tracing::warn!(path = %log_path.display(), error = %err, "log rotation failed")
        }
    }
}

/// Path of the `n`-th rotated copy of `base` (e.g. `adsyncd.log.2`).
pub fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("adsyncd.log");
    base.with_file_name(format!("{name}.{n}"))
}
