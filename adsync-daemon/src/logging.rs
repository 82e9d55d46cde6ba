//! Subscriber setup. `RUST_LOG` overrides the default `info` filter.

use std::fs::OpenOptions;
use std::io::{self, Write};

use tracing_subscriber::{fmt, EnvFilter};

use adsync_core::DaemonSettings;

/// Install the daemon subscriber: the configured log file (text or JSON)
/// or stderr.
pub fn init_tracing(settings: &DaemonSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(path) = settings.log_file.clone() else {
        if settings.log_json {
            let _ = fmt().json().with_env_filter(filter).try_init();
        } else {
            let _ = fmt().with_env_filter(filter).with_target(false).try_init();
        }
        return;
    };

    // Opened per event so a rotated file is picked up without a restart.
    let make_writer = move || -> Box<dyn Write + Send> {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Box::new(file),
            Err(_) => Box::new(io::stderr()),
        }
    };

    if settings.log_json {
        let _ = fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(make_writer)
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(make_writer)
            .try_init();
    }
}

/// Subscriber for one-shot CLI commands: stderr, `warn` unless overridden.
pub fn init_stderr_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}
