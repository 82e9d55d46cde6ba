//! Error types for adsync-directory.

use thiserror::Error;

/// All errors that can arise from talking to the directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The token endpoint refused the credentials or returned no token.
    #[error("authentication failed{}: {message}", status_suffix(.status))]
    Auth {
        status: Option<u16>,
        message: String,
    },

    /// The members endpoint answered with an unexpected status.
    #[error("membership request failed (status {status}): {message}")]
    Membership { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}
