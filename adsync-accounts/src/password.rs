//! Password hashing for the secrets file.
//!
//! bcrypt in the `$2b$` modular crypt format with a fresh random salt per
//! call, which `crypt(3)` and `pam_unix` verify. The encoding never contains
//! the `:` delimiter.

use bcrypt::{Version, DEFAULT_COST};

use crate::error::AccountError;

/// Prefix of every hash this module writes.
pub const HASH_PREFIX: &str = "$2b$";

/// Hash `plaintext` with a newly generated salt.
pub fn hash_password(plaintext: &str) -> Result<String, AccountError> {
    bcrypt::hash_with_result(plaintext, DEFAULT_COST)
        .map(|parts| parts.format_for_version(Version::TwoB))
        .map_err(|e| AccountError::Hash(e.to_string()))
}

/// Check `plaintext` against a stored crypt string.
pub fn verify_password(plaintext: &str, stored: &str) -> bool {
    bcrypt::verify(plaintext, stored).unwrap_or(false)
}
