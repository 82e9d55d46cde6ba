//! Identity records shared by the directory client, the account store and the
//! reconciliation engine.
//!
//! Local records keep every field as the text found on disk so that a rewrite
//! of an untouched line is byte-for-byte identical.

use serde::{Deserialize, Serialize};

/// Password placeholder meaning "the hash lives in the secrets file".
pub const SHADOW_MARKER: &str = "x";

// ---------------------------------------------------------------------------
// Directory side
// ---------------------------------------------------------------------------

/// A member of the directory group, rebuilt on every membership fetch.
///
/// `principal_name` is the join key against local usernames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub display_name: String,
    pub principal_name: String,
}

impl DirectoryUser {
    pub fn new(display_name: impl Into<String>, principal_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            principal_name: principal_name.into(),
        }
    }
}

/// Parameters for provisioning one local account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    /// Substituted for the display-name placeholder in the creation options.
    pub display_name: String,
}

impl From<&DirectoryUser> for NewAccount {
    fn from(user: &DirectoryUser) -> Self {
        Self {
            username: user.principal_name.clone(),
            display_name: user.display_name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Local side
// ---------------------------------------------------------------------------

/// One line of the account file: `name:placeholder:uid:gid:comment:home:shell`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAccount {
    pub username: String,
    /// True when the password placeholder is [`SHADOW_MARKER`].
    pub has_password: bool,
    /// True when the secrets file holds a usable hash for the account.
    /// `useradd` leaves a locked placeholder (`!`) there until a password is
    /// set.
    #[serde(default)]
    pub password_set: bool,
    pub uid: String,
    pub gid: String,
    pub comment: String,
    pub home_dir: String,
    pub shell: String,
}

impl LocalAccount {
    /// The account exists but cannot log in with a password yet.
    pub fn needs_password(&self) -> bool {
        !self.has_password || !self.password_set
    }
}

/// One line of the group file: `name:placeholder:gid:member,member`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalGroup {
    pub name: String,
    pub gid: String,
    /// Explicit members in file order.
    pub members: Vec<String>,
}

impl LocalGroup {
    pub fn has_member(&self, username: &str) -> bool {
        self.members.iter().any(|m| m == username)
    }
}
