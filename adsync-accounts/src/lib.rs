//! # adsync-accounts
//!
//! Local account administration backed by the flat identity files.
//!
//! [`AccountBackend`] is the capability set the reconciliation engine depends
//! on; [`LinuxAccountStore`] implements it over `passwd` / `shadow` / `group`
//! files and the `useradd` family of commands.

pub mod backend;
pub mod command;
pub mod error;
pub mod linux;
pub mod password;
pub mod records;

pub use backend::AccountBackend;
pub use command::{CommandRunner, EchoCommandRunner, SystemCommandRunner};
pub use error::{AccountError, RecordKind};
pub use linux::LinuxAccountStore;
