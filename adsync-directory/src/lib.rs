//! # adsync-directory
//!
//! Client for the remote directory: an OAuth2 client-credentials token and
//! the member list of one group.
//!
//! HTTP goes through [`HttpTransport`] so the retry and paging logic can be
//! exercised without a network.

pub mod client;
pub mod error;
pub mod transport;

pub use client::{DirectoryClient, MembershipSource};
pub use error::DirectoryError;
pub use transport::{HttpResponse, HttpTransport, UreqTransport};
