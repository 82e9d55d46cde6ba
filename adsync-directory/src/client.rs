//! Token acquisition and group membership fetch.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use adsync_core::{DirectoryUser, SyncConfig};

use crate::error::DirectoryError;
use crate::transport::{HttpResponse, HttpTransport, UreqTransport};

/// Upper bound on `@odata.nextLink` hops in one fetch.
pub const MAX_PAGES: usize = 1000;

const MEMBER_FIELDS: &str = "displayName,userPrincipalName";

/// Where the reconciliation engine gets the authoritative member list.
pub trait MembershipSource: Send {
    /// Refresh and return the current membership. On failure the previous
    /// set is kept.
    fn fetch_membership(&mut self) -> Result<&[DirectoryUser], DirectoryError>;

    /// Result of the last successful fetch.
    fn members(&self) -> &[DirectoryUser];

    /// Swap in a new configuration snapshot; cached credentials are dropped.
    fn set_config(&mut self, config: Arc<SyncConfig>);
}

pub struct DirectoryClient<T: HttpTransport = UreqTransport> {
    config: Arc<SyncConfig>,
    transport: T,
    token: Option<String>,
    members: Vec<DirectoryUser>,
}

impl DirectoryClient<UreqTransport> {
    pub fn new(config: Arc<SyncConfig>) -> Self {
        let timeout = Duration::from_secs(config.directory.timeout_secs);
        Self::with_transport(config, UreqTransport::new(timeout))
    }
}

impl<T: HttpTransport> DirectoryClient<T> {
    pub fn with_transport(config: Arc<SyncConfig>, transport: T) -> Self {
        Self {
            config,
            transport,
            token: None,
            members: Vec::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Run the client-credentials grant and cache the bearer token.
    pub fn fetch_token(&mut self) -> Result<(), DirectoryError> {
        let directory = &self.config.directory;
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", directory.client_id.as_str()),
            ("scope", directory.scope.as_str()),
            ("client_secret", directory.client_secret.as_str()),
        ];

        let response = self
            .transport
            .post_form(&directory.auth_url, &form)
            .map_err(|e| DirectoryError::Auth {
                status: None,
                message: e.to_string(),
            })?;

        if response.status != 200 {
            return Err(DirectoryError::Auth {
                status: Some(response.status),
                message: error_message(&response),
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&response.body).map_err(|e| DirectoryError::Auth {
                status: Some(200),
                message: format!("unreadable token response: {e}"),
            })?;
        let token = parsed
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| DirectoryError::Auth {
                status: Some(200),
                message: "token response carried no access_token".to_string(),
            })?;

        tracing::debug!("directory token acquired");
        self.token = Some(token);
        Ok(())
    }

    pub fn members_url(&self) -> String {
        let directory = &self.config.directory;
        format!(
            "{}/groups/{}/members?$select={MEMBER_FIELDS}",
            directory.graph_url.trim_end_matches('/'),
            directory.group_id,
        )
    }

    /// Walk every page of the member list. A rejected token is renewed once
    /// per call; a second rejection is returned as is.
    fn fetch_all_pages(&mut self) -> Result<Vec<DirectoryUser>, DirectoryError> {
        if self.token.is_none() {
            self.fetch_token()?;
        }

        let mut users = Vec::new();
        let mut reauthenticated = false;
        let mut pages = 0;
        let mut next = Some(self.members_url());

        while let Some(url) = next.take() {
            if pages == MAX_PAGES {
                return Err(DirectoryError::Decode(format!(
                    "membership exceeds {MAX_PAGES} pages"
                )));
            }

            let Some(token) = self.token.as_deref() else {
                return Err(DirectoryError::Auth {
                    status: None,
                    message: "no bearer token".to_string(),
                });
            };
            let response = self.transport.get_bearer(&url, token)?;

            match response.status {
                200 => {}
                401 | 403 if !reauthenticated => {
                    tracing::warn!(status = response.status, "directory token rejected; re-authenticating");
                    reauthenticated = true;
                    self.token = None;
                    self.fetch_token()?;
                    next = Some(url);
                    continue;
                }
                status => {
                    return Err(DirectoryError::Membership {
                        status,
                        message: error_message(&response),
                    })
                }
            }

            pages += 1;
            let page: MembersPage = serde_json::from_str(&response.body)
                .map_err(|e| DirectoryError::Decode(e.to_string()))?;

            for entry in page.value {
                match entry.user_principal_name.filter(|p| !p.is_empty()) {
                    Some(principal_name) => users.push(DirectoryUser {
                        display_name: entry.display_name.unwrap_or_default(),
                        principal_name,
                    }),
                    None => tracing::warn!(
                        display_name = entry.display_name.as_deref().unwrap_or(""),
                        "directory member without principal name skipped",
                    ),
                }
            }
            next = page.next_link;
        }

        Ok(users)
    }
}

impl<T: HttpTransport> MembershipSource for DirectoryClient<T> {
    fn fetch_membership(&mut self) -> Result<&[DirectoryUser], DirectoryError> {
        let mut users = self.fetch_all_pages()?;

        let ignore = &self.config.directory.ignore_list;
        let before = users.len();
        users.retain(|user| !ignore.contains(&user.principal_name));

        tracing::info!(
            members = users.len(),
            ignored = before - users.len(),
            "directory membership fetched"
        );
        self.members = users;
        Ok(&self.members)
    }

    fn members(&self) -> &[DirectoryUser] {
        &self.members
    }

    fn set_config(&mut self, config: Arc<SyncConfig>) {
        self.config = config;
        self.token = None;
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MembersPage {
    #[serde(default)]
    value: Vec<MemberEntry>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberEntry {
    display_name: Option<String>,
    user_principal_name: Option<String>,
}

/// Best human-readable message from an error body: OAuth `error_description`,
/// Graph `error.message`, or the raw body.
fn error_message(response: &HttpResponse) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(&response.body).ok();
    let described = parsed.as_ref().and_then(|value| {
        value
            .get("error_description")
            .and_then(|v| v.as_str())
            .or_else(|| value.pointer("/error/message").and_then(|v| v.as_str()))
            .or_else(|| value.get("error").and_then(|v| v.as_str()))
    });
    match described {
        Some(message) => message.to_string(),
        None if response.body.trim().is_empty() => "empty response body".to_string(),
        None => response.body.chars().take(200).collect(),
    }
}
