//! Blocking HTTP seam.

use std::time::Duration;

use crate::error::DirectoryError;

/// Status and body of a completed exchange. Non-2xx statuses are responses,
/// not errors; only connection-level failures are `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

pub trait HttpTransport: Send {
    /// POST an `application/x-www-form-urlencoded` body.
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse, DirectoryError>;

    /// GET with an `Authorization: Bearer` header.
    fn get_bearer(&self, url: &str, token: &str) -> Result<HttpResponse, DirectoryError>;
}

/// Production transport: one `ureq` agent with a client-wide timeout.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl HttpTransport for UreqTransport {
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<HttpResponse, DirectoryError> {
        into_response(self.agent.post(url).send_form(form))
    }

    fn get_bearer(&self, url: &str, token: &str) -> Result<HttpResponse, DirectoryError> {
        into_response(
            self.agent
                .get(url)
                .set("Authorization", &format!("Bearer {token}"))
                .set("Accept", "application/json")
                .call(),
        )
    }
}

fn into_response(
    result: Result<ureq::Response, ureq::Error>,
) -> Result<HttpResponse, DirectoryError> {
    let response = match result {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(ureq::Error::Transport(transport)) => {
            return Err(DirectoryError::Transport(transport.to_string()))
        }
    };
    let status = response.status();
    let body = response
        .into_string()
        .map_err(|e| DirectoryError::Transport(format!("reading body: {e}")))?;
    Ok(HttpResponse { status, body })
}
