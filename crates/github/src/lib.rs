//! Quay relay GitHub infrastructure adapter.
//!
//! Implements [`relay::DispatchClient`] against GitHub's
//! [repository dispatch](https://docs.github.com/en/rest/repos/repos#create-a-repository-dispatch-event)
//! endpoint using `reqwest`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. Headers,
//! authentication, and response classification live here; the [`relay`]
//! crate never sees an HTTP type.
//!
//! ## Delivery
//!
//! One attempt per call, with the client's default timeouts. There is no
//! retry: a failed dispatch is returned to the caller, which logs and drops it.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use relay::{ApiToken, DispatchClient, DispatchError, DispatchRequest, RelayConfig};

/// Media type requested from the dispatch endpoint.
///
/// Repository dispatch shipped behind the `everest` preview; the header is
/// still accepted by GitHub and keeps older GitHub Enterprise servers working.
pub const DISPATCH_ACCEPT: &str = "application/vnd.github.everest-preview+json";

/// `User-Agent` sent with every request. GitHub rejects requests without one.
pub const USER_AGENT: &str = concat!("quay-relay/", env!("CARGO_PKG_VERSION"));

/// Longest response body kept in a [`DispatchError::Rejected`].
const MAX_ERROR_BODY: usize = 1024;

/// [`DispatchClient`] backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubDispatcher {
    client: Client,
    token: ApiToken,
    debug: bool,
}

impl GithubDispatcher {
    /// Creates a dispatcher using the token and debug flag from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Request`] if the HTTP client cannot be built
    /// (for example, no TLS backend could be initialised).
    pub fn new(config: &RelayConfig) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DispatchError::Request {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self::with_client(client, config))
    }

    /// Creates a dispatcher around an existing `reqwest` client.
    pub fn with_client(client: Client, config: &RelayConfig) -> Self {
        Self {
            client,
            token: config.api_token().clone(),
            debug: config.debug(),
        }
    }
}

#[async_trait]
impl DispatchClient for GithubDispatcher {
    #[instrument(skip_all, fields(url = %request.url))]
    async fn dispatch(&self, request: &DispatchRequest) -> Result<(), DispatchError> {
        if self.debug {
            debug!(
                method = "POST",
                accept = DISPATCH_ACCEPT,
                authorization = "token <redacted>",
                body = %serde_json::to_string(&request.event).unwrap_or_default(),
                "Outbound dispatch request"
            );
        }

        let response = self
            .client
            .post(&request.url)
            .header(ACCEPT, DISPATCH_ACCEPT)
            .header(AUTHORIZATION, format!("token {}", self.token.expose()))
            .json(&request.event)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    DispatchError::Request {
                        message: e.to_string(),
                    }
                } else {
                    DispatchError::Transport {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status.is_success() && !self.debug {
            info!(status = status.as_u16(), "Dispatch delivered");
            return Ok(());
        }

        // Body read failures only cost us diagnostics.
        let body = response.text().await.unwrap_or_default();
        if self.debug {
            debug!(status = status.as_u16(), body = %body, "Outbound dispatch response");
        }

        if status.is_success() {
            info!(status = status.as_u16(), "Dispatch delivered");
            Ok(())
        } else {
            warn!(status = status.as_u16(), "Dispatch rejected by GitHub");
            Err(DispatchError::Rejected {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            })
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
