//! Quay → GitHub transcoding.
//!
//! Pure mapping from an authenticated [`InboundBuildEvent`] to the
//! [`DispatchRequest`] that announces it to the repository's workflows.

use crate::{InboundBuildEvent, OutboundDispatchEvent, RepositoryId, ShortCommitRef};

/// A dispatch ready to send: where to, and what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    /// Full URL of the repository's `dispatches` endpoint.
    pub url: String,
    pub event: OutboundDispatchEvent,
}

/// Maps inbound build notifications onto repository dispatches.
#[derive(Debug, Clone)]
pub struct Transcoder {
    api_base_url: String,
}

impl Transcoder {
    /// Creates a transcoder targeting the API at `api_base_url`.
    pub fn new(api_base_url: impl Into<String>) -> Self {
        let base = api_base_url.into();
        Self {
            api_base_url: base.trim_end_matches('/').to_string(),
        }
    }

    /// Builds the `repos/{repository}/dispatches` URL for `repository`.
    ///
    /// The repository path is inserted as-is, so `"org/app"` lands in two
    /// path segments exactly as GitHub expects.
    pub fn dispatch_url(&self, repository: &RepositoryId) -> String {
        format!("{}/repos/{}/dispatches", self.api_base_url, repository)
    }

    /// Transcodes `inbound` into a dispatch.
    ///
    /// Returns `None` when the notification names no repository, since no
    /// destination can be derived for it. A missing or short commit still
    /// produces a dispatch; the text is then the whole (possibly empty) commit.
    pub fn transcode(&self, inbound: &InboundBuildEvent) -> Option<DispatchRequest> {
        let repository = inbound.repository_id()?;
        let commit = match inbound.commit_sha() {
            Some(sha) => ShortCommitRef::from(&sha),
            // No commit in the payload: the dispatch carries empty text.
            None => ShortCommitRef::abbreviate(""),
        };
        Some(DispatchRequest {
            url: self.dispatch_url(&repository),
            event: OutboundDispatchEvent::build_succeeded(commit),
        })
    }
}

#[cfg(test)]
#[path = "transcode_tests.rs"]
mod tests;
