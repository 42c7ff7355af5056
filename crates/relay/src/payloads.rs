//! Wire shapes for the two webhooks the relay sits between.
//!
//! [`InboundBuildEvent`] is the build notification Quay POSTs to the relay;
//! [`OutboundDispatchEvent`] is the body of a GitHub `repository_dispatch`
//! call. Neither carries behaviour beyond decoding and a few typed accessors.

use serde::{Deserialize, Deserializer, Serialize};

use crate::{CommitSha, RepositoryId, ShortCommitRef, TriggerKind};

/// Event type announced on every dispatch the relay emits.
pub const BUILD_SUCCESS_EVENT_TYPE: &str = "QUAY_BUILD_SUCCESS";

// ---------------------------------------------------------------------------
// Inbound: Quay build notification
// ---------------------------------------------------------------------------

/// A Quay build-completion notification.
///
/// Every field is optional on the wire. Missing fields and explicit `null`s
/// both decode to the empty value; only a body that is not a JSON object of
/// this rough shape fails to decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundBuildEvent {
    /// Repository path in `"namespace/name"` form.
    #[serde(deserialize_with = "null_as_default")]
    pub repository: String,
    #[serde(deserialize_with = "null_as_default")]
    pub namespace: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    /// Pull URL of the image (e.g. `quay.io/org/app`).
    #[serde(deserialize_with = "null_as_default")]
    pub docker_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub homepage: String,
    #[serde(deserialize_with = "null_as_default")]
    pub build_id: String,
    /// Tags applied to the built image.
    #[serde(deserialize_with = "null_as_default")]
    pub docker_tags: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub trigger_kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub trigger_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub trigger_metadata: TriggerMetadata,
}

impl InboundBuildEvent {
    /// Decodes a notification body.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the body is not valid JSON or a
    /// field has an incompatible type. Callers that follow the relay's
    /// permissive policy fall back to [`InboundBuildEvent::default`].
    pub fn decode(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Returns the repository path, or `None` when the payload carried none.
    pub fn repository_id(&self) -> Option<RepositoryId> {
        RepositoryId::new(self.repository.as_str())
    }

    /// Returns the triggering commit, or `None` when the payload carried none.
    pub fn commit_sha(&self) -> Option<CommitSha> {
        CommitSha::new(self.trigger_metadata.commit.as_str())
    }

    /// Returns the trigger kind, or `None` when the payload carried none.
    pub fn trigger_kind(&self) -> Option<TriggerKind> {
        TriggerKind::new(self.trigger_kind.as_str())
    }
}

/// Source-control details of the build trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerMetadata {
    #[serde(deserialize_with = "null_as_default")]
    pub default_branch: String,
    /// Git ref that was built (e.g. `refs/heads/main`).
    #[serde(rename = "ref", deserialize_with = "null_as_default")]
    pub git_ref: String,
    /// Full commit SHA.
    #[serde(deserialize_with = "null_as_default")]
    pub commit: String,
    #[serde(deserialize_with = "null_as_default")]
    pub commit_info: CommitInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub author: CommitPerson,
    #[serde(deserialize_with = "null_as_default")]
    pub committer: CommitPerson,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitPerson {
    #[serde(deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub avatar_url: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Outbound: GitHub repository dispatch
// ---------------------------------------------------------------------------

/// Body of a GitHub `repository_dispatch` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundDispatchEvent {
    /// Always [`BUILD_SUCCESS_EVENT_TYPE`].
    pub event_type: String,
    pub client_payload: ClientPayload,
}

impl OutboundDispatchEvent {
    /// Builds the build-succeeded dispatch carrying `commit`.
    pub fn build_succeeded(commit: ShortCommitRef) -> Self {
        Self {
            event_type: BUILD_SUCCESS_EVENT_TYPE.to_string(),
            client_payload: ClientPayload {
                text: commit.into_string(),
            },
        }
    }
}

/// Free-form payload handed to the workflow triggered by the dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPayload {
    /// The abbreviated commit reference.
    pub text: String,
}

#[cfg(test)]
#[path = "payloads_tests.rs"]
mod tests;
