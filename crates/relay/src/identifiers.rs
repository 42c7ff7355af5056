//! Newtype domain identifiers.
//!
//! Values that cross a component boundary are wrapped in a distinct newtype so
//! that a [`RepositoryId`] cannot be passed where a [`CommitSha`] is expected,
//! even though both are strings on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies one inbound webhook delivery.
///
/// Generated fresh for every request the endpoint receives and recorded on
/// both the request span and the detached dispatch span, so the log lines of
/// a delivery can be correlated after the sender has been answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryId(Uuid);

impl DeliveryId {
    /// Generates a new random delivery identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a repository in `"owner/repo"` format.
    ///
    /// The same path names the Quay repository and the GitHub repository
    /// that receives the dispatch.
    RepositoryId
}

string_id! {
    /// A Git commit SHA as reported by the registry (normally 40 hex characters).
    CommitSha
}

string_id! {
    /// The kind of trigger that started a registry build (e.g. `"github"`).
    TriggerKind
}

// ---------------------------------------------------------------------------

/// Length of the abbreviated commit reference sent downstream.
pub const SHORT_COMMIT_LEN: usize = 7;

/// An abbreviated commit reference: the leading [`SHORT_COMMIT_LEN`]
/// characters of a commit SHA, or the whole SHA when it is shorter.
///
/// Unlike the other identifiers this one may be empty: a build notification
/// without a commit still produces a (degenerate) reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShortCommitRef(String);

impl ShortCommitRef {
    /// Abbreviates `sha`. Truncation counts characters, never bytes.
    pub fn abbreviate(sha: &str) -> Self {
        Self(sha.chars().take(SHORT_COMMIT_LEN).collect())
    }

    /// Returns the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the reference, returning the owned string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&CommitSha> for ShortCommitRef {
    fn from(sha: &CommitSha) -> Self {
        Self::abbreviate(sha.as_str())
    }
}

impl std::fmt::Display for ShortCommitRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "identifiers_tests.rs"]
mod tests;
