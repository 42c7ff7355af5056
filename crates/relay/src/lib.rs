//! Core domain of the Quay → GitHub build relay.
//!
//! This crate holds every concept the relay reasons about: the two webhook
//! payload shapes, the newtype identifiers, the certificate-based sender
//! check, the payload transcoder, and the dispatch port. Infrastructure
//! crates implement the port and feed connection state in; they never add
//! domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; `listener` and `github` define *how*.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`RepositoryId`, `CommitSha`, `DeliveryId`, etc.) |
//! | [`payloads`] | Inbound Quay notification and outbound GitHub dispatch shapes |
//! | [`auth`] | `Authenticator` over the client certificate identity |
//! | [`transcode`] | `Transcoder`: inbound payload → dispatch URL and body |
//! | [`dispatch`] | `DispatchClient` port and detached-outcome types |
//! | [`config`] | Immutable `RelayConfig` |
//! | [`errors`] | Configuration and dispatch error types |

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod identifiers;
pub mod payloads;
pub mod transcode;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use auth::{AuthDecision, Authenticator, PeerIdentity};
pub use config::{ApiToken, RelayConfig, DEFAULT_API_BASE_URL, DEFAULT_TRUSTED_COMMON_NAME};
pub use dispatch::{DispatchClient, DispatchOutcome, DispatchReport};
pub use errors::{ConfigError, DispatchError};
pub use identifiers::{
    CommitSha, DeliveryId, RepositoryId, ShortCommitRef, TriggerKind, SHORT_COMMIT_LEN,
};
pub use payloads::{
    ClientPayload, CommitInfo, CommitPerson, InboundBuildEvent, OutboundDispatchEvent,
    TriggerMetadata, BUILD_SUCCESS_EVENT_TYPE,
};
pub use transcode::{DispatchRequest, Transcoder};
