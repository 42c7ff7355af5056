//! Quay relay inbound infrastructure.
//!
//! Serves the `POST /incoming` webhook over HTTPS and turns each accepted
//! notification into a detached dispatch.
//!
//! - [`RelayServer`]: binds the TLS listener. Every handshake *requests* a
//!   client certificate; none is *required*. The leaf certificate's identity
//!   is attached to each request on the connection.
//! - [`router`] / [`RelayState`]: the endpoint, which decodes, authenticates,
//!   spawns and answers `204`, or rejects with `403`.
//! - [`DispatchSpawner`]: fire-and-forget task runner with panic isolation
//!   and an optional completion-report channel.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Sockets, TLS, and HTTP framing live here. The
//! [`relay`] crate sees only [`relay::PeerIdentity`] and the decoded payload.

pub mod endpoint;
pub mod error;
pub mod server;
pub mod spawner;
pub mod tls;

pub use endpoint::{router, RelayState, INCOMING_PATH};
pub use error::ListenerError;
pub use server::{
    ListenerConfig, RelayServer, DEFAULT_BIND_ADDR, HANDSHAKE_TIMEOUT, HEADER_READ_TIMEOUT,
};
pub use spawner::DispatchSpawner;
pub use tls::{peer_identity, TlsMaterial};
