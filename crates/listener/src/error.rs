//! Startup errors for the TLS listener.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that prevent the listener from starting.
///
/// Request-time failures are handled inside the endpoint and never surface
/// here.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// A certificate or key file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The certificate PEM was malformed or empty.
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// The private key PEM was malformed or missing.
    #[error("Private key error: {0}")]
    PrivateKey(String),

    /// rustls refused the assembled configuration.
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// The listening socket could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
