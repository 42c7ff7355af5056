//! Error types shared across the relay workspace.
//!
//! Request-time errors never reach the webhook sender: a decode error is
//! logged and tolerated, an authentication failure becomes a `403`, and a
//! [`DispatchError`] is logged inside the detached task that produced it.
//! Only a [`ConfigError`] is fatal, and only at startup.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors raised while assembling the process configuration.
///
/// Produced once at startup; the relay never starts with an invalid config.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting was not provided.
    #[error("Missing required setting: {variable}")]
    Missing {
        /// Name of the setting (environment variable) that was absent.
        variable: String,
    },

    /// A setting was provided but its value could not be used.
    #[error("Invalid value for {variable}: {reason}")]
    Invalid {
        /// Name of the offending setting.
        variable: String,
        /// Why the value was rejected.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// Errors produced by a single outbound dispatch attempt.
///
/// The relay performs exactly one attempt per accepted event; these errors
/// are reported for observability and then dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("Dispatch transport failure: {message}")]
    Transport {
        /// Description of the underlying client error.
        message: String,
    },

    /// The downstream API answered with a non-success status.
    #[error("Dispatch rejected with status {status}: {body}")]
    Rejected {
        /// HTTP status code returned by the downstream API.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The request could not be built (invalid URL or header value).
    #[error("Dispatch request could not be built: {message}")]
    Request {
        /// Description of the problem.
        message: String,
    },
}
