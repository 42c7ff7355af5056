//! Sender authentication from the connection's client certificate.
//!
//! The TLS listener asks every client for a certificate but does not insist
//! on one. Whatever it collected is summarised as a [`PeerIdentity`] and the
//! [`Authenticator`] turns that into an [`AuthDecision`]. Cryptographic checks
//! (handshake signature, optional chain validation) belong to the transport;
//! this module only judges the identity claim.

/// Identity claimed by the leaf certificate a client presented.
///
/// A connection without TLS, or a TLS connection whose client sent no
/// certificate, has no `PeerIdentity` at all.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PeerIdentity {
    common_name: Option<String>,
}

impl PeerIdentity {
    /// Identity of a leaf certificate with the given subject common name.
    ///
    /// `None` records a certificate whose subject had no readable common name.
    pub fn new(common_name: Option<String>) -> Self {
        Self { common_name }
    }

    /// Returns the subject common name, if the certificate carried one.
    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }
}

/// Outcome of authenticating one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Accept,
    Reject,
}

impl AuthDecision {
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Accepts exactly one sender: the holder of a certificate whose common name
/// matches the trusted identity, compared case-insensitively.
#[derive(Debug, Clone)]
pub struct Authenticator {
    trusted_common_name: String,
}

impl Authenticator {
    pub fn new(trusted_common_name: impl Into<String>) -> Self {
        Self {
            trusted_common_name: trusted_common_name.into().to_lowercase(),
        }
    }

    /// Decides whether the peer is the trusted sender.
    ///
    /// Rejects when `peer` is `None`, when its certificate has no common
    /// name, and when the name differs from the trusted identity.
    pub fn authenticate(&self, peer: Option<&PeerIdentity>) -> AuthDecision {
        match peer.and_then(PeerIdentity::common_name) {
            Some(cn) if cn.to_lowercase() == self.trusted_common_name => AuthDecision::Accept,
            _ => AuthDecision::Reject,
        }
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
