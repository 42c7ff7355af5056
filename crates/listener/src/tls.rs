//! rustls server configuration and peer identity extraction.
//!
//! The listener *requests* a client certificate on every handshake but never
//! *requires* one: a client without a certificate completes the handshake and
//! is turned away by the endpoint with a `403`. Two verification modes exist:
//!
//! - **No client CA configured**: any presented certificate is accepted by
//!   the transport. rustls still checks the handshake signature, so the client
//!   must hold the certificate's private key, but the chain is not validated.
//! - **Client CA configured**: presented certificates must chain to one of
//!   the configured roots ([`WebPkiClientVerifier`] with unauthenticated
//!   clients allowed).
//!
//! In both modes the identity decision itself is made by
//! [`relay::Authenticator`] over the [`PeerIdentity`] extracted here.

use std::path::Path;
use std::sync::Arc;

use relay::PeerIdentity;
use rustls::client::danger::HandshakeSignatureValid;
use rustls::crypto::{CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::server::WebPkiClientVerifier;
use rustls::{DigitallySignedStruct, DistinguishedName, RootCertStore, ServerConfig, SignatureScheme};
use tokio_rustls::TlsAcceptor;
use tracing::debug;
use x509_parser::der_parser::asn1_rs::Tag;
use x509_parser::x509::AttributeTypeAndValue;

use crate::ListenerError;

/// PEM material for the server side of the handshake.
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    /// Server certificate chain, leaf first.
    pub cert_chain_pem: Vec<u8>,
    pub private_key_pem: Vec<u8>,
    /// Roots that presented client certificates must chain to, if any.
    pub client_ca_pem: Option<Vec<u8>>,
}

impl TlsMaterial {
    /// Reads the PEM files from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Io`] if any file cannot be read.
    pub fn from_files(
        cert_path: &Path,
        key_path: &Path,
        client_ca_path: Option<&Path>,
    ) -> Result<Self, ListenerError> {
        Ok(Self {
            cert_chain_pem: read(cert_path)?,
            private_key_pem: read(key_path)?,
            client_ca_pem: client_ca_path.map(read).transpose()?,
        })
    }

    /// Builds a TLS acceptor from this material.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM cannot be parsed or rustls rejects the
    /// resulting configuration.
    pub fn acceptor(&self) -> Result<TlsAcceptor, ListenerError> {
        Ok(TlsAcceptor::from(self.server_config()?))
    }

    /// Builds the rustls server configuration.
    ///
    /// # Errors
    ///
    /// See [`TlsMaterial::acceptor`].
    pub fn server_config(&self) -> Result<Arc<ServerConfig>, ListenerError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        let cert_chain = parse_certificates(&self.cert_chain_pem)?;
        if cert_chain.is_empty() {
            return Err(ListenerError::Certificate(
                "no server certificates found".into(),
            ));
        }
        let private_key = parse_private_key(&self.private_key_pem)?;

        let verifier: Arc<dyn ClientCertVerifier> = match &self.client_ca_pem {
            Some(pem) => {
                let mut roots = RootCertStore::empty();
                for cert in parse_certificates(pem)? {
                    roots.add(cert).map_err(|e| {
                        ListenerError::Certificate(format!("failed to add client CA: {e}"))
                    })?;
                }
                if roots.is_empty() {
                    return Err(ListenerError::Certificate(
                        "no client CA certificates found".into(),
                    ));
                }
                WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
                    .allow_unauthenticated()
                    .build()
                    .map_err(|e| ListenerError::TlsConfig(format!("client verifier error: {e}")))?
            }
            None => Arc::new(RequestClientCert::new(&provider)),
        };

        let mut config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| ListenerError::TlsConfig(format!("protocol versions: {e}")))?
            .with_client_cert_verifier(verifier)
            .with_single_cert(cert_chain, private_key)
            .map_err(|e| ListenerError::TlsConfig(format!("server config error: {e}")))?;
        config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        Ok(Arc::new(config))
    }
}

fn read(path: &Path) -> Result<Vec<u8>, ListenerError> {
    std::fs::read(path).map_err(|source| ListenerError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse PEM-encoded certificates.
fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, ListenerError> {
    CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ListenerError::Certificate(format!("failed to parse certificates: {e}")))
}

/// Parse a PEM-encoded private key (PKCS#8, PKCS#1 or SEC1).
fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, ListenerError> {
    PrivateKeyDer::from_pem_slice(pem)
        .map_err(|e| ListenerError::PrivateKey(format!("failed to parse private key: {e}")))
}

// ---------------------------------------------------------------------------
// Client certificate verifier: request, don't require, don't chain-validate
// ---------------------------------------------------------------------------

/// Asks for a client certificate and accepts whatever is presented.
///
/// Handshake signatures are still verified, proving the client holds the
/// key for the certificate it sent.
#[derive(Debug)]
struct RequestClientCert {
    algorithms: WebPkiSupportedAlgorithms,
}

impl RequestClientCert {
    fn new(provider: &CryptoProvider) -> Self {
        Self {
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ClientCertVerifier for RequestClientCert {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        false
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

// ---------------------------------------------------------------------------
// Peer identity
// ---------------------------------------------------------------------------

/// Summarises the certificates a client presented.
///
/// Returns `None` when no certificate was presented. Only the leaf (first)
/// certificate is inspected; if it cannot be parsed or has no subject common
/// name, the identity carries no name and will not authenticate. When the
/// subject carries several common names the last one wins.
pub fn peer_identity(certificates: Option<&[CertificateDer<'_>]>) -> Option<PeerIdentity> {
    let leaf = certificates?.first()?;
    let common_name = match x509_parser::parse_x509_certificate(leaf.as_ref()) {
        Ok((_, cert)) => cert
            .subject()
            .iter_common_name()
            .last()
            .and_then(attribute_text),
        Err(e) => {
            debug!(error = %e, "Unparseable client certificate");
            None
        }
    };
    Some(PeerIdentity::new(common_name))
}

/// Decodes a directory string, including the UTF-16 `BMPString` form.
fn attribute_text(attribute: &AttributeTypeAndValue<'_>) -> Option<String> {
    let value = attribute.attr_value();
    if value.tag() == Tag::BmpString {
        if value.data.len() % 2 != 0 {
            return None;
        }
        let units = value
            .data
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        return char::decode_utf16(units).collect::<Result<String, _>>().ok();
    }
    attribute.as_str().ok().map(str::to_string)
}

#[cfg(test)]
#[path = "tls_tests.rs"]
mod tests;
