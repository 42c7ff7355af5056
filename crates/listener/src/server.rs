//! TLS accept loop.
//!
//! Each accepted TCP connection gets its own task: TLS handshake, peer
//! identity extraction, then HTTP/1.1 or HTTP/2 serving through
//! `hyper-util`. The identity is attached to every request on that
//! connection as a [`relay::PeerIdentity`] extension.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::Router;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

use crate::{tls, ListenerError, TlsMaterial};

/// Port Quay delivers webhooks to by default.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:443";

/// Time a client gets to complete the TLS handshake.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Time an HTTP/1 client gets to send a complete request head.
pub const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed `accept`, so descriptor exhaustion does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Where and how to listen.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub bind_addr: SocketAddr,
    /// PEM server certificate chain.
    pub cert_path: PathBuf,
    /// PEM server private key.
    pub key_path: PathBuf,
    /// PEM roots for validating presented client certificates.
    pub client_ca_path: Option<PathBuf>,
}

/// A bound HTTPS listener serving one router.
pub struct RelayServer {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: Router,
    handshake_timeout: Duration,
    header_read_timeout: Duration,
}

impl RelayServer {
    /// Loads the TLS material named by `config` and binds the socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate or key cannot be loaded, or the
    /// address cannot be bound. Both are fatal at startup.
    pub async fn bind(config: &ListenerConfig, router: Router) -> Result<Self, ListenerError> {
        let acceptor = TlsMaterial::from_files(
            &config.cert_path,
            &config.key_path,
            config.client_ca_path.as_deref(),
        )?
        .acceptor()?;

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ListenerError::Bind {
                addr: config.bind_addr,
                source,
            })?;

        Ok(Self::from_parts(listener, acceptor, router))
    }

    /// Assembles a server from an already-bound listener.
    pub fn from_parts(listener: TcpListener, acceptor: TlsAcceptor, router: Router) -> Self {
        Self {
            listener,
            acceptor,
            router,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            header_read_timeout: HEADER_READ_TIMEOUT,
        }
    }

    /// Overrides [`HANDSHAKE_TIMEOUT`].
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Overrides [`HEADER_READ_TIMEOUT`].
    #[must_use]
    pub fn with_header_read_timeout(mut self, timeout: Duration) -> Self {
        self.header_read_timeout = timeout;
        self
    }

    /// Returns the bound socket address.
    ///
    /// # Errors
    ///
    /// Propagates the OS error if the address cannot be queried.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// Connections already being served, and dispatches already spawned, are
    /// left to finish on their own.
    pub async fn serve<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        if let Ok(addr) = self.listener.local_addr() {
            info!(%addr, "Relay listening");
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested; no longer accepting connections");
                    break;
                }
                accept = self.listener.accept() => {
                    match accept {
                        Ok((stream, peer_addr)) => {
                            let connection = Connection {
                                acceptor: self.acceptor.clone(),
                                router: self.router.clone(),
                                handshake_timeout: self.handshake_timeout,
                                header_read_timeout: self.header_read_timeout,
                            };
                            tokio::spawn(connection.serve(stream, peer_addr));
                        }
                        Err(err) => back_off_after_accept_error(&err).await,
                    }
                }
            }
        }
    }
}

async fn back_off_after_accept_error(err: &std::io::Error) {
    error!(error = %err, "Accept error");
    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
}

/// Per-connection settings copied out of [`RelayServer`].
struct Connection {
    acceptor: TlsAcceptor,
    router: Router,
    handshake_timeout: Duration,
    header_read_timeout: Duration,
}

impl Connection {
    async fn serve(self, stream: TcpStream, peer_addr: SocketAddr) {
        let stream =
            match tokio::time::timeout(self.handshake_timeout, self.acceptor.accept(stream)).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(err)) => {
                    debug!(%peer_addr, error = %err, "TLS handshake failed");
                    return;
                }
                Err(_) => {
                    debug!(%peer_addr, "TLS handshake timed out");
                    return;
                }
            };

        let identity = tls::peer_identity(stream.get_ref().1.peer_certificates());
        debug!(
            %peer_addr,
            client_cert = identity.is_some(),
            common_name = identity.as_ref().and_then(|i| i.common_name()).unwrap_or("<none>"),
            "TLS connection established"
        );

        let service = self.router.map_request(move |mut request: Request<Incoming>| {
            if let Some(identity) = &identity {
                request.extensions_mut().insert(identity.clone());
            }
            request
        });

        let mut builder = Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.header_read_timeout);

        if let Err(err) = builder
            .serve_connection(TokioIo::new(stream), TowerToHyperService::new(service))
            .await
        {
            let err_text = err.to_string();
            if is_expected_connection_close(&err_text) {
                debug!(%peer_addr, error = %err_text, "Connection closed");
            } else {
                warn!(%peer_addr, error = %err_text, "Connection ended with error");
            }
        }
    }
}

fn is_expected_connection_close(error: &str) -> bool {
    let normalized = error.to_ascii_lowercase();
    [
        "connection closed before message completed",
        "connection reset by peer",
        "broken pipe",
        "close_notify",
        "eof",
    ]
    .iter()
    .any(|pattern| normalized.contains(pattern))
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use rcgen::{CertificateParams, KeyPair};
    use tokio::io::AsyncReadExt;
    use tokio::sync::oneshot;

    use super::*;

    fn acceptor() -> TlsAcceptor {
        let key = KeyPair::generate().unwrap();
        let cert = CertificateParams::new(vec!["localhost".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        TlsMaterial {
            cert_chain_pem: cert.pem().into_bytes(),
            private_key_pem: key.serialize_pem().into_bytes(),
            client_ca_pem: None,
        }
        .acceptor()
        .unwrap()
    }

    #[test]
    fn classify_expected_connection_shutdown_errors() {
        assert!(is_expected_connection_close(
            "connection closed before message completed"
        ));
        assert!(is_expected_connection_close("Connection reset by peer (os error 104)"));
        assert!(is_expected_connection_close("peer closed connection without sending TLS close_notify"));
    }

    #[test]
    fn classify_unexpected_connection_errors() {
        assert!(!is_expected_connection_close("http parse failure"));
        assert!(!is_expected_connection_close("invalid HTTP method"));
    }

    #[tokio::test]
    async fn silent_client_is_disconnected_after_handshake_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = RelayServer::from_parts(listener, acceptor(), Router::new())
            .with_handshake_timeout(Duration::from_millis(200));
        let addr = server.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(server.serve(async {
            let _ = shutdown_rx.await;
        }));

        // Several idle sockets, none of which ever sends a ClientHello.
        let mut clients = Vec::new();
        for _ in 0..5 {
            clients.push(TcpStream::connect(addr).await.unwrap());
        }

        for client in &mut clients {
            let mut buf = [0u8; 1];
            let read = tokio::time::timeout(Duration::from_secs(5), client.read(&mut buf))
                .await
                .expect("server should drop a connection that never handshakes");
            assert!(matches!(read, Ok(0) | Err(_)));
        }
        drop(shutdown_tx);
    }

    #[tokio::test]
    async fn accept_error_pauses_before_retrying() {
        let started = Instant::now();

        back_off_after_accept_error(&std::io::Error::from_raw_os_error(24)).await;

        assert!(started.elapsed() >= ACCEPT_ERROR_BACKOFF);
    }
}
