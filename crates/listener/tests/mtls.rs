//! End-to-end relay tests over real mutual-TLS connections.
//!
//! A reqwest client plays Quay, the relay runs on an ephemeral port, and a
//! wiremock server plays the GitHub API.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use github::GithubDispatcher;
use listener::{router, DispatchSpawner, RelayServer, RelayState, TlsMaterial};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose, SanType,
};
use relay::{ApiToken, DispatchOutcome, DispatchReport, RelayConfig};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "ghp_end_to_end";

const NOTIFICATION: &str = r#"{
  "repository": "org/app",
  "namespace": "org",
  "name": "app",
  "docker_url": "quay.io/org/app",
  "build_id": "b-1",
  "docker_tags": ["latest"],
  "trigger_kind": "github",
  "trigger_metadata": { "ref": "refs/heads/main", "commit": "deadbeef1234" }
}"#;

// ---------------------------------------------------------------------------
// PKI helpers
// ---------------------------------------------------------------------------

struct TestCa {
    cert: Certificate,
    key: KeyPair,
}

/// PEM certificate and key.
struct Leaf {
    cert_pem: String,
    key_pem: String,
}

impl Leaf {
    fn identity(&self) -> reqwest::Identity {
        let pem = format!("{}{}", self.cert_pem, self.key_pem);
        reqwest::Identity::from_pem(pem.as_bytes()).expect("valid client identity")
    }
}

impl TestCa {
    fn new(name: &str) -> Self {
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        let key = KeyPair::generate().expect("key generation should succeed");
        let cert = params.self_signed(&key).expect("self-signing should succeed");
        Self { cert, key }
    }

    fn pem(&self) -> String {
        self.cert.pem()
    }

    fn server_leaf(&self) -> Leaf {
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, "relay.test");
        params.subject_alt_names = vec![SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST))];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        self.sign(params)
    }

    fn client_leaf(&self, common_name: &str) -> Leaf {
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, common_name);
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        self.sign(params)
    }

    fn sign(&self, params: CertificateParams) -> Leaf {
        let key = KeyPair::generate().expect("key generation should succeed");
        let cert = params
            .signed_by(&key, &self.cert, &self.key)
            .expect("signing should succeed");
        Leaf {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Relay {
    addr: SocketAddr,
    server_ca: TestCa,
    reports: mpsc::Receiver<DispatchReport>,
    _shutdown: oneshot::Sender<()>,
}

impl Relay {
    /// Starts a relay dispatching to `api_base`, optionally validating client
    /// certificates against `client_ca`.
    async fn start(api_base: &str, client_ca: Option<&TestCa>) -> Self {
        let server_ca = TestCa::new("Relay Server CA");
        let server_leaf = server_ca.server_leaf();
        let acceptor = TlsMaterial {
            cert_chain_pem: server_leaf.cert_pem.into_bytes(),
            private_key_pem: server_leaf.key_pem.into_bytes(),
            client_ca_pem: client_ca.map(|ca| ca.pem().into_bytes()),
        }
        .acceptor()
        .expect("TLS acceptor should build");

        let config = Arc::new(
            RelayConfig::new(ApiToken::new(TOKEN).unwrap())
                .with_api_base_url(api_base)
                .unwrap(),
        );
        let dispatcher = Arc::new(GithubDispatcher::new(&config).unwrap());
        let (spawner, reports) = DispatchSpawner::with_reports(8);
        let state = RelayState::new(config, dispatcher).with_spawner(spawner);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = RelayServer::from_parts(listener, acceptor, router(state));
        let addr = server.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(server.serve(async {
            let _ = shutdown_rx.await;
        }));

        Self {
            addr,
            server_ca,
            reports,
            _shutdown: shutdown_tx,
        }
    }

    fn client(&self, identity: Option<&Leaf>) -> reqwest::Client {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .add_root_certificate(
                reqwest::Certificate::from_pem(self.server_ca.pem().as_bytes()).unwrap(),
            );
        if let Some(leaf) = identity {
            builder = builder.identity(leaf.identity());
        }
        builder.build().unwrap()
    }

    async fn post(&self, identity: Option<&Leaf>) -> reqwest::Result<reqwest::Response> {
        self.client(identity)
            .post(format!("https://{}/incoming", self.addr))
            .header("content-type", "application/json")
            .body(NOTIFICATION)
            .send()
            .await
    }

    async fn next_report(&mut self) -> DispatchReport {
        tokio::time::timeout(Duration::from_secs(10), self.reports.recv())
            .await
            .expect("dispatch should finish")
            .expect("spawner is alive")
    }
}

async fn github_expecting_one_dispatch() -> MockServer {
    let api = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/repos/org/app/dispatches"))
        .and(header("authorization", format!("token {TOKEN}").as_str()))
        .and(header("accept", github::DISPATCH_ACCEPT))
        .and(body_json(json!({
            "event_type": "QUAY_BUILD_SUCCESS",
            "client_payload": { "text": "deadbee" }
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&api)
        .await;
    api
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread")]
async fn test_trusted_certificate_relays_build_to_github() {
    let api = github_expecting_one_dispatch().await;
    let mut relay = Relay::start(&api.uri(), None).await;
    let quay = TestCa::new("Quay CA").client_leaf("*.quay.io");

    let response = relay.post(Some(&quay)).await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
    assert_eq!(relay.next_report().await.outcome, DispatchOutcome::Delivered);
    assert_eq!(api.received_requests().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_certificate_is_forbidden_without_dispatch() {
    let api = MockServer::start().await;
    let relay = Relay::start(&api.uri(), None).await;

    let response = relay.post(None).await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(api.received_requests().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_untrusted_common_name_is_forbidden() {
    let api = MockServer::start().await;
    let relay = Relay::start(&api.uri(), None).await;
    let evil = TestCa::new("Evil CA").client_leaf("evil.example.com");

    let response = relay.post(Some(&evil)).await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(api.received_requests().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_github_does_not_delay_acknowledgement() {
    // Nothing listens on port 1.
    let mut relay = Relay::start("http://127.0.0.1:1", None).await;
    let quay = TestCa::new("Quay CA").client_leaf("*.quay.io");

    let started = Instant::now();
    let response = relay.post(Some(&quay)).await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(matches!(
        relay.next_report().await.outcome,
        DispatchOutcome::Failed(_)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_client_ca_accepts_certificates_it_issued() {
    let api = github_expecting_one_dispatch().await;
    let quay_ca = TestCa::new("Quay CA");
    let mut relay = Relay::start(&api.uri(), Some(&quay_ca)).await;

    let response = relay
        .post(Some(&quay_ca.client_leaf("*.quay.io")))
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
    assert_eq!(relay.next_report().await.outcome, DispatchOutcome::Delivered);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_client_ca_refuses_foreign_certificate_at_handshake() {
    let api = MockServer::start().await;
    let quay_ca = TestCa::new("Quay CA");
    let relay = Relay::start(&api.uri(), Some(&quay_ca)).await;
    let forged = TestCa::new("Forger CA").client_leaf("*.quay.io");

    assert!(relay.post(Some(&forged)).await.is_err());
    assert!(api.received_requests().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_client_ca_still_allows_anonymous_handshake() {
    let api = MockServer::start().await;
    let quay_ca = TestCa::new("Quay CA");
    let relay = Relay::start(&api.uri(), Some(&quay_ca)).await;

    let response = relay.post(None).await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::FORBIDDEN);
}
