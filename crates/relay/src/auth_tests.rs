use super::*;

fn quay() -> Authenticator {
    Authenticator::new("*.quay.io")
}

fn peer(cn: &str) -> PeerIdentity {
    PeerIdentity::new(Some(cn.to_string()))
}

#[test]
fn test_rejects_connection_without_certificate() {
    assert_eq!(quay().authenticate(None), AuthDecision::Reject);
}

#[test]
fn test_accepts_trusted_common_name() {
    assert_eq!(quay().authenticate(Some(&peer("*.quay.io"))), AuthDecision::Accept);
}

#[test]
fn test_common_name_comparison_ignores_case() {
    assert!(quay().authenticate(Some(&peer("*.QUAY.io"))).is_accepted());
    assert!(Authenticator::new("*.Quay.IO")
        .authenticate(Some(&peer("*.quay.io")))
        .is_accepted());
}

#[test]
fn test_rejects_untrusted_common_name() {
    assert_eq!(
        quay().authenticate(Some(&peer("evil.example.com"))),
        AuthDecision::Reject
    );
    assert_eq!(quay().authenticate(Some(&peer("quay.io"))), AuthDecision::Reject);
}

#[test]
fn test_rejects_certificate_without_common_name() {
    assert_eq!(
        quay().authenticate(Some(&PeerIdentity::new(None))),
        AuthDecision::Reject
    );
}
