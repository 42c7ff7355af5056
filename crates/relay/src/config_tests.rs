use super::*;

fn token() -> ApiToken {
    ApiToken::new("ghp_secret").unwrap()
}

#[test]
fn test_defaults_trust_quay_and_target_public_github() {
    let config = RelayConfig::new(token());

    assert_eq!(config.trusted_common_name(), "*.quay.io");
    assert_eq!(config.api_base_url(), "https://api.github.com");
    assert!(!config.debug());
}

#[test]
fn test_api_token_debug_is_redacted() {
    let config = RelayConfig::new(token());

    let rendered = format!("{config:?}");

    assert!(!rendered.contains("ghp_secret"));
    assert!(rendered.contains("<redacted>"));
}

#[test]
fn test_api_token_rejects_blank_value() {
    assert!(ApiToken::new("   ").is_none());
    assert_eq!(ApiToken::new(" abc \n").unwrap().expose(), "abc");
}

#[test]
fn test_api_base_url_trailing_slash_is_dropped() {
    let config = RelayConfig::new(token())
        .with_api_base_url("http://127.0.0.1:9999/")
        .unwrap();

    assert_eq!(config.api_base_url(), "http://127.0.0.1:9999");
}

#[test]
fn test_api_base_url_must_be_http() {
    let err = RelayConfig::new(token())
        .with_api_base_url("ftp://example.com")
        .unwrap_err();

    assert!(matches!(err, ConfigError::Invalid { .. }));
}

#[test]
fn test_trusted_common_name_must_not_be_blank() {
    assert!(RelayConfig::new(token()).with_trusted_common_name(" ").is_err());
}

#[test]
fn test_every_trigger_permitted_without_allowlist() {
    let config = RelayConfig::new(token());

    assert!(config.permits_trigger(None));
    assert!(config.permits_trigger(TriggerKind::new("bitbucket").as_ref()));
}

#[test]
fn test_allowlist_restricts_triggers() {
    let config = RelayConfig::new(token())
        .with_allowed_trigger_kinds(TriggerKind::new("github"));

    assert!(config.permits_trigger(TriggerKind::new("github").as_ref()));
    assert!(!config.permits_trigger(TriggerKind::new("gitlab").as_ref()));
    assert!(!config.permits_trigger(None));
}
