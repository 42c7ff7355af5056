//! Immutable relay configuration.
//!
//! [`RelayConfig`] is assembled once by the composition root and shared by
//! reference with every component that needs a setting. Nothing mutates it
//! after startup.

use std::collections::HashSet;

use crate::{ConfigError, TriggerKind};

/// Common name presented by Quay's webhook client certificate.
pub const DEFAULT_TRUSTED_COMMON_NAME: &str = "*.quay.io";

/// Base URL of the public GitHub REST API.
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

// ---------------------------------------------------------------------------

/// Credential sent with every dispatch request.
///
/// `Debug` is redacted so the token cannot leak through a logged config.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    /// Wraps a token, returning `None` if it is empty or only whitespace.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let v = value.into();
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Returns the secret value. Call only when building the outbound request.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiToken(<redacted>)")
    }
}

// ---------------------------------------------------------------------------

/// Process-wide relay settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    trusted_common_name: String,
    api_token: ApiToken,
    api_base_url: String,
    debug: bool,
    allowed_trigger_kinds: HashSet<TriggerKind>,
}

impl RelayConfig {
    /// Creates a configuration with defaults for everything but the token.
    pub fn new(api_token: ApiToken) -> Self {
        Self {
            trusted_common_name: DEFAULT_TRUSTED_COMMON_NAME.to_string(),
            api_token,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            debug: false,
            allowed_trigger_kinds: HashSet::new(),
        }
    }

    /// Overrides the trusted client-certificate common name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `name` is empty.
    pub fn with_trusted_common_name(mut self, name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                variable: "trusted_common_name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        self.trusted_common_name = name.trim().to_string();
        Ok(self)
    }

    /// Overrides the dispatch API base URL. A trailing `/` is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] unless the URL is `http://` or `https://`.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        let url = url.trim().trim_end_matches('/');
        if !(url.starts_with("https://") || url.starts_with("http://")) || url.contains(' ') {
            return Err(ConfigError::Invalid {
                variable: "api_base_url".to_string(),
                reason: format!("'{url}' is not an http(s) URL"),
            });
        }
        self.api_base_url = url.to_string();
        Ok(self)
    }

    /// Enables or disables debug request logging.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Restricts dispatch to the given trigger kinds. An empty set allows all.
    pub fn with_allowed_trigger_kinds(
        mut self,
        kinds: impl IntoIterator<Item = TriggerKind>,
    ) -> Self {
        self.allowed_trigger_kinds = kinds.into_iter().collect();
        self
    }

    pub fn trusted_common_name(&self) -> &str {
        &self.trusted_common_name
    }

    pub fn api_token(&self) -> &ApiToken {
        &self.api_token
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Returns `true` if an event with `kind` may be dispatched.
    ///
    /// With no allowlist configured every event is dispatched, including
    /// events that carry no trigger kind at all.
    pub fn permits_trigger(&self, kind: Option<&TriggerKind>) -> bool {
        if self.allowed_trigger_kinds.is_empty() {
            return true;
        }
        kind.is_some_and(|k| self.allowed_trigger_kinds.contains(k))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
