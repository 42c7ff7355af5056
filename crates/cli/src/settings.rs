//! Environment-driven startup configuration.
//!
//! Every setting is read once, here, and frozen into [`Settings`]. Lookups go
//! through a closure so the parsing can be tested without touching the
//! process environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use listener::{ListenerConfig, DEFAULT_BIND_ADDR};
use relay::{ApiToken, ConfigError, RelayConfig, TriggerKind};

pub const ENV_CERT: &str = "CRT";
pub const ENV_KEY: &str = "KEY";
pub const ENV_TOKEN: &str = "GH_TOKEN";
pub const ENV_DEBUG: &str = "DEBUG";
pub const ENV_BIND_ADDR: &str = "RELAY_BIND_ADDR";
pub const ENV_CLIENT_CA: &str = "RELAY_CLIENT_CA";
pub const ENV_TRUSTED_CN: &str = "RELAY_TRUSTED_CN";
pub const ENV_TRIGGER_KINDS: &str = "RELAY_TRIGGER_KINDS";
pub const ENV_API_URL: &str = "GITHUB_API_URL";
pub const ENV_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Everything the binary needs to start.
#[derive(Debug)]
pub struct Settings {
    pub relay: RelayConfig,
    pub listener: ListenerConfig,
    /// OTLP collector endpoint; tracing export is off when `None`.
    pub otlp_endpoint: Option<String>,
}

impl Settings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Settings::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`. Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `CRT`, `KEY` or `GH_TOKEN` is
    /// unset, and [`ConfigError::Invalid`] when a value cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &str| {
            get(name).ok_or_else(|| ConfigError::Missing {
                variable: name.to_string(),
            })
        };

        let token = ApiToken::new(require(ENV_TOKEN)?).ok_or_else(|| ConfigError::Missing {
            variable: ENV_TOKEN.to_string(),
        })?;

        let mut relay = RelayConfig::new(token).with_debug(get(ENV_DEBUG).as_deref() == Some("true"));
        if let Some(cn) = get(ENV_TRUSTED_CN) {
            relay = relay
                .with_trusted_common_name(cn)
                .map_err(|e| rename(e, ENV_TRUSTED_CN))?;
        }
        if let Some(url) = get(ENV_API_URL) {
            relay = relay
                .with_api_base_url(url)
                .map_err(|e| rename(e, ENV_API_URL))?;
        }
        if let Some(kinds) = get(ENV_TRIGGER_KINDS) {
            relay = relay.with_allowed_trigger_kinds(
                kinds.split(',').filter_map(|k| TriggerKind::new(k.trim())),
            );
        }

        let bind = get(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind.trim().parse().map_err(|e| ConfigError::Invalid {
            variable: ENV_BIND_ADDR.to_string(),
            reason: format!("'{bind}': {e}"),
        })?;

        let listener = ListenerConfig {
            bind_addr,
            cert_path: PathBuf::from(require(ENV_CERT)?),
            key_path: PathBuf::from(require(ENV_KEY)?),
            client_ca_path: get(ENV_CLIENT_CA).map(PathBuf::from),
        };

        Ok(Self {
            relay,
            listener,
            otlp_endpoint: get(ENV_OTLP_ENDPOINT),
        })
    }
}

/// Reports a setter's error under the environment variable that fed it.
fn rename(error: ConfigError, variable: &str) -> ConfigError {
    match error {
        ConfigError::Invalid { reason, .. } => ConfigError::Invalid {
            variable: variable.to_string(),
            reason,
        },
        ConfigError::Missing { .. } => ConfigError::Missing {
            variable: variable.to_string(),
        },
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
