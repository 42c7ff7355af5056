//! Quay relay entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Read configuration** from the environment ([`settings`]). Missing
//!    certificate paths or a missing `GH_TOKEN` abort startup.
//! 2. **Wire observability**: a JSON `tracing-subscriber` layer and, when
//!    `OTEL_EXPORTER_OTLP_ENDPOINT` is set, an OpenTelemetry OTLP exporter
//!    ([`telemetry`]).
//! 3. **Construct infrastructure**: the `GithubDispatcher` behind the
//!    `DispatchClient` port, the `/incoming` router, and the mutual-TLS
//!    `RelayServer`.
//! 4. **Serve** until SIGINT or SIGTERM.

mod settings;
mod telemetry;

use std::sync::Arc;

use anyhow::Context;
use github::GithubDispatcher;
use listener::{router, RelayServer, RelayState};
use tracing::{info, warn};

use crate::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env().context("invalid configuration")?;
    let _telemetry = telemetry::init(settings.relay.debug(), settings.otlp_endpoint.as_deref())?;

    let config = Arc::new(settings.relay);
    info!(
        trusted_common_name = config.trusted_common_name(),
        api_base_url = config.api_base_url(),
        debug = config.debug(),
        "Starting quay-relay"
    );

    let dispatcher =
        Arc::new(GithubDispatcher::new(&config).context("failed to build GitHub client")?);
    let state = RelayState::new(config, dispatcher);

    let server = RelayServer::bind(&settings.listener, router(state))
        .await
        .context("failed to start HTTPS listener")?;
    server.serve(shutdown_signal()).await;

    info!("quay-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
