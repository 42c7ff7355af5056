//! The `POST /incoming` webhook endpoint.
//!
//! Per request: read and permissively decode the body, authenticate the
//! connection's client certificate, then either answer `403` or hand the
//! event to a detached dispatch task and answer `204` at once. The sender
//! never learns how the dispatch went, and no request path yields a `5xx`.

use std::sync::Arc;

use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::routing::any;
use axum::Router;
use bytes::Bytes;
use relay::{
    Authenticator, DeliveryId, DispatchClient, DispatchOutcome, InboundBuildEvent, PeerIdentity,
    RelayConfig, Transcoder,
};
use tracing::{debug, info, instrument, warn};

use crate::DispatchSpawner;

/// Path Quay is configured to POST build notifications to.
pub const INCOMING_PATH: &str = "/incoming";

/// Largest body the endpoint will read; Quay notifications are a few KiB.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared, read-only state behind the endpoint.
#[derive(Clone)]
pub struct RelayState {
    config: Arc<RelayConfig>,
    authenticator: Arc<Authenticator>,
    transcoder: Arc<Transcoder>,
    dispatcher: Arc<dyn DispatchClient>,
    spawner: DispatchSpawner,
}

impl RelayState {
    /// Wires the endpoint's collaborators from `config`.
    pub fn new(config: Arc<RelayConfig>, dispatcher: Arc<dyn DispatchClient>) -> Self {
        Self {
            authenticator: Arc::new(Authenticator::new(config.trusted_common_name())),
            transcoder: Arc::new(Transcoder::new(config.api_base_url())),
            config,
            dispatcher,
            spawner: DispatchSpawner::new(),
        }
    }

    /// Replaces the spawner, e.g. with one that reports outcomes.
    pub fn with_spawner(mut self, spawner: DispatchSpawner) -> Self {
        self.spawner = spawner;
        self
    }
}

/// Builds the router serving [`INCOMING_PATH`].
///
/// The handler reads the caller's identity from a [`PeerIdentity`] request
/// extension, which the TLS server inserts for connections that presented a
/// client certificate. Every method is accepted on the path, so the only
/// statuses it produces are `204` and `403`.
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route(INCOMING_PATH, any(incoming))
        .with_state(state)
}

async fn incoming(State(state): State<RelayState>, request: Request) -> StatusCode {
    handle_incoming(state, DeliveryId::new_random(), request).await
}

#[instrument(name = "incoming", skip_all, fields(delivery = %delivery))]
async fn handle_incoming(state: RelayState, delivery: DeliveryId, request: Request) -> StatusCode {
    let (parts, body) = request.into_parts();

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Failed to read webhook body");
            Bytes::new()
        }
    };

    if state.config.debug() {
        log_request(&parts, &body);
    }

    // Malformed payloads are tolerated: Quay is still acknowledged and the
    // event proceeds with empty fields.
    let inbound = InboundBuildEvent::decode(&body).unwrap_or_else(|e| {
        warn!(error = %e, "Malformed build notification");
        InboundBuildEvent::default()
    });

    let peer = parts.extensions.get::<PeerIdentity>();
    if !state.authenticator.authenticate(peer).is_accepted() {
        warn!(
            common_name = peer.and_then(PeerIdentity::common_name).unwrap_or("<none>"),
            "Rejected webhook from untrusted sender"
        );
        return StatusCode::FORBIDDEN;
    }

    info!(
        repository = %inbound.repository,
        build_id = %inbound.build_id,
        "Accepted build notification"
    );

    let RelayState {
        config,
        transcoder,
        dispatcher,
        spawner,
        ..
    } = state;
    spawner.spawn(
        delivery,
        relay_event(config, transcoder, dispatcher, inbound),
    );

    StatusCode::NO_CONTENT
}

/// Transcodes and dispatches one authenticated event. Runs detached.
async fn relay_event(
    config: Arc<RelayConfig>,
    transcoder: Arc<Transcoder>,
    dispatcher: Arc<dyn DispatchClient>,
    inbound: InboundBuildEvent,
) -> DispatchOutcome {
    let kind = inbound.trigger_kind();
    if !config.permits_trigger(kind.as_ref()) {
        let reason = format!(
            "trigger kind '{}' is not allowed",
            kind.as_ref().map(|k| k.as_str()).unwrap_or_default()
        );
        info!(%reason, "Dispatch skipped");
        return DispatchOutcome::Skipped { reason };
    }

    let Some(request) = transcoder.transcode(&inbound) else {
        let reason = "notification names no repository".to_string();
        warn!(%reason, "Dispatch skipped");
        return DispatchOutcome::Skipped { reason };
    };

    match dispatcher.dispatch(&request).await {
        Ok(()) => DispatchOutcome::Delivered,
        Err(e) => {
            warn!(error = %e, url = %request.url, "Dispatch failed");
            DispatchOutcome::Failed(e)
        }
    }
}

fn log_request(parts: &Parts, body: &Bytes) {
    let headers: Vec<String> = parts
        .headers
        .iter()
        .map(|(name, value)| format!("{name}: {}", value.to_str().unwrap_or("<binary>")))
        .collect();
    debug!(
        method = %parts.method,
        uri = %parts.uri,
        version = ?parts.version,
        headers = ?headers,
        body = %String::from_utf8_lossy(body),
        "Inbound webhook request"
    );
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
