//! Outbound dispatch port.
//!
//! The relay sees only [`DispatchClient`]; the `github` crate supplies the
//! HTTP implementation. Keeping the trait here lets the endpoint be exercised
//! against in-process fakes.

use async_trait::async_trait;

use crate::{DeliveryId, DispatchError, DispatchRequest};

/// Sends one dispatch to the downstream CI/CD API.
///
/// Implementations make a single attempt. They must not retry: the relay
/// promises nothing beyond best-effort delivery.
#[async_trait]
pub trait DispatchClient: Send + Sync {
    /// Delivers `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] when the request could not be sent or the
    /// downstream API answered with a non-success status.
    async fn dispatch(&self, request: &DispatchRequest) -> Result<(), DispatchError>;
}

// ---------------------------------------------------------------------------

/// How a detached dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The downstream API accepted the dispatch.
    Delivered,
    /// The event was authenticated but not dispatched (no repository, or its
    /// trigger kind is not on the allowlist).
    Skipped {
        reason: String,
    },
    /// The single attempt failed.
    Failed(DispatchError),
    /// The dispatch task panicked. The panic was contained.
    Panicked {
        message: String,
    },
}

/// Completion record of one detached dispatch, for observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivery: DeliveryId,
    pub outcome: DispatchOutcome,
}
