//! Detached execution of dispatch work.
//!
//! Every accepted webhook hands its transcode-and-dispatch work to a
//! [`DispatchSpawner`], which runs it on its own tokio task, off the request
//! path. The task is never joined or cancelled. A panic inside it is caught
//! and logged; the serving process and other requests are unaffected.
//!
//! Observers may attach a bounded report channel
//! ([`DispatchSpawner::with_reports`]) to learn how each detached dispatch
//! ended. Reports are sent with `try_send`: a slow or absent reader loses
//! reports, it never delays a dispatch.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use relay::{DeliveryId, DispatchOutcome, DispatchReport};
use tokio::sync::mpsc;
use tracing::{debug, error, info_span, Instrument};

/// Spawns fire-and-forget dispatch tasks with panic isolation.
#[derive(Debug, Clone, Default)]
pub struct DispatchSpawner {
    reports: Option<mpsc::Sender<DispatchReport>>,
}

impl DispatchSpawner {
    /// Creates a spawner that reports to nobody.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a spawner that reports every outcome on a channel holding at
    /// most `capacity` unread reports.
    pub fn with_reports(capacity: usize) -> (Self, mpsc::Receiver<DispatchReport>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { reports: Some(tx) }, rx)
    }

    /// Runs `work` on a detached task tagged with `delivery`.
    ///
    /// Returns immediately. Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, delivery: DeliveryId, work: F)
    where
        F: Future<Output = DispatchOutcome> + Send + 'static,
    {
        let reports = self.reports.clone();
        let span = info_span!("dispatch", %delivery);

        tokio::spawn(
            async move {
                let outcome = match AssertUnwindSafe(work).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        error!(panic = %message, "Dispatch task panicked");
                        DispatchOutcome::Panicked { message }
                    }
                };

                if let Some(reports) = reports {
                    if let Err(e) = reports.try_send(DispatchReport { delivery, outcome }) {
                        debug!(error = %e, "Dispatch report dropped");
                    }
                }
            }
            .instrument(span),
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "spawner_tests.rs"]
mod tests;
