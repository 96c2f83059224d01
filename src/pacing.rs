//! Pacing delays between pipeline operations
//!
//! The pipeline inserts fixed waits — before an item's first resolve attempt
//! and between items — to stay clear of upstream throttling. The waits are
//! unconditional: they do not react to observed rate-limit responses. They run
//! behind the [`Pacer`] trait so an adaptive limiter can replace the fixed
//! policy without touching the driver's control flow.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::types::Event;

/// Pacing policy used by the pipeline driver for its fixed delays
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait out one pacing delay.
    ///
    /// Implementations may return early when the pipeline is cancelled; the
    /// driver re-checks its cancellation token after every wait.
    async fn wait(&self, duration: Duration);
}

/// Fixed-delay pacer that narrates a second-by-second countdown
///
/// Emits [`Event::PacingStarted`] followed by one [`Event::PacingTick`] per
/// elapsed second, so the dashboard can render a live countdown. Cancellation
/// cuts the wait short.
pub struct CountdownPacer {
    event_tx: tokio::sync::broadcast::Sender<Event>,
    cancel_token: CancellationToken,
}

impl CountdownPacer {
    /// Create a countdown pacer publishing to the given event channel
    pub fn new(
        event_tx: tokio::sync::broadcast::Sender<Event>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            event_tx,
            cancel_token,
        }
    }
}

#[async_trait]
impl Pacer for CountdownPacer {
    async fn wait(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }

        let total_secs = duration.as_secs();
        self.event_tx
            .send(Event::PacingStarted {
                seconds: total_secs,
            })
            .ok();

        let mut remaining = total_secs;
        while remaining > 0 {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(1)) => {
                    remaining -= 1;
                    self.event_tx
                        .send(Event::PacingTick { remaining_secs: remaining })
                        .ok();
                }
                _ = self.cancel_token.cancelled() => {
                    tracing::debug!("Pacing wait interrupted by cancellation");
                    return;
                }
            }
        }

        // Sub-second tail, relevant for short configured delays
        let tail = duration - Duration::from_secs(total_secs);
        if !tail.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(tail) => {}
                _ = self.cancel_token.cancelled() => {}
            }
        }
    }
}

/// Pacer that skips all waits
///
/// Useful in tests and for consumers that pace externally.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpPacer;

#[async_trait]
impl Pacer for NoOpPacer {
    async fn wait(&self, _duration: Duration) {}
}
