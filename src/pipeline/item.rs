//! Per-item stage sequence — download then upload under one retry budget.

use std::sync::Arc;
use std::time::Duration;

use super::PipelineDriver;
use crate::error::{Error, Result};
use crate::retry::{RetryBudget, run_with_retry};
use crate::types::{CandidateItem, Event, ItemId, ItemStatus, StatePatch, StoredArtifact};

/// Progress when the download stage begins
const PROGRESS_DOWNLOAD_STARTED: u8 = 5;
/// Progress when the download stage succeeded and upload begins
const PROGRESS_UPLOAD_STARTED: u8 = 50;

impl PipelineDriver {
    /// Run one item through the full stage sequence.
    ///
    /// State machine: `Downloading → Uploading → Completed`, with `Waiting`
    /// during retry backoff and `Failed` reachable from either stage. The
    /// retry budget is shared across both stages, so the item makes at most
    /// `max_retries` stage calls in total.
    ///
    /// A failure is recorded on the item and returned; the caller tallies it
    /// and moves on — one item never aborts the batch.
    pub(super) async fn run_item(&self, item: &CandidateItem) -> Result<StoredArtifact> {
        let id = &item.id;
        let config = Arc::clone(&self.config);
        let mut budget = RetryBudget::new(&config.retry);

        tracing::info!(item_id = %id, title = %item.title, "Item pipeline started");
        self.registry().update(
            id,
            StatePatch::status(ItemStatus::Downloading).with_progress(PROGRESS_DOWNLOAD_STARTED),
        );
        self.event_tx.send(Event::Downloading { id: id.clone() }).ok();

        // Mandatory pacing wait before the first resolve attempt; keeps the
        // platform from throttling burst downloads. Unconditional, once per item.
        self.pacer.wait(config.pacing.pre_resolve_delay).await;
        if self.cancel_token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let reference = match run_with_retry(
            &mut budget,
            || async move {
                self.registry()
                    .update(id, StatePatch::status(ItemStatus::Downloading));
                self.resolver.resolve(item).await
            },
            |attempt, delay, error| self.notify_retry(id, attempt, delay, error),
        )
        .await
        {
            Ok(reference) => reference,
            Err(e) => {
                self.fail_item(id, &budget, &e);
                return Err(e);
            }
        };

        tracing::info!(item_id = %id, file_name = %reference.file_name, "Artifact resolved");
        self.registry().update(
            id,
            StatePatch::status(ItemStatus::Uploading).with_progress(PROGRESS_UPLOAD_STARTED),
        );
        self.event_tx.send(Event::Uploading { id: id.clone() }).ok();

        let reference = &reference;
        let artifact = match run_with_retry(
            &mut budget,
            || async move {
                self.registry()
                    .update(id, StatePatch::status(ItemStatus::Uploading));
                self.store.store(reference, &reference.file_name).await
            },
            |attempt, delay, error| self.notify_retry(id, attempt, delay, error),
        )
        .await
        {
            Ok(artifact) => artifact,
            Err(e) => {
                self.fail_item(id, &budget, &e);
                return Err(e);
            }
        };

        self.registry().update(
            id,
            StatePatch {
                status: Some(ItemStatus::Completed),
                result: Some(artifact.clone()),
                attempt: Some(budget.attempts()),
                ..StatePatch::default()
            },
        );
        self.event_tx
            .send(Event::ItemCompleted {
                id: id.clone(),
                artifact: artifact.clone(),
            })
            .ok();
        tracing::info!(
            item_id = %id,
            page_url = %artifact.page_url,
            failed_attempts = budget.attempts(),
            "Item completed"
        );

        Ok(artifact)
    }

    /// Flip the item into its waiting state and narrate the scheduled retry
    fn notify_retry(&self, id: &ItemId, attempt: u32, delay: Duration, error: &Error) {
        self.registry().update(
            id,
            StatePatch::status(ItemStatus::Waiting).with_attempt(attempt),
        );
        self.event_tx
            .send(Event::RetryScheduled {
                id: id.clone(),
                attempt,
                max_retries: self.config.retry.max_retries,
                delay_ms: delay.as_millis() as u64,
                error: error.to_string(),
            })
            .ok();
    }

    /// Record a terminal failure on the item
    fn fail_item(&self, id: &ItemId, budget: &RetryBudget, error: &Error) {
        tracing::error!(
            item_id = %id,
            error = %error,
            failed_attempts = budget.attempts(),
            "Item failed"
        );
        self.registry().update(
            id,
            StatePatch {
                status: Some(ItemStatus::Failed),
                error: Some(error.to_string()),
                attempt: Some(budget.attempts()),
                ..StatePatch::default()
            },
        );
        self.event_tx
            .send(Event::ItemFailed {
                id: id.clone(),
                error: error.to_string(),
            })
            .ok();
    }
}
