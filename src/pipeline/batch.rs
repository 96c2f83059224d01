//! Batch loop — sequential item processing with inter-item pacing.

use std::sync::atomic::Ordering;

use chrono::Utc;

use super::PipelineDriver;
use crate::error::Error;
use crate::types::{BatchReport, CandidateItem, Event};

impl PipelineDriver {
    /// Run a batch of items through the pipeline, strictly in order.
    ///
    /// Before every item except the first, the driver runs the inter-item
    /// pacing countdown. A per-item failure is recorded and tallied, never
    /// propagated — the report is delivered only after the full list is
    /// exhausted. An empty batch performs no stage calls and reports zero
    /// counts.
    ///
    /// Cancellation is observed at pacing boundaries: the in-flight item is
    /// abandoned, unstarted items remain pending, and the loop stops.
    pub async fn run_batch(&self, items: Vec<CandidateItem>) -> BatchReport {
        let started_at = Utc::now();
        self.running.store(true, Ordering::SeqCst);
        self.registry()
            .initialize(items.iter().map(|item| item.id.clone()));

        tracing::info!(total = items.len(), "Batch started");
        self.event_tx
            .send(Event::BatchStarted { total: items.len() })
            .ok();

        let mut succeeded = Vec::new();
        let mut failure_count = 0usize;
        let mut cancelled = false;

        for (position, item) in items.iter().enumerate() {
            if position > 0 {
                self.pacer
                    .wait(self.config.pacing.inter_item_delay)
                    .await;
            }
            if self.cancel_token.is_cancelled() {
                cancelled = true;
                break;
            }

            self.event_tx
                .send(Event::ItemStarted {
                    id: item.id.clone(),
                    position,
                })
                .ok();

            match self.run_item(item).await {
                Ok(_artifact) => succeeded.push(item.id.clone()),
                Err(Error::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(_recorded) => {
                    // Already recorded on the item by run_item; keep going
                    failure_count += 1;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);

        let success_count = succeeded.len();
        if cancelled {
            tracing::warn!(
                success_count,
                failure_count,
                "Batch cancelled before completion"
            );
            self.event_tx.send(Event::BatchCancelled).ok();
        } else {
            tracing::info!(success_count, failure_count, "Batch completed");
            self.event_tx
                .send(Event::BatchCompleted {
                    success_count,
                    failure_count,
                })
                .ok();
        }

        BatchReport {
            succeeded,
            success_count,
            failure_count,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
