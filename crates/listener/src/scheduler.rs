//! Periodic sweep of expired zone batches.
//!
//! Runs on a fixed `tokio::time::interval` until cancelled. Each tick drains
//! every expired batch and correlates them concurrently, one task per zone,
//! then waits for all of them before the next tick. A batch that errors or
//! panics is logged and does not affect the others.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use stockroom_core::types::{DbId, Timestamp};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::accumulator::ZoneBatchAccumulator;
use crate::engine::{BatchError, CorrelationEngine, ItemOutcome};

/// Per-tick counts, mostly for tests and debug logging.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickSummary {
    pub drained: usize,
    pub processed: usize,
    pub rejected: usize,
    pub failed: usize,
}

pub struct ExpiryScheduler {
    accumulator: Arc<ZoneBatchAccumulator>,
    engine: Arc<CorrelationEngine>,
    interval: Duration,
}

impl ExpiryScheduler {
    pub fn new(
        accumulator: Arc<ZoneBatchAccumulator>,
        engine: Arc<CorrelationEngine>,
        interval: Duration,
    ) -> Self {
        Self {
            accumulator,
            engine,
            interval,
        }
    }

    /// Run the sweep loop until `cancel` is triggered.
    ///
    /// Batches still open at shutdown are discarded; their size is logged.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            "Expiry scheduler started"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let open_zones = self.accumulator.open_zones().await;
                    let pending = self.accumulator.pending_readings().await;
                    if pending > 0 {
                        tracing::warn!(
                            open_zones,
                            pending,
                            "Expiry scheduler stopping, discarding unexpired readings"
                        );
                    } else {
                        tracing::info!("Expiry scheduler stopping");
                    }
                    break;
                }
                _ = interval.tick() => {
                    let summary = self.tick(Utc::now()).await;
                    if summary.drained > 0 {
                        tracing::debug!(?summary, "Sweep complete");
                    }
                }
            }
        }
    }

    /// Drain everything expired at `now` and correlate it.
    pub async fn tick(&self, now: Timestamp) -> TickSummary {
        let batches = self.accumulator.sweep(now).await;
        let mut summary = TickSummary {
            drained: batches.len(),
            ..Default::default()
        };
        if batches.is_empty() {
            return summary;
        }

        let handles: Vec<(DbId, tokio::task::JoinHandle<_>)> = batches
            .into_iter()
            .map(|batch| {
                let engine = Arc::clone(&self.engine);
                let zone_id = batch.zone_id;
                let handle = tokio::spawn(async move { engine.process(&batch).await });
                (zone_id, handle)
            })
            .collect();

        let (zones, handles): (Vec<DbId>, Vec<_>) = handles.into_iter().unzip();
        let results = futures::future::join_all(handles).await;

        for (zone_id, result) in zones.into_iter().zip(results) {
            match result {
                Ok(Ok(report)) => {
                    summary.processed += 1;
                    tracing::info!(
                        zone_id,
                        person_tag = ?report.person_tag,
                        checked_out = report.count(|o| matches!(o, ItemOutcome::CheckedOut { .. })),
                        returned = report.count(|o| matches!(o, ItemOutcome::Returned { .. })),
                        unknown = report.count(|o| matches!(o, ItemOutcome::UnknownTag)),
                        failed = report.count(|o| matches!(o, ItemOutcome::Failed(_))),
                        "Batch processed",
                    );
                }
                Ok(Err(e @ (BatchError::MissingPerson { .. } | BatchError::UnknownZone { .. }))) => {
                    summary.rejected += 1;
                    tracing::error!(zone_id, error = %e, "Batch rejected");
                }
                Ok(Err(e)) => {
                    summary.failed += 1;
                    tracing::error!(zone_id, error = %e, "Batch processing failed");
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!(zone_id, error = %e, "Batch task panicked or was cancelled");
                }
            }
        }

        summary
    }
}
