//! Per-zone batching of tag reads with a debounced expiry window.
//!
//! Every read for a zone appends to that zone's open batch and pushes its
//! `last_seen` forward. A batch expires once no read has arrived for a full
//! window; [`ZoneBatchAccumulator::sweep`] then removes and returns it in one
//! step under the lock, so a read racing the sweep lands either in the
//! drained batch or in a fresh one, never in both or neither.

use std::collections::{BTreeMap, HashMap};

use chrono::Duration;
use stockroom_core::reading::{collapse_readings, Reading};
use stockroom_core::types::{DbId, Timestamp};
use tokio::sync::Mutex;

#[derive(Debug)]
struct ZoneBatch {
    readings: Vec<(String, Timestamp)>,
    last_seen: Timestamp,
}

/// A batch removed from the open set, ready for correlation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiredBatch {
    pub zone_id: DbId,
    /// Readings in arrival order, duplicates included.
    pub readings: Vec<(String, Timestamp)>,
    pub last_seen: Timestamp,
}

impl ExpiredBatch {
    /// `tag_id -> latest captured_at` for the batch.
    pub fn latest_by_tag(&self) -> BTreeMap<String, Timestamp> {
        collapse_readings(self.readings.iter().map(|(tag, ts)| (tag.as_str(), *ts)))
    }
}

/// Open batches for every zone currently receiving reads.
///
/// Shared between the ingest loop and the expiry scheduler via `Arc`.
pub struct ZoneBatchAccumulator {
    window: Duration,
    batches: Mutex<HashMap<DbId, ZoneBatch>>,
}

impl ZoneBatchAccumulator {
    pub fn new(window: std::time::Duration) -> Self {
        Self {
            window: Duration::from_std(window).unwrap_or(Duration::MAX),
            batches: Mutex::new(HashMap::new()),
        }
    }

    /// Append a read to its zone's batch, opening one if needed.
    ///
    /// `last_seen` always takes the new timestamp, even when it is earlier
    /// than the previous one.
    pub async fn add(&self, zone_id: DbId, tag_id: &str, captured_at: Timestamp) {
        let mut batches = self.batches.lock().await;
        let batch = batches.entry(zone_id).or_insert_with(|| ZoneBatch {
            readings: Vec::new(),
            last_seen: captured_at,
        });
        batch.readings.push((tag_id.to_string(), captured_at));
        batch.last_seen = captured_at;
    }

    pub async fn add_reading(&self, reading: &Reading) {
        self.add(reading.zone_id, &reading.tag_id, reading.captured_at)
            .await;
    }

    /// Remove and return every non-empty batch whose window has elapsed at
    /// `now`, ordered by zone.
    pub async fn sweep(&self, now: Timestamp) -> Vec<ExpiredBatch> {
        let mut batches = self.batches.lock().await;

        let mut expired: Vec<DbId> = batches
            .iter()
            .filter(|(_, b)| !b.readings.is_empty() && now - b.last_seen >= self.window)
            .map(|(zone_id, _)| *zone_id)
            .collect();
        expired.sort_unstable();

        expired
            .into_iter()
            .filter_map(|zone_id| {
                batches.remove(&zone_id).map(|b| ExpiredBatch {
                    zone_id,
                    readings: b.readings,
                    last_seen: b.last_seen,
                })
            })
            .collect()
    }

    pub async fn open_zones(&self) -> usize {
        self.batches.lock().await.len()
    }

    /// Readings buffered across all open batches.
    pub async fn pending_readings(&self) -> usize {
        self.batches
            .lock()
            .await
            .values()
            .map(|b| b.readings.len())
            .sum()
    }
}
