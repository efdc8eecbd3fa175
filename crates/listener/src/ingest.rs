//! Inbound message loop: decode, batch, cache.
//!
//! The transport pushes [`RawMessage`]s into an mpsc channel; this loop is
//! the single consumer, so decoding and accumulation are serialized.

use std::sync::Arc;

use chrono_tz::Tz;
use stockroom_core::decode::{decode_reading, DecodeError};
use stockroom_core::reading::Reading;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::accumulator::ZoneBatchAccumulator;
use crate::cache::LastReadingCache;
use crate::store::StateStore;

/// Capacity of the transport -> ingest channel.
pub const CHANNEL_CAPACITY: usize = 1024;

/// A message as received from the broker.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

pub struct Ingest {
    accumulator: Arc<ZoneBatchAccumulator>,
    cache: Option<Arc<dyn LastReadingCache>>,
    store: Arc<dyn StateStore>,
    local_tz: Tz,
}

impl Ingest {
    pub fn new(
        accumulator: Arc<ZoneBatchAccumulator>,
        cache: Option<Arc<dyn LastReadingCache>>,
        store: Arc<dyn StateStore>,
        local_tz: Tz,
    ) -> Self {
        Self {
            accumulator,
            cache,
            store,
            local_tz,
        }
    }

    /// Decode one message and add it to its zone's batch.
    ///
    /// Only readings from known zones reach the cache. Cache failures are
    /// logged and never reject the reading; unknown zones are rejected later
    /// by the engine.
    pub async fn handle(&self, message: &RawMessage) -> Result<Reading, DecodeError> {
        let reading = decode_reading(&message.payload, self.local_tz)?;

        self.accumulator.add_reading(&reading).await;

        if let Some(cache) = &self.cache {
            self.cache_if_known_zone(cache.as_ref(), &reading).await;
        }

        tracing::debug!(
            zone_id = reading.zone_id,
            tag_id = %reading.tag_id,
            captured_at = %reading.captured_at,
            "Reading accepted",
        );
        Ok(reading)
    }

    async fn cache_if_known_zone(&self, cache: &dyn LastReadingCache, reading: &Reading) {
        match self.store.find_zone(reading.zone_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::warn!(zone_id = reading.zone_id, "Reading for unknown zone, not cached");
                return;
            }
            Err(e) => {
                tracing::warn!(zone_id = reading.zone_id, error = %e, "Zone lookup failed, not cached");
                return;
            }
        }
        if let Err(e) = cache.set(reading).await {
            tracing::warn!(
                zone_id = reading.zone_id,
                tag_id = %reading.tag_id,
                error = %e,
                "Failed to cache last reading",
            );
        }
    }

    /// Consume messages until the channel closes or `cancel` fires.
    pub async fn run(self, mut rx: mpsc::Receiver<RawMessage>, cancel: CancellationToken) {
        tracing::info!("Ingest loop started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Ingest loop stopping");
                    break;
                }
                message = rx.recv() => {
                    let Some(message) = message else {
                        tracing::info!("Transport channel closed, ingest loop stopping");
                        break;
                    };
                    if let Err(e) = self.handle(&message).await {
                        tracing::warn!(
                            topic = %message.topic,
                            error = %e,
                            "Dropping undecodable message",
                        );
                    }
                }
            }
        }
    }
}
