//! Zone display alerts for batches dropped for lack of a person.
//!
//! Displays subscribe to `{prefix}/{zone_id}` and flash on any message.

use rumqttc::{AsyncClient, QoS};
use serde::Serialize;
use stockroom_core::event_types::{BATCH_REJECTED, REASON_MISSING_PERSON};
use stockroom_core::types::{DbId, Timestamp};
use stockroom_events::TrackerEvent;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayAlert {
    pub zone_id: DbId,
    pub reason: String,
    pub tags: Vec<String>,
    pub timestamp: Timestamp,
}

/// The topic and alert for `event`, if it warrants one.
pub fn alert_for(event: &TrackerEvent, topic_prefix: &str) -> Option<(String, DisplayAlert)> {
    if event.event_type != BATCH_REJECTED {
        return None;
    }
    let reason = event.payload_str("reason")?;
    if reason != REASON_MISSING_PERSON {
        return None;
    }
    let zone_id = event.payload.get("zone_id")?.as_i64()?;
    let tags = event
        .payload
        .get("tags")
        .and_then(|t| t.as_array())
        .map(|tags| {
            tags.iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Some((
        format!("{topic_prefix}/{zone_id}"),
        DisplayAlert {
            zone_id,
            reason: reason.to_string(),
            tags,
            timestamp: event.occurred_at,
        },
    ))
}

/// Forwards qualifying bus events to the displays until the bus closes.
pub struct AlertForwarder {
    client: AsyncClient,
    topic_prefix: String,
}

impl AlertForwarder {
    pub fn new(client: AsyncClient, topic_prefix: impl Into<String>) -> Self {
        Self {
            client,
            topic_prefix: topic_prefix.into(),
        }
    }

    pub async fn run(self, mut receiver: broadcast::Receiver<TrackerEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let Some((topic, alert)) = alert_for(&event, &self.topic_prefix) else {
                        continue;
                    };
                    let payload = match serde_json::to_vec(&alert) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize display alert");
                            continue;
                        }
                    };
                    match self
                        .client
                        .publish(topic.as_str(), QoS::AtLeastOnce, false, payload)
                        .await
                    {
                        Ok(()) => tracing::info!(topic = %topic, "Display alert published"),
                        Err(e) => {
                            tracing::warn!(topic = %topic, error = %e, "Failed to publish display alert")
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Alert forwarder lagged, some alerts were lost");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, alert forwarder shutting down");
                    break;
                }
            }
        }
    }
}
