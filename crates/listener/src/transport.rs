//! MQTT subscriber that feeds raw reader messages into the ingest channel.
//!
//! The broker connection is driven by polling the rumqttc event loop. When
//! polling fails the loop backs off exponentially before polling again
//! (which reconnects), and resubscribes on every fresh `ConnAck`.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::MqttConfig;
use crate::ingest::RawMessage;

/// Capacity of rumqttc's outgoing request queue.
const REQUEST_QUEUE_CAPACITY: usize = 64;

const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay, clamped to `max_delay`.
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

pub struct MqttTransport {
    client: AsyncClient,
    eventloop: EventLoop,
    topic: String,
    backoff: ReconnectConfig,
}

impl MqttTransport {
    pub fn new(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(KEEP_ALIVE);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);
        Self {
            client,
            eventloop,
            topic: config.topic.clone(),
            backoff: ReconnectConfig::default(),
        }
    }

    /// A publishing handle on the same connection.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Poll the broker until `cancel` fires or the ingest side goes away.
    pub async fn run(mut self, tx: mpsc::Sender<RawMessage>, cancel: CancellationToken) {
        let mut delay = self.backoff.initial_delay;
        let mut attempt = 0u32;

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!(topic = %self.topic, "Connected to MQTT broker, subscribing");
                    delay = self.backoff.initial_delay;
                    attempt = 0;
                    // Non-blocking: the request is flushed by the next poll.
                    if let Err(e) = self.client.try_subscribe(&self.topic, QoS::AtLeastOnce) {
                        tracing::error!(topic = %self.topic, error = %e, "Failed to subscribe");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = RawMessage {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    };
                    if tx.send(message).await.is_err() {
                        tracing::info!("Ingest channel closed, transport stopping");
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "MQTT connection error, reconnecting",
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    delay = next_delay(delay, &self.backoff);
                }
            }
        }

        if let Err(e) = self.client.try_disconnect() {
            tracing::debug!(error = %e, "MQTT disconnect request not queued");
        }
        tracing::info!("MQTT transport stopped");
    }
}
