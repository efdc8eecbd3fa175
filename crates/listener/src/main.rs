//! `stockroom-listener` -- RFID reader ingestion daemon.
//!
//! Subscribes to reader messages over MQTT, batches tag reads per zone and
//! turns every expired batch into checkout/return transitions in
//! PostgreSQL. Configuration comes from the environment (see
//! [`ListenerConfig::from_env`]); `--batch-time` and `--sweep-interval-ms`
//! override the timing knobs.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use stockroom_events::{EventBus, EventPersistence};
use stockroom_listener::accumulator::ZoneBatchAccumulator;
use stockroom_listener::alerts::AlertForwarder;
use stockroom_listener::cache::{LastReadingCache, RedisReadingCache};
use stockroom_listener::config::ListenerConfig;
use stockroom_listener::engine::CorrelationEngine;
use stockroom_listener::ingest::{Ingest, CHANNEL_CAPACITY};
use stockroom_listener::scheduler::ExpiryScheduler;
use stockroom_listener::store::{PgStateStore, StateStore};
use stockroom_listener::transport::MqttTransport;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long each task gets to finish after shutdown is requested.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "stockroom-listener", about = "RFID checkout tracker listener")]
struct Cli {
    /// Batch window in seconds (overrides BATCH_WINDOW_MS).
    #[arg(long = "batch-time")]
    batch_time: Option<f64>,

    /// Scheduler tick in milliseconds (overrides SWEEP_INTERVAL_MS).
    #[arg(long = "sweep-interval-ms")]
    sweep_interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "stockroom_listener=info,stockroom_db=info,stockroom_events=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = ListenerConfig::from_env()
        .and_then(|c| c.with_overrides(cli.batch_time, cli.sweep_interval_ms))
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        });

    tracing::info!(
        mqtt_host = %config.mqtt.host,
        mqtt_port = config.mqtt.port,
        topic = %config.mqtt.topic,
        batch_window_ms = config.batch_window.as_millis() as u64,
        sweep_interval_ms = config.sweep_interval.as_millis() as u64,
        default_mode = %config.default_mode,
        local_tz = %config.local_tz,
        "Starting stockroom-listener",
    );

    // --- Database ---
    let pool = stockroom_db::create_pool(&config.database_url)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to connect to database");
            std::process::exit(1);
        });
    if let Err(e) = stockroom_db::health_check(&pool).await {
        tracing::error!(error = %e, "Database health check failed");
        std::process::exit(1);
    }
    if let Err(e) = stockroom_db::run_migrations(&pool).await {
        tracing::error!(error = %e, "Failed to run migrations");
        std::process::exit(1);
    }
    tracing::info!("Database ready");

    // --- Last-reading cache (optional) ---
    let cache: Option<Arc<dyn LastReadingCache>> = match &config.redis_url {
        Some(url) => match RedisReadingCache::connect(url, config.cache_ttl.as_secs()).await {
            Ok(cache) => {
                tracing::info!("Last-reading cache enabled");
                Some(Arc::new(cache))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Last-reading cache unavailable, continuing without it");
                None
            }
        },
        None => None,
    };

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let persistence_handle = tokio::spawn(EventPersistence::run(pool.clone(), event_bus.subscribe()));

    // --- Transport ---
    let transport = MqttTransport::new(&config.mqtt);
    let alerts = AlertForwarder::new(transport.client(), config.mqtt.alert_topic_prefix.clone());
    let alerts_handle = tokio::spawn(alerts.run(event_bus.subscribe()));

    // --- Batching and correlation ---
    let accumulator = Arc::new(ZoneBatchAccumulator::new(config.batch_window));
    let store: Arc<dyn StateStore> = Arc::new(PgStateStore::new(pool.clone()));
    let engine = Arc::new(CorrelationEngine::new(
        Arc::clone(&store),
        config.default_mode,
        Arc::clone(&event_bus),
    ));

    let cancel = CancellationToken::new();
    let (tx, rx) = tokio::sync::mpsc::channel(CHANNEL_CAPACITY);

    let scheduler = ExpiryScheduler::new(Arc::clone(&accumulator), engine, config.sweep_interval);
    let scheduler_handle = tokio::spawn(scheduler.run(cancel.clone()));

    let ingest = Ingest::new(Arc::clone(&accumulator), cache, store, config.local_tz);
    let ingest_handle = tokio::spawn(ingest.run(rx, cancel.clone()));

    let transport_handle = tokio::spawn(transport.run(tx, cancel.clone()));

    tracing::info!("Listener running");

    shutdown_signal().await;

    // --- Shutdown ---
    cancel.cancel();
    let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, transport_handle).await;
    let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, ingest_handle).await;
    // The scheduler finishes any in-flight tick before it observes the cancel.
    let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, scheduler_handle).await;
    tracing::info!("Ingestion stopped");

    // Dropping the last sender closes the broadcast channel, which stops
    // persistence and the alert forwarder.
    drop(event_bus);
    let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, persistence_handle).await;
    let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, alerts_handle).await;
    tracing::info!("Event services shut down");

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
