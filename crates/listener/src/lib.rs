//! `stockroom-listener` library crate.
//!
//! Turns raw RFID tag reads into checkout/return transitions. The binary
//! entrypoint lives in `main.rs`; the modules are exposed for integration
//! testing.
//!
//! - [`transport`] subscribes to the reader topic and forwards raw messages.
//! - [`ingest`] decodes them into the [`accumulator`] and the [`cache`].
//! - [`scheduler`] drains expired batches into the [`engine`].
//! - [`alerts`] pushes rejected batches back out to zone displays.

pub mod accumulator;
pub mod alerts;
pub mod cache;
pub mod config;
pub mod engine;
pub mod ingest;
pub mod scheduler;
pub mod store;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
