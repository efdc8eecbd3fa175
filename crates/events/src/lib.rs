//! Tracker event bus and persistence.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`TrackerEvent`]: the domain event envelope emitted by the
//!   correlation engine (checkouts, returns, relocations, rejected batches).
//! - [`EventPersistence`]: background service that durably writes every
//!   event to the `events` table.

pub mod bus;
pub mod persistence;

pub use bus::{EventBus, TrackerEvent};
pub use persistence::EventPersistence;
