//! Domain types and pure logic for the RFID checkout tracker.
//!
//! This crate has zero internal dependencies so it can be shared by the
//! repository layer, the listener service, and any future tooling.

pub mod correlation;
pub mod decode;
pub mod error;
pub mod event_types;
pub mod location;
pub mod operation_mode;
pub mod reading;
pub mod types;
