//! Well-known tracker event names.
//!
//! These are the values stored in `events.event_type` and carried by
//! `TrackerEvent::event_type` on the in-process bus.

/// An item left its shelf and a loan was opened.
pub const ITEM_CHECKED_OUT: &str = "item.checked_out";

/// An item came back to its shelf and its loan was closed.
pub const ITEM_RETURNED: &str = "item.returned";

/// An item was read in a zone other than its recorded one and was moved.
pub const ITEM_RELOCATED: &str = "item.relocated";

/// A drained batch was dropped without touching any item.
pub const BATCH_REJECTED: &str = "batch.rejected";

/// `batch.rejected` reason: items read with no person in a zone that
/// requires one.
pub const REASON_MISSING_PERSON: &str = "missing_person";

/// `batch.rejected` reason: the batch's zone does not exist.
pub const REASON_UNKNOWN_ZONE: &str = "unknown_zone";

/// Source entity kinds attached to events.
pub const ENTITY_ITEM: &str = "item";
pub const ENTITY_ZONE: &str = "zone";
