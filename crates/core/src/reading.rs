//! Tag readings and per-batch de-duplication.
//!
//! A [`Reading`] is one timestamped observation of a tag in a zone. It only
//! lives inside an open batch and is never persisted on its own.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{DbId, Timestamp};

/// One decoded tag observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reading {
    pub tag_id: String,
    pub zone_id: DbId,
    pub captured_at: Timestamp,
}

impl Reading {
    pub fn new(tag_id: impl Into<String>, zone_id: DbId, captured_at: Timestamp) -> Self {
        Self {
            tag_id: tag_id.into(),
            zone_id,
            captured_at,
        }
    }
}

/// Collapse a batch's readings into `tag_id -> latest captured_at`.
///
/// Repeated reads of the same tag keep only the greatest timestamp, whatever
/// order they arrived in. The map is ordered by tag, which gives every
/// downstream scan a deterministic traversal order.
pub fn collapse_readings<'a, I>(readings: I) -> BTreeMap<String, Timestamp>
where
    I: IntoIterator<Item = (&'a str, Timestamp)>,
{
    let mut latest: BTreeMap<String, Timestamp> = BTreeMap::new();
    for (tag_id, captured_at) in readings {
        latest
            .entry(tag_id.to_string())
            .and_modify(|seen| {
                if captured_at > *seen {
                    *seen = captured_at;
                }
            })
            .or_insert(captured_at);
    }
    latest
}
