//! Location model: where an item is right now.

use serde::Serialize;
use sqlx::FromRow;
use stockroom_core::error::CoreError;
use stockroom_core::location::LocationState;
use stockroom_core::types::{DbId, Timestamp};

/// One row per item. ON_SHELF rows carry zone/shelf/position; WITH_PERSON
/// rows carry the holder and `taken_at`. The table's CHECK constraint keeps
/// the two groups exclusive.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Location {
    pub id: DbId,
    pub item_id: DbId,
    pub state: String,
    pub zone_id: Option<DbId>,
    pub shelf_label: Option<String>,
    pub position: Option<String>,
    pub person_user_id: Option<DbId>,
    pub taken_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Location {
    pub fn state(&self) -> Result<LocationState, CoreError> {
        LocationState::parse(&self.state)
    }
}
