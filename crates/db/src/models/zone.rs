//! Zone (room/area with its own reader) model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stockroom_core::error::CoreError;
use stockroom_core::operation_mode::OperationMode;
use stockroom_core::types::{DbId, Timestamp};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Zone {
    pub id: DbId,
    pub name: String,
    pub code: String,
    /// `None` means the listener's configured default applies.
    pub operation_mode: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Zone {
    /// The effective operation mode for batches drained in this zone.
    pub fn effective_mode(&self, default: OperationMode) -> Result<OperationMode, CoreError> {
        OperationMode::resolve(self.operation_mode.as_deref(), default)
    }
}

/// DTO for creating a zone.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateZone {
    pub name: String,
    pub code: String,
    pub operation_mode: Option<OperationMode>,
}
