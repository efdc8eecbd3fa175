//! Item (tagged physical asset) model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use stockroom_core::types::{DbId, Timestamp};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Item {
    pub id: DbId,
    pub tag_id: String,
    pub name: String,
    /// Current/home zone. Corrected when the item is read elsewhere.
    pub zone_id: DbId,
    pub shelf_label: String,
    pub position: String,
    pub serial_number: String,
    pub quantity: f64,
    pub description: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating an item.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateItem {
    pub tag_id: String,
    pub name: String,
    pub zone_id: DbId,
    pub shelf_label: Option<String>,
    pub position: Option<String>,
    pub serial_number: Option<String>,
    pub quantity: Option<f64>,
    pub description: Option<String>,
}
