//! Loan model: append-only audit of checkouts.

use serde::Serialize;
use sqlx::FromRow;
use stockroom_core::types::{DbId, Timestamp};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Loan {
    pub id: DbId,
    pub item_id: DbId,
    /// `None` for anonymous checkouts.
    pub user_id: Option<DbId>,
    pub taken_at: Timestamp,
    /// Set exactly once, when the item is returned.
    pub returned_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }
}
