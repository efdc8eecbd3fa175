//! Repository for the `zones` table.

use sqlx::PgExecutor;
use stockroom_core::types::DbId;

use crate::models::zone::{CreateZone, Zone};

const COLUMNS: &str = "id, name, code, operation_mode, created_at, updated_at";

pub struct ZoneRepo;

impl ZoneRepo {
    pub async fn find_by_id<'e, E>(executor: E, id: DbId) -> Result<Option<Zone>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM zones WHERE id = $1");
        sqlx::query_as::<_, Zone>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn create<'e, E>(executor: E, input: &CreateZone) -> Result<Zone, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO zones (name, code, operation_mode) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Zone>(&query)
            .bind(&input.name)
            .bind(&input.code)
            .bind(input.operation_mode.map(|m| m.as_str()))
            .fetch_one(executor)
            .await
    }
}
