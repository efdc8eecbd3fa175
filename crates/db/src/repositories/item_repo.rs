//! Repository for the `items` table.

use sqlx::{PgExecutor, PgPool};
use stockroom_core::types::DbId;

use crate::models::item::{CreateItem, Item};
use crate::repositories::LocationRepo;

const COLUMNS: &str = "\
    id, tag_id, name, zone_id, shelf_label, position, serial_number, \
    quantity, description, created_at, updated_at";

pub struct ItemRepo;

impl ItemRepo {
    // ── Queries ──────────────────────────────────────────────────────

    pub async fn find_by_id<'e, E>(executor: E, id: DbId) -> Result<Option<Item>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM items WHERE id = $1");
        sqlx::query_as::<_, Item>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find the item carrying `tag_id`, if any.
    pub async fn find_by_tag<'e, E>(executor: E, tag_id: &str) -> Result<Option<Item>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM items WHERE tag_id = $1");
        sqlx::query_as::<_, Item>(&query)
            .bind(tag_id)
            .fetch_optional(executor)
            .await
    }

    /// Load an item and hold its row lock until the surrounding transaction
    /// ends. Concurrent transitions for the same item queue up here.
    pub async fn lock_by_id<'e, E>(executor: E, id: DbId) -> Result<Option<Item>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM items WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Item>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Create an item together with its initial ON_SHELF location.
    pub async fn create(pool: &PgPool, input: &CreateItem) -> Result<Item, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO items \
                (tag_id, name, zone_id, shelf_label, position, serial_number, quantity, description) \
             VALUES ($1, $2, $3, COALESCE($4, ''), COALESCE($5, ''), COALESCE($6, ''), \
                     COALESCE($7, 1), COALESCE($8, '')) \
             RETURNING {COLUMNS}"
        );
        let item = sqlx::query_as::<_, Item>(&query)
            .bind(&input.tag_id)
            .bind(&input.name)
            .bind(input.zone_id)
            .bind(&input.shelf_label)
            .bind(&input.position)
            .bind(&input.serial_number)
            .bind(input.quantity)
            .bind(&input.description)
            .fetch_one(&mut *tx)
            .await?;

        LocationRepo::upsert_on_shelf(
            &mut *tx,
            item.id,
            item.zone_id,
            &item.shelf_label,
            &item.position,
        )
        .await?;

        tx.commit().await?;
        Ok(item)
    }

    /// Move an item to another zone, returning the updated row.
    pub async fn update_zone<'e, E>(
        executor: E,
        id: DbId,
        zone_id: DbId,
    ) -> Result<Option<Item>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("UPDATE items SET zone_id = $2 WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Item>(&query)
            .bind(id)
            .bind(zone_id)
            .fetch_optional(executor)
            .await
    }
}
