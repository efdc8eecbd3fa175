//! Repository for the `events` table.

use sqlx::PgExecutor;
use stockroom_core::types::{DbId, Timestamp};

use crate::models::event::StoredEvent;

const COLUMNS: &str = "\
    id, event_type, source_entity_type, source_entity_id, actor_user_id, \
    payload, occurred_at, created_at";

pub struct EventRepo;

impl EventRepo {
    /// Insert an event, returning its id.
    pub async fn insert<'e, E>(
        executor: E,
        event_type: &str,
        source_entity_type: Option<&str>,
        source_entity_id: Option<DbId>,
        actor_user_id: Option<DbId>,
        payload: &serde_json::Value,
        occurred_at: Timestamp,
    ) -> Result<DbId, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: (DbId,) = sqlx::query_as(
            "INSERT INTO events \
                (event_type, source_entity_type, source_entity_id, actor_user_id, payload, occurred_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id",
        )
        .bind(event_type)
        .bind(source_entity_type)
        .bind(source_entity_id)
        .bind(actor_user_id)
        .bind(payload)
        .bind(occurred_at)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }

    /// Most recent events of one type, newest first.
    pub async fn list_by_type<'e, E>(
        executor: E,
        event_type: &str,
        limit: i64,
    ) -> Result<Vec<StoredEvent>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE event_type = $1 \
             ORDER BY id DESC LIMIT $2"
        );
        sqlx::query_as::<_, StoredEvent>(&query)
            .bind(event_type)
            .bind(limit)
            .fetch_all(executor)
            .await
    }
}
