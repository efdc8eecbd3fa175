//! Repository for the `locations` table.

use sqlx::PgExecutor;
use stockroom_core::location::{STATE_ON_SHELF, STATE_WITH_PERSON};
use stockroom_core::types::{DbId, Timestamp};

use crate::models::location::Location;

const COLUMNS: &str = "\
    id, item_id, state, zone_id, shelf_label, position, \
    person_user_id, taken_at, created_at, updated_at";

pub struct LocationRepo;

impl LocationRepo {
    pub async fn find_by_item<'e, E>(
        executor: E,
        item_id: DbId,
    ) -> Result<Option<Location>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM locations WHERE item_id = $1");
        sqlx::query_as::<_, Location>(&query)
            .bind(item_id)
            .fetch_optional(executor)
            .await
    }

    /// Put the item on its shelf, clearing holder fields.
    pub async fn upsert_on_shelf<'e, E>(
        executor: E,
        item_id: DbId,
        zone_id: DbId,
        shelf_label: &str,
        position: &str,
    ) -> Result<Location, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO locations (item_id, state, zone_id, shelf_label, position) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (item_id) DO UPDATE SET \
                state = EXCLUDED.state, \
                zone_id = EXCLUDED.zone_id, \
                shelf_label = EXCLUDED.shelf_label, \
                position = EXCLUDED.position, \
                person_user_id = NULL, \
                taken_at = NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Location>(&query)
            .bind(item_id)
            .bind(STATE_ON_SHELF)
            .bind(zone_id)
            .bind(shelf_label)
            .bind(position)
            .fetch_one(executor)
            .await
    }

    /// Hand the item to a person (or to nobody, for anonymous checkouts),
    /// clearing shelf fields.
    pub async fn upsert_with_person<'e, E>(
        executor: E,
        item_id: DbId,
        person_user_id: Option<DbId>,
        taken_at: Timestamp,
    ) -> Result<Location, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO locations (item_id, state, person_user_id, taken_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (item_id) DO UPDATE SET \
                state = EXCLUDED.state, \
                zone_id = NULL, \
                shelf_label = NULL, \
                position = NULL, \
                person_user_id = EXCLUDED.person_user_id, \
                taken_at = EXCLUDED.taken_at \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Location>(&query)
            .bind(item_id)
            .bind(STATE_WITH_PERSON)
            .bind(person_user_id)
            .bind(taken_at)
            .fetch_one(executor)
            .await
    }
}
