//! Repository for the `persons` table.

use sqlx::PgExecutor;

use crate::models::person::{CreatePerson, Person};

const COLUMNS: &str = "id, user_id, tag_id, created_at, updated_at";

pub struct PersonRepo;

impl PersonRepo {
    /// Find the person carrying `tag_id`, if any.
    pub async fn find_by_tag<'e, E>(executor: E, tag_id: &str) -> Result<Option<Person>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM persons WHERE tag_id = $1");
        sqlx::query_as::<_, Person>(&query)
            .bind(tag_id)
            .fetch_optional(executor)
            .await
    }

    pub async fn create<'e, E>(executor: E, input: &CreatePerson) -> Result<Person, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO persons (user_id, tag_id) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Person>(&query)
            .bind(input.user_id)
            .bind(&input.tag_id)
            .fetch_one(executor)
            .await
    }
}
