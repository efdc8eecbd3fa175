//! Repository for the `users` table.

use sqlx::PgExecutor;

use crate::models::user::User;

const COLUMNS: &str = "id, username, created_at, updated_at";

pub struct UserRepo;

impl UserRepo {
    /// Insert a user, returning the created row.
    pub async fn create<'e, E>(executor: E, username: &str) -> Result<User, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("INSERT INTO users (username) VALUES ($1) RETURNING {COLUMNS}");
        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_one(executor)
            .await
    }
}
