//! Repository for the `loans` table.

use sqlx::PgExecutor;
use stockroom_core::types::{DbId, Timestamp};

use crate::models::loan::Loan;

const COLUMNS: &str = "id, item_id, user_id, taken_at, returned_at, created_at";

pub struct LoanRepo;

impl LoanRepo {
    /// The item's active loan (no `returned_at`), if any.
    pub async fn find_active_for_item<'e, E>(
        executor: E,
        item_id: DbId,
    ) -> Result<Option<Loan>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM loans \
             WHERE item_id = $1 AND returned_at IS NULL \
             ORDER BY taken_at DESC, id DESC LIMIT 1"
        );
        sqlx::query_as::<_, Loan>(&query)
            .bind(item_id)
            .fetch_optional(executor)
            .await
    }

    /// All loans for an item, newest first.
    pub async fn list_for_item<'e, E>(executor: E, item_id: DbId) -> Result<Vec<Loan>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM loans WHERE item_id = $1 ORDER BY id DESC"
        );
        sqlx::query_as::<_, Loan>(&query)
            .bind(item_id)
            .fetch_all(executor)
            .await
    }

    /// Open a loan. Fails with a unique violation if the item already has
    /// an active one.
    pub async fn create<'e, E>(
        executor: E,
        item_id: DbId,
        user_id: Option<DbId>,
        taken_at: Timestamp,
    ) -> Result<Loan, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO loans (item_id, user_id, taken_at) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Loan>(&query)
            .bind(item_id)
            .bind(user_id)
            .bind(taken_at)
            .fetch_one(executor)
            .await
    }

    /// Close an active loan. Returns `None` when the loan does not exist or
    /// was already closed, so `returned_at` is only ever written once.
    pub async fn close<'e, E>(
        executor: E,
        loan_id: DbId,
        returned_at: Timestamp,
    ) -> Result<Option<Loan>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE loans SET returned_at = $2 \
             WHERE id = $1 AND returned_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Loan>(&query)
            .bind(loan_id)
            .bind(returned_at)
            .fetch_optional(executor)
            .await
    }
}
