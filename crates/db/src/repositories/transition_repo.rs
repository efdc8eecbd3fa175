//! Atomic checkout/return transitions for a single item.
//!
//! Every read that survives correlation lands here. Zone correction, loan
//! lookup, loan open/close and the location update run in one transaction
//! that holds the item's row lock, so Location and Loan can never be
//! observed out of step and two batches touching the same item serialize.

use serde::Serialize;
use sqlx::PgPool;
use stockroom_core::location::{decide_transition, Transition};
use stockroom_core::types::{DbId, Timestamp};

use crate::models::item::Item;
use crate::models::loan::Loan;
use crate::models::location::Location;
use crate::repositories::{ItemRepo, LoanRepo, LocationRepo};

/// What one applied transition changed.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionRecord {
    pub transition: Transition,
    /// The item after any zone correction.
    pub item: Item,
    /// The zone the item was recorded in before this read moved it.
    pub relocated_from: Option<DbId>,
    /// The opened (checkout) or closed (return) loan.
    pub loan: Loan,
    pub location: Location,
}

pub struct ItemTransitionRepo;

impl ItemTransitionRepo {
    /// Apply the checkout or return triggered by reading `item_id` in
    /// `zone_id` at `read_at`.
    ///
    /// `user_id` is the acting person's user, `None` for anonymous reads; it
    /// is only used on checkout. Returns `Ok(None)` when the item no longer
    /// exists.
    pub async fn apply(
        pool: &PgPool,
        item_id: DbId,
        zone_id: DbId,
        user_id: Option<DbId>,
        read_at: Timestamp,
    ) -> Result<Option<TransitionRecord>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(mut item) = ItemRepo::lock_by_id(&mut *tx, item_id).await? else {
            return Ok(None);
        };

        let mut relocated_from = None;
        if item.zone_id != zone_id {
            let previous = item.zone_id;
            match ItemRepo::update_zone(&mut *tx, item.id, zone_id).await? {
                Some(updated) => item = updated,
                None => return Ok(None),
            }
            relocated_from = Some(previous);
        }

        let active = LoanRepo::find_active_for_item(&mut *tx, item.id).await?;

        let (transition, loan, location) = match (decide_transition(active.is_some()), active) {
            (Transition::Return, Some(active)) => {
                let loan = LoanRepo::close(&mut *tx, active.id, read_at)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound)?;
                let location = LocationRepo::upsert_on_shelf(
                    &mut *tx,
                    item.id,
                    item.zone_id,
                    &item.shelf_label,
                    &item.position,
                )
                .await?;
                (Transition::Return, loan, location)
            }
            _ => {
                let loan = LoanRepo::create(&mut *tx, item.id, user_id, read_at).await?;
                let location =
                    LocationRepo::upsert_with_person(&mut *tx, item.id, user_id, read_at).await?;
                (Transition::Checkout, loan, location)
            }
        };

        tx.commit().await?;

        tracing::debug!(
            item_id = item.id,
            zone_id,
            transition = ?transition,
            loan_id = loan.id,
            "Item transition committed",
        );

        Ok(Some(TransitionRecord {
            transition,
            item,
            relocated_from,
            loan,
            location,
        }))
    }
}
