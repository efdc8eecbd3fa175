//! State store seam used by the correlation engine.
//!
//! [`StateStore`] is the narrow set of lookups and the one transactional
//! write the engine needs. [`PgStateStore`] backs it with the repositories
//! in `stockroom-db`.

use async_trait::async_trait;
use stockroom_core::types::{DbId, Timestamp};
use stockroom_db::models::item::Item;
use stockroom_db::models::person::Person;
use stockroom_db::models::zone::Zone;
use stockroom_db::repositories::{
    ItemRepo, ItemTransitionRepo, PersonRepo, TransitionRecord, ZoneRepo,
};
use stockroom_db::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn find_zone(&self, zone_id: DbId) -> Result<Option<Zone>, StoreError>;

    async fn find_person_by_tag(&self, tag_id: &str) -> Result<Option<Person>, StoreError>;

    async fn find_item_by_tag(&self, tag_id: &str) -> Result<Option<Item>, StoreError>;

    /// Relocate (if needed) and check out or return one item, atomically.
    ///
    /// `Ok(None)` means the item disappeared before it could be locked.
    async fn apply_transition(
        &self,
        item_id: DbId,
        zone_id: DbId,
        user_id: Option<DbId>,
        read_at: Timestamp,
    ) -> Result<Option<TransitionRecord>, StoreError>;
}

/// PostgreSQL-backed [`StateStore`].
#[derive(Clone)]
pub struct PgStateStore {
    pool: DbPool,
}

impl PgStateStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn find_zone(&self, zone_id: DbId) -> Result<Option<Zone>, StoreError> {
        Ok(ZoneRepo::find_by_id(&self.pool, zone_id).await?)
    }

    async fn find_person_by_tag(&self, tag_id: &str) -> Result<Option<Person>, StoreError> {
        Ok(PersonRepo::find_by_tag(&self.pool, tag_id).await?)
    }

    async fn find_item_by_tag(&self, tag_id: &str) -> Result<Option<Item>, StoreError> {
        Ok(ItemRepo::find_by_tag(&self.pool, tag_id).await?)
    }

    async fn apply_transition(
        &self,
        item_id: DbId,
        zone_id: DbId,
        user_id: Option<DbId>,
        read_at: Timestamp,
    ) -> Result<Option<TransitionRecord>, StoreError> {
        Ok(ItemTransitionRepo::apply(&self.pool, item_id, zone_id, user_id, read_at).await?)
    }
}
