//! End-to-end correlation scenarios against PostgreSQL.
//!
//! Readings go through the accumulator and the expiry scheduler into the
//! engine backed by `PgStateStore`, and the resulting loans, locations and
//! persisted events are checked in the database.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use sqlx::PgPool;
use stockroom_core::event_types::{BATCH_REJECTED, ITEM_CHECKED_OUT, ITEM_RETURNED};
use stockroom_core::location::LocationState;
use stockroom_core::operation_mode::OperationMode;
use stockroom_core::types::{DbId, Timestamp};
use stockroom_db::models::item::CreateItem;
use stockroom_db::models::person::CreatePerson;
use stockroom_db::models::zone::CreateZone;
use stockroom_db::repositories::{
    EventRepo, ItemRepo, LoanRepo, LocationRepo, PersonRepo, UserRepo, ZoneRepo,
};
use stockroom_events::{EventBus, EventPersistence};
use stockroom_listener::accumulator::ZoneBatchAccumulator;
use stockroom_listener::engine::{BatchError, CorrelationEngine, ItemOutcome};
use stockroom_listener::scheduler::ExpiryScheduler;
use stockroom_listener::store::PgStateStore;

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

fn at(millis: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2025, 10, 7, 10, 30, 0).unwrap() + chrono::Duration::milliseconds(millis)
}

struct Fixture {
    pool: PgPool,
    accumulator: Arc<ZoneBatchAccumulator>,
    engine: Arc<CorrelationEngine>,
    scheduler: ExpiryScheduler,
}

impl Fixture {
    fn new(pool: &PgPool, default_mode: OperationMode) -> Self {
        let accumulator = Arc::new(ZoneBatchAccumulator::new(Duration::from_secs(3)));
        let engine = Arc::new(CorrelationEngine::new(
            Arc::new(PgStateStore::new(pool.clone())),
            default_mode,
            Arc::new(EventBus::default()),
        ));
        let scheduler = ExpiryScheduler::new(
            accumulator.clone(),
            engine.clone(),
            Duration::from_millis(250),
        );
        Self {
            pool: pool.clone(),
            accumulator,
            engine,
            scheduler,
        }
    }

    async fn zone(&self, code: &str, mode: Option<OperationMode>) -> DbId {
        ZoneRepo::create(
            &self.pool,
            &CreateZone {
                name: format!("Room {code}"),
                code: code.into(),
                operation_mode: mode,
            },
        )
        .await
        .unwrap()
        .id
    }

    /// Returns the user id of the new person.
    async fn person(&self, username: &str, tag: &str) -> DbId {
        let user = UserRepo::create(&self.pool, username).await.unwrap();
        PersonRepo::create(
            &self.pool,
            &CreatePerson {
                user_id: user.id,
                tag_id: Some(tag.into()),
            },
        )
        .await
        .unwrap();
        user.id
    }

    async fn item(&self, tag: &str, zone_id: DbId) -> DbId {
        ItemRepo::create(
            &self.pool,
            &CreateItem {
                tag_id: tag.into(),
                name: format!("Item {tag}"),
                zone_id,
                shelf_label: Some("Shelf 2".into()),
                position: Some("B".into()),
                serial_number: None,
                quantity: Some(1.0),
                description: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn read(&self, zone_id: DbId, reads: &[(&str, i64)]) {
        for (tag, millis) in reads {
            self.accumulator.add(zone_id, tag, at(*millis)).await;
        }
    }

    async fn state(&self, item_id: DbId) -> LocationState {
        LocationRepo::find_by_item(&self.pool, item_id)
            .await
            .unwrap()
            .unwrap()
            .state()
            .unwrap()
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn burst_checks_out_items_to_person(pool: PgPool) {
    let fx = Fixture::new(&pool, OperationMode::RequirePerson);
    let z1 = fx.zone("Z1", None).await;
    let p = fx.person("ana", "P").await;
    let a = fx.item("A", z1).await;
    let b = fx.item("B", z1).await;

    fx.read(z1, &[("P", 0), ("A", 500), ("B", 1_000)]).await;
    assert_eq!(fx.scheduler.tick(at(3_500)).await.drained, 0);
    let summary = fx.scheduler.tick(at(4_000)).await;
    assert_eq!(summary.processed, 1);

    for item_id in [a, b] {
        let loan = LoanRepo::find_active_for_item(&pool, item_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loan.user_id, Some(p));
        assert_eq!(fx.state(item_id).await, LocationState::WithPerson);
    }
    let loan_a = LoanRepo::find_active_for_item(&pool, a).await.unwrap().unwrap();
    assert_eq!(loan_a.taken_at, at(500));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn second_pass_returns_item_and_restores_shelf(pool: PgPool) {
    let fx = Fixture::new(&pool, OperationMode::RequirePerson);
    let z1 = fx.zone("Z1", None).await;
    fx.person("ana", "P").await;
    let a = fx.item("A", z1).await;

    fx.read(z1, &[("P", 0), ("A", 0)]).await;
    fx.scheduler.tick(at(3_000)).await;
    let loan = LoanRepo::find_active_for_item(&pool, a).await.unwrap().unwrap();

    fx.read(z1, &[("P", 60_000), ("A", 60_200)]).await;
    fx.scheduler.tick(at(63_200)).await;

    assert!(LoanRepo::find_active_for_item(&pool, a).await.unwrap().is_none());
    let loans = LoanRepo::list_for_item(&pool, a).await.unwrap();
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0].id, loan.id);
    assert_eq!(loans[0].returned_at, Some(at(60_200)));

    let location = LocationRepo::find_by_item(&pool, a).await.unwrap().unwrap();
    assert_eq!(location.state().unwrap(), LocationState::OnShelf);
    assert_eq!(location.zone_id, Some(z1));
    assert_eq!(location.shelf_label.as_deref(), Some("Shelf 2"));
    assert_eq!(location.position.as_deref(), Some("B"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn require_person_drops_items_without_person(pool: PgPool) {
    let fx = Fixture::new(&pool, OperationMode::AllowAnonymous);
    let z1 = fx.zone("Z1", Some(OperationMode::RequirePerson)).await;
    let a = fx.item("A", z1).await;

    fx.read(z1, &[("A", 0)]).await;
    let summary = fx.scheduler.tick(at(3_000)).await;

    assert_eq!(summary.rejected, 1);
    assert_eq!(fx.state(a).await, LocationState::OnShelf);
    assert!(LoanRepo::list_for_item(&pool, a).await.unwrap().is_empty());
    assert_eq!(fx.accumulator.open_zones().await, 0, "rejected batch is still consumed");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn allow_anonymous_creates_loan_without_user(pool: PgPool) {
    let fx = Fixture::new(&pool, OperationMode::RequirePerson);
    let z1 = fx.zone("Z1", Some(OperationMode::AllowAnonymous)).await;
    let a = fx.item("A", z1).await;

    fx.read(z1, &[("A", 0)]).await;
    fx.scheduler.tick(at(3_000)).await;

    let loan = LoanRepo::find_active_for_item(&pool, a).await.unwrap().unwrap();
    assert!(loan.user_id.is_none());
    let location = LocationRepo::find_by_item(&pool, a).await.unwrap().unwrap();
    assert!(location.person_user_id.is_none());
    assert_eq!(location.taken_at, Some(at(0)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_tag_is_skipped(pool: PgPool) {
    let fx = Fixture::new(&pool, OperationMode::RequirePerson);
    let z1 = fx.zone("Z1", None).await;
    fx.person("ana", "P").await;
    let a = fx.item("A", z1).await;

    fx.read(z1, &[("P", 0), ("ZZZ999", 100), ("A", 200)]).await;
    let batch = fx.accumulator.sweep(at(3_200)).await.remove(0);
    let report = fx.engine.process(&batch).await.unwrap();

    assert_eq!(report.outcome("ZZZ999"), Some(&ItemOutcome::UnknownTag));
    assert_matches!(report.outcome("A"), Some(ItemOutcome::CheckedOut { .. }));
    assert_eq!(fx.state(a).await, LocationState::WithPerson);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn item_read_elsewhere_is_relocated(pool: PgPool) {
    let fx = Fixture::new(&pool, OperationMode::RequirePerson);
    let home = fx.zone("Z1", None).await;
    let lab = fx.zone("Z2", None).await;
    fx.person("ana", "P").await;
    let a = fx.item("A", home).await;

    fx.read(lab, &[("P", 0), ("A", 0)]).await;
    let batch = fx.accumulator.sweep(at(3_000)).await.remove(0);
    let report = fx.engine.process(&batch).await.unwrap();

    assert_matches!(
        report.outcome("A"),
        Some(ItemOutcome::CheckedOut { relocated_from: Some(z), .. }) if *z == home
    );
    let item = ItemRepo::find_by_id(&pool, a).await.unwrap().unwrap();
    assert_eq!(item.zone_id, lab);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_zone_is_rejected(pool: PgPool) {
    let fx = Fixture::new(&pool, OperationMode::RequirePerson);
    fx.person("ana", "P").await;

    fx.read(9_999, &[("P", 0)]).await;
    let batch = fx.accumulator.sweep(at(3_000)).await.remove(0);

    assert_matches!(
        fx.engine.process(&batch).await,
        Err(BatchError::UnknownZone { zone_id: 9_999 })
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn transitions_and_rejections_are_persisted_as_events(pool: PgPool) {
    let bus = Arc::new(EventBus::default());
    let persistence = tokio::spawn(EventPersistence::run(pool.clone(), bus.subscribe()));
    let engine = CorrelationEngine::new(
        Arc::new(PgStateStore::new(pool.clone())),
        OperationMode::RequirePerson,
        bus.clone(),
    );
    let fx = Fixture::new(&pool, OperationMode::RequirePerson);
    let z1 = fx.zone("Z1", None).await;
    fx.person("ana", "P").await;
    fx.item("A", z1).await;

    for (reads, now) in [
        (vec![("P", 0), ("A", 0)], 3_000),
        (vec![("P", 10_000), ("A", 10_000)], 13_000),
        (vec![("A", 20_000)], 23_000),
    ] {
        fx.read(z1, &reads).await;
        let batch = fx.accumulator.sweep(at(now)).await.remove(0);
        let _ = engine.process(&batch).await;
    }

    drop(engine);
    drop(bus);
    persistence.await.unwrap();

    let checked_out = EventRepo::list_by_type(&pool, ITEM_CHECKED_OUT, 10).await.unwrap();
    let returned = EventRepo::list_by_type(&pool, ITEM_RETURNED, 10).await.unwrap();
    let rejected = EventRepo::list_by_type(&pool, BATCH_REJECTED, 10).await.unwrap();
    assert_eq!(checked_out.len(), 1);
    assert_eq!(returned.len(), 1);
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].payload["reason"], "missing_person");
    assert_eq!(rejected[0].source_entity_id, Some(z1));
}
