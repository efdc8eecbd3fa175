//! In-memory [`StateStore`] for engine and scheduler unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use stockroom_core::location::{decide_transition, LocationState, Transition};
use stockroom_core::operation_mode::OperationMode;
use stockroom_core::types::{DbId, Timestamp};
use stockroom_db::models::item::Item;
use stockroom_db::models::loan::Loan;
use stockroom_db::models::location::Location;
use stockroom_db::models::person::Person;
use stockroom_db::models::zone::Zone;
use stockroom_db::repositories::TransitionRecord;

use crate::accumulator::ExpiredBatch;
use crate::store::{StateStore, StoreError};

pub fn at(millis: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2025, 10, 7, 10, 30, 0).unwrap() + Duration::milliseconds(millis)
}

pub fn batch(zone_id: DbId, reads: &[(&str, i64)]) -> ExpiredBatch {
    let readings: Vec<(String, Timestamp)> = reads
        .iter()
        .map(|(tag, millis)| (tag.to_string(), at(*millis)))
        .collect();
    let last_seen = readings.last().map(|(_, ts)| *ts).unwrap_or_else(|| at(0));
    ExpiredBatch {
        zone_id,
        readings,
        last_seen,
    }
}

#[derive(Default)]
struct State {
    next_id: DbId,
    zones: HashMap<DbId, Zone>,
    persons: Vec<Person>,
    items: HashMap<DbId, Item>,
    loans: Vec<Loan>,
    locations: HashMap<DbId, Location>,
    failing_items: HashSet<DbId>,
    panicking_items: HashSet<DbId>,
    fail_lookups: bool,
    transition_calls: usize,
}

impl State {
    fn id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_zone(&self, mode: Option<OperationMode>) -> DbId {
        let mut s = self.state.lock().unwrap();
        let id = s.id();
        s.zones.insert(
            id,
            Zone {
                id,
                name: format!("Zone {id}"),
                code: format!("Z{id}"),
                operation_mode: mode.map(|m| m.as_str().to_string()),
                created_at: at(0),
                updated_at: at(0),
            },
        );
        id
    }

    /// Registers a person carrying `tag`; returns the person's user id.
    pub fn add_person(&self, tag: &str) -> DbId {
        let mut s = self.state.lock().unwrap();
        let id = s.id();
        let user_id = id + 10_000;
        s.persons.push(Person {
            id,
            user_id,
            tag_id: Some(tag.to_string()),
            created_at: at(0),
            updated_at: at(0),
        });
        user_id
    }

    pub fn add_item(&self, tag: &str, zone_id: DbId) -> DbId {
        let mut s = self.state.lock().unwrap();
        let id = s.id();
        let location_id = s.id();
        s.items.insert(
            id,
            Item {
                id,
                tag_id: tag.to_string(),
                name: format!("Item {tag}"),
                zone_id,
                shelf_label: "S-1".into(),
                position: "top".into(),
                serial_number: String::new(),
                quantity: 1.0,
                description: String::new(),
                created_at: at(0),
                updated_at: at(0),
            },
        );
        s.locations.insert(
            id,
            Location {
                id: location_id,
                item_id: id,
                state: LocationState::OnShelf.as_str().into(),
                zone_id: Some(zone_id),
                shelf_label: Some("S-1".into()),
                position: Some("top".into()),
                person_user_id: None,
                taken_at: None,
                created_at: at(0),
                updated_at: at(0),
            },
        );
        id
    }

    pub fn fail_transitions_for(&self, item_id: DbId) {
        self.state.lock().unwrap().failing_items.insert(item_id);
    }

    pub fn panic_on_transition_for(&self, item_id: DbId) {
        self.state.lock().unwrap().panicking_items.insert(item_id);
    }

    /// Make every person lookup fail.
    pub fn fail_lookups(&self) {
        self.state.lock().unwrap().fail_lookups = true;
    }

    pub fn transition_calls(&self) -> usize {
        self.state.lock().unwrap().transition_calls
    }

    pub fn active_loan(&self, item_id: DbId) -> Option<Loan> {
        let s = self.state.lock().unwrap();
        s.loans
            .iter()
            .find(|l| l.item_id == item_id && l.is_active())
            .cloned()
    }

    pub fn loan(&self, loan_id: DbId) -> Loan {
        let s = self.state.lock().unwrap();
        s.loans.iter().find(|l| l.id == loan_id).cloned().unwrap()
    }

    pub fn location_state(&self, item_id: DbId) -> LocationState {
        let s = self.state.lock().unwrap();
        s.locations[&item_id].state().unwrap()
    }

    pub fn item_zone(&self, item_id: DbId) -> DbId {
        self.state.lock().unwrap().items[&item_id].zone_id
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn find_zone(&self, zone_id: DbId) -> Result<Option<Zone>, StoreError> {
        Ok(self.state.lock().unwrap().zones.get(&zone_id).cloned())
    }

    async fn find_person_by_tag(&self, tag_id: &str) -> Result<Option<Person>, StoreError> {
        let s = self.state.lock().unwrap();
        if s.fail_lookups {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(s.persons
            .iter()
            .find(|p| p.tag_id.as_deref() == Some(tag_id))
            .cloned())
    }

    async fn find_item_by_tag(&self, tag_id: &str) -> Result<Option<Item>, StoreError> {
        let s = self.state.lock().unwrap();
        Ok(s.items.values().find(|i| i.tag_id == tag_id).cloned())
    }

    async fn apply_transition(
        &self,
        item_id: DbId,
        zone_id: DbId,
        user_id: Option<DbId>,
        read_at: Timestamp,
    ) -> Result<Option<TransitionRecord>, StoreError> {
        // Checked without holding the lock so the panic cannot poison it.
        let should_panic = self.state.lock().unwrap().panicking_items.contains(&item_id);
        if should_panic {
            panic!("injected panic for item {item_id}");
        }

        let mut s = self.state.lock().unwrap();
        s.transition_calls += 1;
        if s.failing_items.contains(&item_id) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }

        let Some(mut item) = s.items.get(&item_id).cloned() else {
            return Ok(None);
        };

        let mut relocated_from = None;
        if item.zone_id != zone_id {
            relocated_from = Some(item.zone_id);
            item.zone_id = zone_id;
            s.items.insert(item_id, item.clone());
        }

        let active = s
            .loans
            .iter()
            .position(|l| l.item_id == item_id && l.is_active());

        let transition = decide_transition(active.is_some());
        let loan = match (transition, active) {
            (Transition::Return, Some(idx)) => {
                s.loans[idx].returned_at = Some(read_at);
                s.loans[idx].clone()
            }
            _ => {
                let loan = Loan {
                    id: s.id(),
                    item_id,
                    user_id,
                    taken_at: read_at,
                    returned_at: None,
                    created_at: read_at,
                };
                s.loans.push(loan.clone());
                loan
            }
        };

        let location = {
            let location = s
                .locations
                .get_mut(&item_id)
                .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
            location.state = transition.target_state().as_str().into();
            match transition {
                Transition::Return => {
                    location.zone_id = Some(item.zone_id);
                    location.shelf_label = Some(item.shelf_label.clone());
                    location.position = Some(item.position.clone());
                    location.person_user_id = None;
                    location.taken_at = None;
                }
                Transition::Checkout => {
                    location.zone_id = None;
                    location.shelf_label = None;
                    location.position = None;
                    location.person_user_id = user_id;
                    location.taken_at = Some(read_at);
                }
            }
            location.clone()
        };

        Ok(Some(TransitionRecord {
            transition,
            item,
            relocated_from,
            loan,
            location,
        }))
    }
}
