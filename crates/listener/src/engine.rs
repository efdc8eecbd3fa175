//! Correlation of one drained batch into item transitions.
//!
//! For a batch the engine:
//! 1. resolves the zone and its effective operation mode,
//! 2. picks out the acting person among the batch's tags,
//! 3. applies the zone policy when no person was read,
//! 4. checks out or returns every remaining item tag, each in its own
//!    transaction.
//!
//! Step 4 never short-circuits: every item gets an [`ItemOutcome`], and a
//! failure or panic while handling one tag is contained to that tag.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::json;
use stockroom_core::correlation::{
    evaluate_policy, select_person, PersonMatch, PersonSelection, PolicyDecision,
};
use stockroom_core::error::CoreError;
use stockroom_core::event_types::{
    BATCH_REJECTED, ENTITY_ITEM, ENTITY_ZONE, ITEM_CHECKED_OUT, ITEM_RELOCATED, ITEM_RETURNED,
    REASON_MISSING_PERSON, REASON_UNKNOWN_ZONE,
};
use stockroom_core::location::Transition;
use stockroom_core::operation_mode::OperationMode;
use stockroom_core::types::{DbId, Timestamp};
use stockroom_db::models::person::Person;
use stockroom_db::repositories::TransitionRecord;
use stockroom_events::{EventBus, TrackerEvent};

use crate::accumulator::ExpiredBatch;
use crate::store::{StateStore, StoreError};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a whole batch was dropped.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Zone {zone_id} does not exist")]
    UnknownZone { zone_id: DbId },

    #[error("Zone {zone_id} requires a person but none was read with {} item tag(s)", .item_tags.len())]
    MissingPerson {
        zone_id: DbId,
        item_tags: Vec<String>,
    },

    #[error("Zone {zone_id} has an unusable operation mode: {source}")]
    InvalidMode { zone_id: DbId, source: CoreError },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to one item tag of a processed batch.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    CheckedOut {
        item_id: DbId,
        loan_id: DbId,
        relocated_from: Option<DbId>,
    },
    Returned {
        item_id: DbId,
        loan_id: DbId,
        relocated_from: Option<DbId>,
    },
    /// The tag matches no item (or the item vanished mid-batch).
    UnknownTag,
    /// The item's transition was lost; the message is for logs only.
    Failed(String),
}

/// Summary of a batch that passed the zone policy.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub zone_id: DbId,
    pub mode: OperationMode,
    /// User the batch's loans were attributed to.
    pub actor_user_id: Option<DbId>,
    pub person_tag: Option<String>,
    /// Per item tag, in tag order.
    pub items: Vec<(String, ItemOutcome)>,
}

impl BatchReport {
    pub fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn outcome(&self, tag_id: &str) -> Option<&ItemOutcome> {
        self.items
            .iter()
            .find(|(tag, _)| tag == tag_id)
            .map(|(_, outcome)| outcome)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct CorrelationEngine {
    store: Arc<dyn StateStore>,
    default_mode: OperationMode,
    bus: Arc<EventBus>,
}

impl CorrelationEngine {
    pub fn new(store: Arc<dyn StateStore>, default_mode: OperationMode, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            default_mode,
            bus,
        }
    }

    /// Correlate one expired batch and apply its transitions.
    pub async fn process(&self, batch: &ExpiredBatch) -> Result<BatchReport, BatchError> {
        let zone_id = batch.zone_id;
        let tags = batch.latest_by_tag();

        let Some(zone) = self.store.find_zone(zone_id).await? else {
            self.reject(zone_id, REASON_UNKNOWN_ZONE, tags.keys().cloned().collect());
            return Err(BatchError::UnknownZone { zone_id });
        };

        let mode = zone
            .effective_mode(self.default_mode)
            .map_err(|source| BatchError::InvalidMode { zone_id, source })?;

        // Person directory scan, in tag order.
        let mut matches = Vec::new();
        for tag_id in tags.keys() {
            if let Some(person) = self.store.find_person_by_tag(tag_id).await? {
                matches.push(PersonMatch {
                    tag_id: tag_id.clone(),
                    person,
                });
            }
        }

        let mut item_tags: BTreeMap<String, Timestamp> = tags;
        for m in &matches {
            item_tags.remove(&m.tag_id);
        }

        let selection = select_person(matches);
        if let PersonSelection::Ambiguous { chosen, ignored } = &selection {
            tracing::warn!(
                zone_id,
                chosen_tag = %chosen.tag_id,
                ignored_tags = ?ignored,
                "Ambiguous person: several person tags in one batch, using the lowest",
            );
        }
        let chosen: Option<&PersonMatch<Person>> = selection.chosen();

        match evaluate_policy(mode, chosen.is_some(), item_tags.len()) {
            PolicyDecision::RejectMissingPerson => {
                let item_tags: Vec<String> = item_tags.into_keys().collect();
                tracing::error!(
                    zone_id,
                    mode = %mode,
                    item_tags = ?item_tags,
                    "Missing person: items read without an identified person, batch dropped",
                );
                self.reject(zone_id, REASON_MISSING_PERSON, item_tags.clone());
                return Err(BatchError::MissingPerson { zone_id, item_tags });
            }
            PolicyDecision::Proceed { anonymous } => {
                if anonymous && !item_tags.is_empty() {
                    tracing::info!(zone_id, items = item_tags.len(), "Processing anonymous batch");
                }
            }
        }

        let actor_user_id = chosen.map(|c| c.person.user_id);
        let person_tag = chosen.map(|c| c.tag_id.clone());

        let mut items = Vec::with_capacity(item_tags.len());
        for (tag_id, read_at) in item_tags {
            let outcome = AssertUnwindSafe(self.process_item(zone_id, &tag_id, read_at, actor_user_id))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    tracing::error!(zone_id, tag_id = %tag_id, "Item processing panicked");
                    ItemOutcome::Failed("panicked".into())
                });
            items.push((tag_id, outcome));
        }

        Ok(BatchReport {
            zone_id,
            mode,
            actor_user_id,
            person_tag,
            items,
        })
    }

    async fn process_item(
        &self,
        zone_id: DbId,
        tag_id: &str,
        read_at: Timestamp,
        actor_user_id: Option<DbId>,
    ) -> ItemOutcome {
        let item = match self.store.find_item_by_tag(tag_id).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                tracing::warn!(zone_id, tag_id, "Unknown tag: no item or person matches");
                return ItemOutcome::UnknownTag;
            }
            Err(e) => {
                tracing::error!(zone_id, tag_id, error = %e, "Item lookup failed");
                return ItemOutcome::Failed(e.to_string());
            }
        };

        let record = match self
            .store
            .apply_transition(item.id, zone_id, actor_user_id, read_at)
            .await
        {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::warn!(zone_id, tag_id, item_id = item.id, "Item vanished before it could be locked");
                return ItemOutcome::UnknownTag;
            }
            Err(e) => {
                tracing::error!(
                    zone_id,
                    tag_id,
                    item_id = item.id,
                    error = %e,
                    "Transition failed, item state unchanged",
                );
                return ItemOutcome::Failed(e.to_string());
            }
        };

        self.publish_transition(zone_id, tag_id, actor_user_id, &record);

        let TransitionRecord {
            transition,
            item,
            relocated_from,
            loan,
            ..
        } = record;
        match transition {
            Transition::Checkout => ItemOutcome::CheckedOut {
                item_id: item.id,
                loan_id: loan.id,
                relocated_from,
            },
            Transition::Return => ItemOutcome::Returned {
                item_id: item.id,
                loan_id: loan.id,
                relocated_from,
            },
        }
    }

    fn publish_transition(
        &self,
        zone_id: DbId,
        tag_id: &str,
        actor_user_id: Option<DbId>,
        record: &TransitionRecord,
    ) {
        let item_id = record.item.id;

        if let Some(from_zone_id) = record.relocated_from {
            tracing::info!(
                item_id,
                tag_id,
                from_zone_id,
                to_zone_id = zone_id,
                "Item read outside its zone, zone corrected",
            );
            self.bus.publish(
                TrackerEvent::new(ITEM_RELOCATED)
                    .with_source(ENTITY_ITEM, item_id)
                    .with_actor(actor_user_id)
                    .with_payload(json!({
                        "tag_id": tag_id,
                        "from_zone_id": from_zone_id,
                        "to_zone_id": zone_id,
                    })),
            );
        }

        let event = match record.transition {
            Transition::Checkout => {
                tracing::info!(
                    item_id,
                    tag_id,
                    zone_id,
                    loan_id = record.loan.id,
                    user_id = ?record.loan.user_id,
                    "Item checked out",
                );
                TrackerEvent::new(ITEM_CHECKED_OUT).with_payload(json!({
                    "tag_id": tag_id,
                    "zone_id": zone_id,
                    "loan_id": record.loan.id,
                    "taken_at": record.loan.taken_at,
                    "anonymous": record.loan.user_id.is_none(),
                }))
            }
            Transition::Return => {
                tracing::info!(
                    item_id,
                    tag_id,
                    zone_id,
                    loan_id = record.loan.id,
                    "Item returned",
                );
                TrackerEvent::new(ITEM_RETURNED).with_payload(json!({
                    "tag_id": tag_id,
                    "zone_id": zone_id,
                    "loan_id": record.loan.id,
                    "returned_at": record.loan.returned_at,
                }))
            }
        };
        self.bus.publish(
            event
                .with_source(ENTITY_ITEM, item_id)
                .with_actor(actor_user_id),
        );
    }

    fn reject(&self, zone_id: DbId, reason: &str, tags: Vec<String>) {
        self.bus.publish(
            TrackerEvent::new(BATCH_REJECTED)
                .with_source(ENTITY_ZONE, zone_id)
                .with_payload(json!({
                    "zone_id": zone_id,
                    "reason": reason,
                    "tags": tags,
                })),
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
