//! Item location states and the checkout/return state machine.
//!
//! The string forms must match the `locations.state` CHECK constraint.

use serde::Serialize;

use crate::error::CoreError;

/// The item sits on its shelf in its zone.
pub const STATE_ON_SHELF: &str = "ON_SHELF";

/// The item has been taken (by a person, or anonymously).
pub const STATE_WITH_PERSON: &str = "WITH_PERSON";

/// Where an item currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationState {
    OnShelf,
    WithPerson,
}

impl LocationState {
    pub fn as_str(self) -> &'static str {
        match self {
            LocationState::OnShelf => STATE_ON_SHELF,
            LocationState::WithPerson => STATE_WITH_PERSON,
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            STATE_ON_SHELF => Ok(LocationState::OnShelf),
            STATE_WITH_PERSON => Ok(LocationState::WithPerson),
            other => Err(CoreError::Validation(format!(
                "Unknown location state '{other}'"
            ))),
        }
    }
}

/// The transition a single read triggers for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// ON_SHELF -> WITH_PERSON; opens a loan.
    Checkout,
    /// WITH_PERSON -> ON_SHELF; closes the active loan.
    Return,
}

impl Transition {
    /// The location state after this transition is applied.
    pub fn target_state(self) -> LocationState {
        match self {
            Transition::Checkout => LocationState::WithPerson,
            Transition::Return => LocationState::OnShelf,
        }
    }
}

/// Decide the transition for an item read in a drained batch.
///
/// An active loan is the persisted witness of WITH_PERSON, so its presence
/// alone decides: a read returns a held item and checks out a shelved one.
pub fn decide_transition(has_active_loan: bool) -> Transition {
    if has_active_loan {
        Transition::Return
    } else {
        Transition::Checkout
    }
}
