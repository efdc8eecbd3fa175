//! Pure rules for correlating a drained batch: who is acting, and whether
//! the zone's policy lets the batch proceed.

use crate::operation_mode::OperationMode;

/// A batch tag that resolved to a registered person.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonMatch<P> {
    pub tag_id: String,
    pub person: P,
}

/// Outcome of picking the acting person among a batch's person tags.
#[derive(Debug, Clone, PartialEq)]
pub enum PersonSelection<P> {
    /// No tag in the batch belongs to a person.
    Absent,
    /// Exactly one person tag was read.
    Single(PersonMatch<P>),
    /// Several person tags were read; the lowest tag acts, the rest are
    /// ignored and reported.
    Ambiguous {
        chosen: PersonMatch<P>,
        ignored: Vec<String>,
    },
}

impl<P> PersonSelection<P> {
    pub fn chosen(&self) -> Option<&PersonMatch<P>> {
        match self {
            PersonSelection::Absent => None,
            PersonSelection::Single(m) => Some(m),
            PersonSelection::Ambiguous { chosen, .. } => Some(chosen),
        }
    }
}

/// Pick the acting person deterministically: the match with the lowest
/// `tag_id` wins.
pub fn select_person<P>(mut matches: Vec<PersonMatch<P>>) -> PersonSelection<P> {
    matches.sort_by(|a, b| a.tag_id.cmp(&b.tag_id));
    let mut iter = matches.into_iter();
    let Some(chosen) = iter.next() else {
        return PersonSelection::Absent;
    };
    let ignored: Vec<String> = iter.map(|m| m.tag_id).collect();
    if ignored.is_empty() {
        PersonSelection::Single(chosen)
    } else {
        PersonSelection::Ambiguous { chosen, ignored }
    }
}

/// Whether a batch may mutate state under the zone's policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Process the item tags. `anonymous` loans carry no user.
    Proceed { anonymous: bool },
    /// Items moved with no attributable person in a zone that requires one.
    RejectMissingPerson,
}

pub fn evaluate_policy(
    mode: OperationMode,
    person_identified: bool,
    item_tag_count: usize,
) -> PolicyDecision {
    if person_identified || item_tag_count == 0 {
        return PolicyDecision::Proceed { anonymous: !person_identified };
    }
    match mode {
        OperationMode::RequirePerson => PolicyDecision::RejectMissingPerson,
        OperationMode::AllowAnonymous => PolicyDecision::Proceed { anonymous: true },
    }
}
