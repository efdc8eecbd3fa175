//! Repository layer: one unit struct per table.

pub mod event_repo;
pub mod item_repo;
pub mod loan_repo;
pub mod location_repo;
pub mod person_repo;
pub mod transition_repo;
pub mod user_repo;
pub mod zone_repo;

pub use event_repo::EventRepo;
pub use item_repo::ItemRepo;
pub use loan_repo::LoanRepo;
pub use location_repo::LocationRepo;
pub use person_repo::PersonRepo;
pub use transition_repo::{ItemTransitionRepo, TransitionRecord};
pub use user_repo::UserRepo;
pub use zone_repo::ZoneRepo;
