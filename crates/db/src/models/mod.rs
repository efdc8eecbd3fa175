pub mod event;
pub mod item;
pub mod loan;
pub mod location;
pub mod person;
pub mod user;
pub mod zone;
