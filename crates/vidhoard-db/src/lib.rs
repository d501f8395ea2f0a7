//! SQLite repository implementations for vidhoard.
//!
//! Implements the `vidhoard-core` store ports on top of sqlx. The race-prone
//! catalog and queue invariants (unique external ids, one active download
//! per video, exclusive claims) are enforced by constraints and conditional
//! statements, never by application-level check-then-act.

pub mod factory;
pub mod repositories;
pub mod setup;

pub use factory::build_stores;
pub use repositories::{
    SqliteCatalogStore, SqliteDiscoveryLog, SqliteJobQueue, SqliteSubscriptionStore,
};
pub use setup::setup_database;

#[cfg(any(test, feature = "test-utils"))]
pub use setup::setup_test_database;
