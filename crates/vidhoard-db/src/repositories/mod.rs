//! SQLite repository implementations.

mod sqlite_catalog_store;
mod sqlite_discovery_log;
mod sqlite_job_queue;
mod sqlite_subscription_store;

pub use sqlite_catalog_store::SqliteCatalogStore;
pub use sqlite_discovery_log::SqliteDiscoveryLog;
pub use sqlite_job_queue::SqliteJobQueue;
pub use sqlite_subscription_store::SqliteSubscriptionStore;

use vidhoard_core::RepositoryError;

/// Map a sqlx error to the repository error taxonomy, turning unique
/// constraint violations into `AlreadyExists`.
pub(crate) fn map_sqlx_error(err: sqlx::Error, entity: &str) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::AlreadyExists(entity.to_string())
        }
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            RepositoryError::Constraint(format!("{entity}: {db}"))
        }
        sqlx::Error::RowNotFound => RepositoryError::NotFound(entity.to_string()),
        _ => RepositoryError::Storage(err.to_string()),
    }
}

pub(crate) fn map_column_error(err: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(format!("Column read error: {err}"))
}
