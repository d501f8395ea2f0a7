//! Store factory.
//!
//! Builds all repository trait objects from a connection pool so adapters
//! never touch concrete repository types.

use sqlx::SqlitePool;
use std::sync::Arc;

use vidhoard_core::Stores;

use crate::repositories::{
    SqliteCatalogStore, SqliteDiscoveryLog, SqliteJobQueue, SqliteSubscriptionStore,
};

/// Build the full store container from a pool.
#[must_use]
pub fn build_stores(pool: &SqlitePool) -> Stores {
    Stores::new(
        Arc::new(SqliteCatalogStore::new(pool.clone())),
        Arc::new(SqliteSubscriptionStore::new(pool.clone())),
        Arc::new(SqliteJobQueue::new(pool.clone())),
        Arc::new(SqliteDiscoveryLog::new(pool.clone())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;

    #[tokio::test]
    async fn test_build_stores_wires_everything() {
        let pool = setup_test_database().await.unwrap();
        let stores = build_stores(&pool);

        assert!(stores.subscriptions.list_all().await.unwrap().is_empty());
        assert_eq!(stores.jobs.counts().await.unwrap().total, 0);
        assert!(stores.discovery_log.recent(5).await.unwrap().is_empty());
    }
}
