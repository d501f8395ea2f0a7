//! Discovery log port definition.

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{DiscoveryEvent, NewDiscoveryEvent};

/// Port for the append-only discovery run log.
///
/// Rows are never mutated after append; readers are status surfaces only.
#[async_trait]
pub trait DiscoveryLogPort: Send + Sync {
    /// Append one discovery event.
    async fn append(&self, event: &NewDiscoveryEvent) -> Result<DiscoveryEvent, RepositoryError>;

    /// The most recent events, newest first.
    async fn recent(&self, limit: u32) -> Result<Vec<DiscoveryEvent>, RepositoryError>;
}
