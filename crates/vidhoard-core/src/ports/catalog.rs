//! Catalog store port definition.
//!
//! The catalog owns channel and video identity. Dedup by external id is
//! enforced here (by the implementation's unique constraints), not by
//! callers reading before writing.

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::{
    Channel, ChannelId, NewChannel, NewVideo, StoredFile, Video, VideoFilter, VideoId, VideoStatus,
};

/// Port for the channel/video catalog.
///
/// # Identity rules
///
/// - `upsert_channel` is the only way channels come into existence; a second
///   upsert with the same external id refreshes mutable attributes in place.
/// - `insert_video` fails with [`RepositoryError::AlreadyExists`] when the
///   external id is already cataloged; the constraint is atomic, so two
///   overlapping discovery runs can both attempt the insert and exactly one
///   succeeds.
/// - Nothing deletes a channel. Video deletion is a status flip only.
#[async_trait]
pub trait CatalogStorePort: Send + Sync {
    /// Create or refresh a channel keyed by external id.
    async fn upsert_channel(&self, channel: &NewChannel) -> Result<Channel, RepositoryError>;

    /// Fetch a channel by internal id.
    async fn get_channel(&self, id: ChannelId) -> Result<Channel, RepositoryError>;

    /// Look up a video by its external id.
    async fn find_video_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Video>, RepositoryError>;

    /// Insert a new video in `pending` state.
    ///
    /// Fails with [`RepositoryError::AlreadyExists`] when a video with the
    /// same external id is already cataloged; no second row is created.
    async fn insert_video(&self, video: &NewVideo) -> Result<Video, RepositoryError>;

    /// Fetch a video by internal id.
    async fn get_video(&self, id: VideoId) -> Result<Video, RepositoryError>;

    /// Update a video's download status. Idempotent.
    async fn update_video_status(
        &self,
        id: VideoId,
        status: VideoStatus,
    ) -> Result<(), RepositoryError>;

    /// Set or clear a video's downloaded-file reference.
    ///
    /// Passing `None` clears the path and size, which is how failed or
    /// paused downloads guarantee no partial file stays referenced.
    async fn set_video_file(
        &self,
        id: VideoId,
        file: Option<&StoredFile>,
    ) -> Result<(), RepositoryError>;

    /// List videos, newest first.
    async fn list_videos(&self, filter: &VideoFilter) -> Result<Vec<Video>, RepositoryError>;
}
