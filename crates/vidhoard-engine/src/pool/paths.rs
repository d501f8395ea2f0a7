//! Destination path planning for downloads.
//!
//! Media lands under `{storage}/channels/{channel_id}_{name}/{video_id}_{title}/`.
//! Both components lead with the external id, so two channels (or two videos)
//! with the same display name can never collide on disk.

use std::path::{Path, PathBuf};

use vidhoard_core::{Channel, SourceError, Video};

/// Maximum length of the sanitized channel-name component.
const CHANNEL_NAME_MAX: usize = 50;

/// Maximum length of the sanitized video-title component.
const VIDEO_TITLE_MAX: usize = 100;

/// Reduce a display string to a filesystem-safe directory component.
///
/// Keeps alphanumerics, spaces, dashes and underscores, trims, turns spaces
/// into underscores and truncates to `max_len` characters.
#[must_use]
pub fn sanitize_component(name: &str, max_len: usize) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim().replace(' ', "_").chars().take(max_len).collect()
}

/// A planned download destination.
#[derive(Debug, Clone)]
pub struct DownloadDestination {
    /// Directory the media file (and any subtitles) land in.
    pub video_dir: PathBuf,
}

impl DownloadDestination {
    /// Plan the destination directory for one video of one channel.
    #[must_use]
    pub fn plan(storage_dir: &Path, channel: &Channel, video: &Video) -> Self {
        let channel_dir = format!(
            "{}_{}",
            channel.external_id,
            sanitize_component(&channel.name, CHANNEL_NAME_MAX)
        );
        let video_dir = format!(
            "{}_{}",
            video.external_id,
            sanitize_component(&video.title, VIDEO_TITLE_MAX)
        );

        Self {
            video_dir: storage_dir
                .join("channels")
                .join(channel_dir)
                .join(video_dir),
        }
    }

    /// Ensure the destination directory exists, creating it if necessary.
    pub fn ensure_dir(&self) -> Result<(), SourceError> {
        std::fs::create_dir_all(&self.video_dir)
            .map_err(|e| SourceError::io(format!("create {}: {e}", self.video_dir.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vidhoard_core::{ChannelId, ContentType, VideoId, VideoStatus};

    fn channel(external_id: &str, name: &str) -> Channel {
        Channel {
            id: ChannelId(1),
            external_id: external_id.to_string(),
            name: name.to_string(),
            description: None,
            subscriber_count: None,
            thumbnail_path: None,
            extra_metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn video(external_id: &str, title: &str) -> Video {
        Video {
            id: VideoId(1),
            external_id: external_id.to_string(),
            channel_id: ChannelId(1),
            title: title.to_string(),
            description: None,
            duration_secs: None,
            upload_date: None,
            view_count: None,
            like_count: None,
            content_type: ContentType::Video,
            quality: None,
            file_path: None,
            file_size: None,
            status: VideoStatus::Pending,
            thumbnail_generated: false,
            extra_metadata: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_sanitize_strips_and_replaces() {
        assert_eq!(sanitize_component("My Channel!", 50), "My_Channel");
        assert_eq!(sanitize_component("a/b\\c:d", 50), "abcd");
        assert_eq!(sanitize_component("  spaced out  ", 50), "spaced_out");
        assert_eq!(sanitize_component("keep-this_one", 50), "keep-this_one");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(200);
        assert_eq!(sanitize_component(&long, 100).len(), 100);
    }

    #[test]
    fn test_plan_layout_leads_with_external_ids() {
        let dest = DownloadDestination::plan(
            Path::new("/srv/media"),
            &channel("UCabc", "Cool Channel"),
            &video("dQw4w9WgXcQ", "Some: Video / Title"),
        );

        assert_eq!(
            dest.video_dir,
            PathBuf::from("/srv/media/channels/UCabc_Cool_Channel/dQw4w9WgXcQ_Some_Video__Title")
        );
    }

    #[test]
    fn test_plan_same_name_different_ids_never_collide() {
        let a = DownloadDestination::plan(
            Path::new("/srv"),
            &channel("UC1", "Name"),
            &video("v1", "Title"),
        );
        let b = DownloadDestination::plan(
            Path::new("/srv"),
            &channel("UC2", "Name"),
            &video("v2", "Title"),
        );
        assert_ne!(a.video_dir, b.video_dir);
    }
}
