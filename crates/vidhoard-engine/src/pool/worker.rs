//! Download execution pipeline.
//!
//! Runs one claimed download job end to end: destination planning, status
//! flips on the video row, the adapter fetch with throttled progress
//! persistence, and outcome classification. The worker operates on cloned
//! Arc dependencies and never touches the pool's bookkeeping; the pool
//! applies the returned [`ExecOutcome`] as the job's single queue transition.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use vidhoard_core::{
    BackoffGovernor, CancelFlag, CatalogStorePort, ContentSourcePort, FetchRequest, Job, JobQueuePort,
    QualityPreference, SourceError, StoredFile, VideoId, VideoStatus,
};

use crate::progress::ProgressThrottle;

use super::paths::DownloadDestination;
use super::ExecOutcome;

/// Dependencies for the download worker.
///
/// Cloned Arc references to ports plus the execution knobs, so workers run
/// independently of the pool's state.
#[derive(Clone)]
pub struct WorkerDeps {
    /// Channel/video catalog.
    pub catalog: Arc<dyn CatalogStorePort>,
    /// Job queue, for progress persistence.
    pub jobs: Arc<dyn JobQueuePort>,
    /// The content source adapter.
    pub source: Arc<dyn ContentSourcePort>,
    /// Shared failure tracker for the source.
    pub backoff: Arc<BackoffGovernor>,
    /// Root directory for downloaded media.
    pub storage_dir: PathBuf,
    /// Subtitle languages fetched alongside the media.
    pub subtitle_languages: Vec<String>,
    /// Minimum interval between persisted progress updates.
    pub progress_interval: Duration,
}

/// Run one download job to its outcome.
///
/// Every failure path clears the video's file reference first, so a partial
/// file is never left referenced by the catalog. A pause request surfaces as
/// [`SourceError::Cancelled`] from the adapter; the job row is already
/// `paused` by then, so the worker only acknowledges by resetting the video.
pub async fn run_download(
    deps: &WorkerDeps,
    job: &Job,
    video_id: VideoId,
    quality: QualityPreference,
    attempts_left: bool,
    cancel: &CancelFlag,
) -> ExecOutcome {
    let video = match deps.catalog.get_video(video_id).await {
        Ok(video) => video,
        Err(e) => return ExecOutcome::failed(format!("video {video_id} unavailable: {e}")),
    };
    let channel = match deps.catalog.get_channel(video.channel_id).await {
        Ok(channel) => channel,
        Err(e) => {
            return ExecOutcome::failed(format!("channel {} unavailable: {e}", video.channel_id));
        }
    };

    let destination = DownloadDestination::plan(&deps.storage_dir, &channel, &video);
    if let Err(e) = destination.ensure_dir() {
        set_status(deps, video_id, VideoStatus::Failed).await;
        return ExecOutcome::failed(e.to_string());
    }

    if let Err(e) = deps
        .catalog
        .update_video_status(video_id, VideoStatus::Downloading)
        .await
    {
        return ExecOutcome::failed(format!("marking video downloading: {e}"));
    }

    let request = FetchRequest {
        external_id: video.external_id.clone(),
        quality,
        subtitle_languages: deps.subtitle_languages.clone(),
        destination: destination.video_dir.clone(),
    };

    // Bridge the adapter's synchronous progress callbacks into throttled
    // async store writes through a watch channel; the adapter can report
    // every chunk without generating a write per chunk.
    let (progress_tx, mut progress_rx) = watch::channel(0.0f64);
    let on_progress = move |percent: f64| {
        let _ = progress_tx.send(percent.clamp(0.0, 100.0));
    };

    let bridge_jobs = Arc::clone(&deps.jobs);
    let job_id = job.id;
    let interval = deps.progress_interval;
    let bridge = tokio::spawn(async move {
        let mut throttle = ProgressThrottle::new(interval);
        while progress_rx.changed().await.is_ok() {
            let percent = *progress_rx.borrow_and_update();
            if throttle.should_emit() {
                if let Err(e) = bridge_jobs.update_progress(job_id, percent).await {
                    // Expected once the job leaves `active` (pause races the
                    // last in-flight callback)
                    tracing::debug!(job = %job_id, error = %e, "progress update dropped");
                }
            }
        }
    });

    let fetched = deps.source.fetch_item(&request, &on_progress, cancel).await;
    bridge.abort();

    match fetched {
        Ok(media) => {
            deps.backoff.record_success();

            let stored = StoredFile {
                path: media.file_path.to_string_lossy().into_owned(),
                size: i64::try_from(media.file_size).unwrap_or(i64::MAX),
            };
            if let Err(e) = deps.catalog.set_video_file(video_id, Some(&stored)).await {
                return ExecOutcome::failed(format!("recording downloaded file: {e}"));
            }
            set_status(deps, video_id, VideoStatus::Completed).await;

            tracing::info!(
                job = %job_id,
                video = %video_id,
                path = %stored.path,
                size = stored.size,
                "download completed"
            );
            ExecOutcome::Completed(serde_json::json!({
                "file_path": stored.path,
                "file_size": stored.size,
            }))
        }
        Err(SourceError::Cancelled) => {
            clear_file(deps, video_id).await;
            set_status(deps, video_id, VideoStatus::Pending).await;
            ExecOutcome::PauseAcknowledged
        }
        Err(e) if e.is_transient() => {
            deps.backoff.record_failure();
            clear_file(deps, video_id).await;

            if attempts_left {
                set_status(deps, video_id, VideoStatus::Pending).await;
                ExecOutcome::requeue(e.to_string())
            } else {
                set_status(deps, video_id, VideoStatus::Failed).await;
                ExecOutcome::failed(e.to_string())
            }
        }
        Err(e) => {
            // Permanent source errors fail immediately and do not feed the
            // governor; the source is healthy, the item is not
            clear_file(deps, video_id).await;
            set_status(deps, video_id, VideoStatus::Failed).await;
            ExecOutcome::failed(e.to_string())
        }
    }
}

async fn set_status(deps: &WorkerDeps, video_id: VideoId, status: VideoStatus) {
    if let Err(e) = deps.catalog.update_video_status(video_id, status).await {
        tracing::error!(video = %video_id, status = %status.as_str(), error = %e, "status update failed");
    }
}

async fn clear_file(deps: &WorkerDeps, video_id: VideoId) {
    if let Err(e) = deps.catalog.set_video_file(video_id, None).await {
        tracing::error!(video = %video_id, error = %e, "clearing file reference failed");
    }
}
