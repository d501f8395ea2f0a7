//! The archive service facade.
//!
//! One object composing the stores, scheduler, backoff governor and worker
//! pools behind the operations outer layers (CLI, HTTP) call. Construction
//! wires the engine; [`ArchiveService::start`] recovers orphaned jobs,
//! rebuilds subscription timers and spawns the workers.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Notify;

use vidhoard_core::{
    BackoffGovernor, BackoffStatus, ContentSourcePort, DiscoveryEvent, Enqueued, Job, JobFilter,
    JobId, NewChannel, NewJob, NewSubscription, PRIORITY_SUBSCRIPTION, QualityPreference,
    QueueCounts, Settings, Stores, Subscription, SubscriptionId, SubscriptionUpdate, Video,
    VideoFilter, VideoId,
};

use crate::discovery::DiscoveryRunner;
use crate::error::ArchiveError;
use crate::pool::{AcquisitionPool, PoolConfig, WorkerDeps};
use crate::scheduler::{NextFire, SubscriptionScheduler, parse_check_frequency};

/// Request for creating a subscription from a source URL.
///
/// The channel identity and subscription kind are resolved by probing the
/// source; unset fields fall back to the configured defaults.
#[derive(Clone, Debug)]
pub struct NewSubscriptionRequest {
    pub source_url: String,
    pub auto_download: bool,
    pub quality: Option<QualityPreference>,
    pub content_types: Option<Vec<vidhoard_core::ContentType>>,
    pub check_frequency: Option<String>,
    pub subtitle_languages: Option<Vec<String>>,
    pub latest_n_videos: Option<u32>,
}

impl NewSubscriptionRequest {
    /// A request with defaults: auto-download on, everything else from
    /// settings.
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            auto_download: true,
            quality: None,
            content_types: None,
            check_frequency: None,
            subtitle_languages: None,
            latest_n_videos: None,
        }
    }
}

/// Combined scheduler view for status surfaces.
#[derive(Clone, Debug, Serialize)]
pub struct SchedulerOverview {
    pub running: bool,
    pub total_jobs: i64,
    pub next_fires: Vec<NextFire>,
}

/// The acquisition engine facade.
pub struct ArchiveService {
    stores: Stores,
    source: Arc<dyn ContentSourcePort>,
    settings: Settings,
    backoff: Arc<BackoffGovernor>,
    scheduler: Arc<SubscriptionScheduler>,
    pool: Arc<AcquisitionPool>,
    notify: Arc<Notify>,
}

impl ArchiveService {
    /// Wire the engine. Nothing runs until [`ArchiveService::start`].
    pub fn new(
        stores: Stores,
        source: Arc<dyn ContentSourcePort>,
        settings: Settings,
    ) -> Arc<Self> {
        let notify = Arc::new(Notify::new());
        let backoff = Arc::new(BackoffGovernor::new(settings.backoff_config()));

        let scheduler = Arc::new(SubscriptionScheduler::new(
            Arc::clone(&stores.jobs),
            Arc::clone(&stores.subscriptions),
            Arc::clone(&notify),
        ));

        let discovery = Arc::new(DiscoveryRunner::new(
            stores.clone(),
            Arc::clone(&source),
            Arc::clone(&backoff),
            Arc::clone(&notify),
        ));

        let worker_deps = WorkerDeps {
            catalog: Arc::clone(&stores.catalog),
            jobs: Arc::clone(&stores.jobs),
            source: Arc::clone(&source),
            backoff: Arc::clone(&backoff),
            storage_dir: settings.storage_dir.clone(),
            subtitle_languages: settings.subtitle_languages.clone(),
            progress_interval: settings.progress_interval(),
        };

        let pool = AcquisitionPool::new(
            Arc::clone(&stores.jobs),
            Arc::clone(&backoff),
            discovery,
            worker_deps,
            Arc::clone(&notify),
            PoolConfig::from_settings(&settings),
        );

        Arc::new(Self {
            stores,
            source,
            settings,
            backoff,
            scheduler,
            pool,
            notify,
        })
    }

    /// Recover jobs orphaned by a previous run, rebuild subscription timers
    /// and spawn the worker pools.
    pub async fn start(self: &Arc<Self>) -> Result<(), ArchiveError> {
        let requeued = self.stores.jobs.requeue_orphaned().await?;
        if requeued > 0 {
            self.notify.notify_waiters();
        }
        self.scheduler.start().await?;
        self.pool.ensure_workers();
        Ok(())
    }

    /// Stop timers and workers; active downloads receive a cancel signal.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        self.pool.shutdown();
    }

    // ---- subscriptions ------------------------------------------------

    /// Probe the source URL, create (or refresh) its channel, persist the
    /// subscription and arm its timer.
    pub async fn create_subscription(
        &self,
        request: NewSubscriptionRequest,
    ) -> Result<Subscription, ArchiveError> {
        if request.source_url.trim().is_empty() {
            return Err(ArchiveError::Validation("source URL is empty".into()));
        }

        let cron = request
            .check_frequency
            .unwrap_or_else(|| self.settings.default_check_cron.clone());
        // Validate before touching the store so a typo never persists
        parse_check_frequency(&cron)?;

        let info = self.source.probe_source(&request.source_url).await?;
        let channel = self
            .stores
            .catalog
            .upsert_channel(&NewChannel {
                external_id: info.channel_external_id.clone(),
                name: info.channel_name.clone(),
                description: info.description.clone(),
                subscriber_count: info.subscriber_count,
                thumbnail_path: None,
                extra_metadata: None,
            })
            .await?;

        let mut new_subscription =
            NewSubscription::new(channel.id, info.kind, request.source_url)
                .with_check_frequency(cron)
                .with_auto_download(request.auto_download)
                .with_quality(request.quality.unwrap_or(self.settings.default_quality));
        if let Some(types) = request.content_types {
            new_subscription = new_subscription.with_content_types(types);
        }
        new_subscription.subtitle_languages = request
            .subtitle_languages
            .unwrap_or_else(|| self.settings.subtitle_languages.clone());
        if let Some(n) = request.latest_n_videos {
            new_subscription.latest_n_videos = n;
        }

        let subscription = self.stores.subscriptions.insert(&new_subscription).await?;
        self.scheduler.schedule(&subscription)?;

        tracing::info!(
            subscription = %subscription.id,
            channel = %channel.name,
            cron = %subscription.check_frequency,
            "subscription created"
        );
        Ok(subscription)
    }

    /// Apply a partial update; timer changes take effect immediately.
    pub async fn update_subscription(
        &self,
        id: SubscriptionId,
        update: SubscriptionUpdate,
    ) -> Result<Subscription, ArchiveError> {
        if let Some(cron) = &update.check_frequency {
            parse_check_frequency(cron)?;
        }

        let subscription = self.stores.subscriptions.update(id, &update).await?;
        if update.affects_schedule() {
            self.scheduler.reschedule(&subscription)?;
        }
        Ok(subscription)
    }

    /// Disable a subscription and deterministically remove its timer.
    pub async fn pause_subscription(&self, id: SubscriptionId) -> Result<(), ArchiveError> {
        self.stores.subscriptions.set_enabled(id, false).await?;
        self.scheduler.unschedule(id);
        Ok(())
    }

    /// Re-enable a subscription; the next fire is computed from now.
    pub async fn resume_subscription(&self, id: SubscriptionId) -> Result<(), ArchiveError> {
        self.stores.subscriptions.set_enabled(id, true).await?;
        let subscription = self.stores.subscriptions.get(id).await?;
        self.scheduler.schedule(&subscription)?;
        Ok(())
    }

    /// Remove a subscription and its timer. Cataloged videos stay.
    pub async fn delete_subscription(&self, id: SubscriptionId) -> Result<(), ArchiveError> {
        self.scheduler.unschedule(id);
        self.stores.subscriptions.delete(id).await?;
        Ok(())
    }

    /// Queue a discovery run immediately, bypassing the timer. Coalesces
    /// with an already-pending run for the same subscription.
    pub async fn trigger_discovery_now(
        &self,
        id: SubscriptionId,
    ) -> Result<Enqueued, ArchiveError> {
        let subscription = self.stores.subscriptions.get(id).await?;
        let enqueued = self
            .stores
            .jobs
            .enqueue(&NewJob::discovery(subscription.id).with_priority(PRIORITY_SUBSCRIPTION))
            .await?;
        self.notify.notify_one();
        Ok(enqueued)
    }

    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>, ArchiveError> {
        Ok(self.stores.subscriptions.list_all().await?)
    }

    // ---- videos & downloads -------------------------------------------

    /// Queue a metadata-extraction job for a bare video URL, optionally
    /// followed by its download.
    pub async fn add_video(
        &self,
        url: &str,
        quality: Option<QualityPreference>,
        auto_download: bool,
    ) -> Result<Enqueued, ArchiveError> {
        if url.trim().is_empty() {
            return Err(ArchiveError::Validation("video URL is empty".into()));
        }
        let quality = quality.unwrap_or(self.settings.default_quality);
        let enqueued = self
            .stores
            .jobs
            .enqueue(&NewJob::extract_metadata(url, quality, auto_download))
            .await?;
        self.notify.notify_one();
        Ok(enqueued)
    }

    /// Queue a download for a cataloged video. An existing queued or active
    /// download for the same video is returned instead of duplicated.
    pub async fn enqueue_download(
        &self,
        video_id: VideoId,
        priority: i64,
        quality: Option<QualityPreference>,
    ) -> Result<Enqueued, ArchiveError> {
        let video = self.stores.catalog.get_video(video_id).await?;
        let quality = quality
            .or(video.quality)
            .unwrap_or(self.settings.default_quality);

        let enqueued = self
            .stores
            .jobs
            .enqueue(&NewJob::download(video_id, quality).with_priority(priority))
            .await?;
        self.notify.notify_one();
        Ok(enqueued)
    }

    /// Reset a failed job to queued.
    pub async fn retry_job(&self, id: JobId) -> Result<(), ArchiveError> {
        self.stores.jobs.retry(id).await?;
        self.notify.notify_one();
        Ok(())
    }

    /// Cooperatively pause an active download.
    ///
    /// The job row flips to `paused` first, then the executing worker is
    /// signalled; it acknowledges at the next adapter checkpoint by
    /// resetting the video and leaving the paused row alone.
    pub async fn pause_download(&self, id: JobId) -> Result<(), ArchiveError> {
        self.stores.jobs.pause(id).await?;
        self.pool.cancel_active(id);
        Ok(())
    }

    /// Return a paused download to the queue.
    pub async fn resume_download(&self, id: JobId) -> Result<(), ArchiveError> {
        self.stores.jobs.resume(id).await?;
        self.notify.notify_one();
        Ok(())
    }

    pub async fn get_job(&self, id: JobId) -> Result<Job, ArchiveError> {
        Ok(self.stores.jobs.get(id).await?)
    }

    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, ArchiveError> {
        Ok(self.stores.jobs.list(filter).await?)
    }

    pub async fn list_videos(&self, filter: &VideoFilter) -> Result<Vec<Video>, ArchiveError> {
        Ok(self.stores.catalog.list_videos(filter).await?)
    }

    // ---- status surfaces ----------------------------------------------

    pub async fn scheduler_status(&self) -> Result<SchedulerOverview, ArchiveError> {
        let status = self.scheduler.status();
        let counts = self.stores.jobs.counts().await?;
        Ok(SchedulerOverview {
            running: status.running,
            total_jobs: counts.total,
            next_fires: status.next_fires,
        })
    }

    pub fn backoff_status(&self) -> BackoffStatus {
        self.backoff.status()
    }

    pub async fn queue_counts(&self) -> Result<QueueCounts, ArchiveError> {
        Ok(self.stores.jobs.counts().await?)
    }

    pub async fn recent_discovery_events(
        &self,
        limit: u32,
    ) -> Result<Vec<DiscoveryEvent>, ArchiveError> {
        Ok(self.stores.discovery_log.recent(limit).await?)
    }
}
