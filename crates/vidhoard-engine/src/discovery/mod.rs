//! Discovery and metadata-extraction execution.
//!
//! Consumes the two non-download job kinds. A discovery run polls one
//! subscription's listing, diffs it against the catalog by external id,
//! inserts survivors as pending videos, optionally queues their downloads,
//! and appends exactly one audit event whatever the outcome. Metadata
//! extraction resolves a bare URL into catalog rows the same way a
//! discovery hit would.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Notify;

use vidhoard_core::{
    BackoffGovernor, ContentSourcePort, DiscoveryOutcome, NewChannel, NewDiscoveryEvent, NewJob,
    NewVideo, PRIORITY_SUBSCRIPTION, QualityPreference, RepositoryError, SourceError, Stores,
    Subscription, SubscriptionId,
};

use crate::pool::ExecOutcome;

/// Per-run tallies, mirrored into the discovery event.
#[derive(Debug, Default)]
struct RunCounts {
    found: i64,
    added: i64,
    queued: i64,
    filtered: i64,
}

/// Executes discovery and metadata-extraction jobs.
pub struct DiscoveryRunner {
    stores: Stores,
    source: Arc<dyn ContentSourcePort>,
    backoff: Arc<BackoffGovernor>,
    /// Pulsed after download enqueues so idle download workers wake.
    notify: Arc<Notify>,
}

impl DiscoveryRunner {
    /// Create a runner over the given stores and source adapter.
    pub fn new(
        stores: Stores,
        source: Arc<dyn ContentSourcePort>,
        backoff: Arc<BackoffGovernor>,
        notify: Arc<Notify>,
    ) -> Self {
        Self {
            stores,
            source,
            backoff,
            notify,
        }
    }

    /// Run one discovery pass for a subscription.
    ///
    /// Items already cataloged are skipped entirely; discovery never
    /// refreshes metadata, which keeps repeated runs cheap and idempotent.
    /// An insert lost to a concurrently overlapping discovery of the same
    /// channel counts as a skip, not an error. `last_check` is updated even
    /// when the source is unreachable so the next timer tick does not
    /// hot-loop on a struggling source.
    pub async fn run_discovery(&self, subscription_id: SubscriptionId) -> ExecOutcome {
        let started = Instant::now();

        let subscription = match self.stores.subscriptions.get(subscription_id).await {
            Ok(subscription) => subscription,
            Err(RepositoryError::NotFound(_)) => {
                // Deleted between enqueue and claim
                return ExecOutcome::failed(format!("subscription {subscription_id} is gone"));
            }
            Err(e) => return ExecOutcome::failed(format!("loading subscription: {e}")),
        };

        let listing = self
            .source
            .list_recent_items(&subscription.source_url, subscription.latest_n_videos)
            .await;

        let items = match listing {
            Ok(items) => {
                self.backoff.record_success();
                items
            }
            Err(e) => {
                if e.is_transient() {
                    self.backoff.record_failure();
                }
                return self.finish_failed(&subscription, started, &e).await;
            }
        };

        let mut counts = RunCounts {
            found: items.len() as i64,
            ..RunCounts::default()
        };
        let mut last_error: Option<String> = None;

        for item in items {
            match self
                .stores
                .catalog
                .find_video_by_external_id(&item.external_id)
                .await
            {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    last_error = Some(e.to_string());
                    continue;
                }
            }

            if !subscription.wants(item.content_type) {
                counts.filtered += 1;
                continue;
            }

            let new_video = NewVideo::new(&item.external_id, subscription.channel_id, &item.title)
                .with_content_type(item.content_type)
                .with_quality(Some(subscription.quality))
                .with_upload_date(item.published_at);

            let video = match self.stores.catalog.insert_video(&new_video).await {
                Ok(video) => video,
                // Lost the race against an overlapping discovery sharing
                // this channel; the row exists, which is all we wanted
                Err(RepositoryError::AlreadyExists(_)) => continue,
                Err(e) => {
                    last_error = Some(e.to_string());
                    continue;
                }
            };
            counts.added += 1;

            if subscription.auto_download {
                let job = NewJob::download(video.id, subscription.quality)
                    .with_priority(PRIORITY_SUBSCRIPTION);
                match self.stores.jobs.enqueue(&job).await {
                    Ok(_) => counts.queued += 1,
                    Err(e) => last_error = Some(e.to_string()),
                }
            }
        }

        if counts.queued > 0 {
            self.notify.notify_waiters();
            self.notify.notify_one();
        }

        if let Err(e) = self
            .stores
            .subscriptions
            .record_check(subscription.id, Utc::now(), counts.added)
            .await
        {
            tracing::warn!(subscription = %subscription.id, error = %e, "recording check failed");
        }

        let outcome = if last_error.is_some() {
            DiscoveryOutcome::Partial
        } else {
            DiscoveryOutcome::Success
        };
        self.append_event(NewDiscoveryEvent {
            subscription_id: subscription.id,
            outcome,
            videos_found: counts.found,
            videos_added: counts.added,
            videos_queued: counts.queued,
            videos_filtered: counts.filtered,
            duration_ms: started.elapsed().as_millis() as i64,
            error: last_error,
        })
        .await;

        tracing::info!(
            subscription = %subscription.id,
            found = counts.found,
            added = counts.added,
            queued = counts.queued,
            filtered = counts.filtered,
            "discovery finished"
        );

        ExecOutcome::Completed(serde_json::json!({
            "videos_found": counts.found,
            "videos_added": counts.added,
            "videos_queued": counts.queued,
            "videos_filtered": counts.filtered,
        }))
    }

    /// Run one metadata-extraction job for a bare video URL.
    ///
    /// A URL that resolves to an already-cataloged video completes against
    /// the existing row instead of failing, so re-adding a known video is a
    /// harmless no-op.
    pub async fn run_extract(
        &self,
        url: &str,
        quality: QualityPreference,
        auto_download: bool,
    ) -> ExecOutcome {
        let probe = match self.source.probe_video(url).await {
            Ok(probe) => {
                self.backoff.record_success();
                probe
            }
            Err(e) if e.is_transient() => {
                self.backoff.record_failure();
                return ExecOutcome::requeue(format!("probing {url}: {e}"));
            }
            Err(e) => return ExecOutcome::failed(format!("probing {url}: {e}")),
        };

        let channel = match self
            .stores
            .catalog
            .upsert_channel(&NewChannel {
                external_id: probe.channel.channel_external_id.clone(),
                name: probe.channel.channel_name.clone(),
                description: probe.channel.description.clone(),
                subscriber_count: probe.channel.subscriber_count,
                thumbnail_path: None,
                extra_metadata: None,
            })
            .await
        {
            Ok(channel) => channel,
            Err(e) => return ExecOutcome::failed(format!("upserting channel: {e}")),
        };

        let new_video = NewVideo {
            external_id: probe.external_id.clone(),
            channel_id: channel.id,
            title: probe.title.clone(),
            description: probe.description.clone(),
            duration_secs: probe.duration_secs,
            upload_date: probe.upload_date,
            view_count: probe.view_count,
            like_count: probe.like_count,
            content_type: probe.content_type,
            quality: Some(quality),
            extra_metadata: None,
        };

        let (video, already_known) = match self.stores.catalog.insert_video(&new_video).await {
            Ok(video) => (video, false),
            Err(RepositoryError::AlreadyExists(_)) => {
                match self
                    .stores
                    .catalog
                    .find_video_by_external_id(&probe.external_id)
                    .await
                {
                    Ok(Some(video)) => (video, true),
                    Ok(None) => {
                        return ExecOutcome::failed(format!(
                            "video {} exists but could not be loaded",
                            probe.external_id
                        ));
                    }
                    Err(e) => return ExecOutcome::failed(format!("loading existing video: {e}")),
                }
            }
            Err(e) => return ExecOutcome::failed(format!("inserting video: {e}")),
        };

        let mut download_job = None;
        if auto_download {
            match self
                .stores
                .jobs
                .enqueue(&NewJob::download(video.id, quality))
                .await
            {
                Ok(enqueued) => {
                    download_job = Some(enqueued.id);
                    self.notify.notify_one();
                }
                Err(e) => return ExecOutcome::failed(format!("queueing download: {e}")),
            }
        }

        tracing::info!(
            video = %video.id,
            external_id = %probe.external_id,
            already_known,
            "metadata extracted"
        );
        ExecOutcome::Completed(serde_json::json!({
            "video_id": video.id,
            "already_known": already_known,
            "download_job": download_job,
        }))
    }

    /// Finish a discovery run whose listing never arrived.
    async fn finish_failed(
        &self,
        subscription: &Subscription,
        started: Instant,
        error: &SourceError,
    ) -> ExecOutcome {
        if let Err(e) = self
            .stores
            .subscriptions
            .record_check(subscription.id, Utc::now(), 0)
            .await
        {
            tracing::warn!(subscription = %subscription.id, error = %e, "recording check failed");
        }

        self.append_event(NewDiscoveryEvent::failed(
            subscription.id,
            started.elapsed().as_millis() as i64,
            error.to_string(),
        ))
        .await;

        tracing::warn!(subscription = %subscription.id, error = %error, "discovery failed");
        ExecOutcome::failed(format!("listing failed: {error}"))
    }

    async fn append_event(&self, event: NewDiscoveryEvent) {
        if let Err(e) = self.stores.discovery_log.append(&event).await {
            tracing::error!(
                subscription = %event.subscription_id,
                error = %e,
                "appending discovery event failed"
            );
        }
    }
}
