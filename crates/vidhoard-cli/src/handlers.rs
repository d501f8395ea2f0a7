//! Command handlers.
//!
//! Thin wrappers that translate parsed arguments into facade calls and
//! print the results.

use anyhow::Result;

use vidhoard_core::{JobFilter, JobId, JobStatus, QualityPreference};
use vidhoard_engine::NewSubscriptionRequest;

use crate::bootstrap::CliContext;

/// Run the acquisition service until Ctrl+C.
pub async fn serve(ctx: &CliContext) -> Result<()> {
    ctx.service.start().await?;
    tracing::info!(
        storage = %ctx.settings.storage_dir.display(),
        database = %ctx.settings.database_path.display(),
        "vidhoard running"
    );
    println!("vidhoard running; press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    ctx.service.shutdown();
    println!("stopped");
    Ok(())
}

/// Subscribe to a channel or playlist URL.
pub async fn subscribe(
    ctx: &CliContext,
    url: String,
    cron: Option<String>,
    quality: Option<String>,
    no_auto_download: bool,
) -> Result<()> {
    let mut request = NewSubscriptionRequest::new(url);
    request.check_frequency = cron;
    request.quality = parse_quality(quality.as_deref())?;
    request.auto_download = !no_auto_download;

    let subscription = ctx.service.create_subscription(request).await?;
    println!(
        "Subscribed #{} to {} (checks: '{}', auto-download: {})",
        subscription.id,
        subscription.source_url,
        subscription.check_frequency,
        subscription.auto_download
    );
    println!("Run `vidhoard serve` to start checking.");
    Ok(())
}

/// Queue a single video URL.
pub async fn add(
    ctx: &CliContext,
    url: String,
    quality: Option<String>,
    no_download: bool,
) -> Result<()> {
    let quality = parse_quality(quality.as_deref())?;
    let enqueued = ctx.service.add_video(&url, quality, !no_download).await?;
    println!("Queued metadata job #{}", enqueued.id);
    Ok(())
}

/// Print queue, backoff and recent discovery activity.
pub async fn status(ctx: &CliContext) -> Result<()> {
    let counts = ctx.service.queue_counts().await?;
    println!(
        "Jobs: {} total, {} queued, {} active, {} completed, {} failed, {} paused",
        counts.total, counts.queued, counts.active, counts.completed, counts.failed, counts.paused
    );

    let backoff = ctx.service.backoff_status();
    if backoff.is_backing_off {
        println!(
            "Source backing off: {} consecutive failures, retrying in {}s",
            backoff.failure_count, backoff.next_available_in_secs
        );
    }

    let failed = ctx
        .service
        .list_jobs(&JobFilter {
            status: Some(JobStatus::Failed),
            ..JobFilter::default()
        })
        .await?;
    if !failed.is_empty() {
        println!("Failed jobs (retry with `vidhoard retry <id>`):");
        for job in failed {
            println!(
                "  #{}: {}",
                job.id,
                job.error_message.unwrap_or_else(|| "unknown error".to_string())
            );
        }
    }

    let events = ctx.service.recent_discovery_events(5).await?;
    if !events.is_empty() {
        println!("Recent discovery runs:");
        for event in events {
            println!(
                "  [{}] sub #{}: {} — {} found, {} added, {} queued, {} filtered",
                event.created_at.format("%Y-%m-%d %H:%M:%S"),
                event.subscription_id,
                event.outcome.as_str(),
                event.videos_found,
                event.videos_added,
                event.videos_queued,
                event.videos_filtered
            );
        }
    }
    Ok(())
}

/// List subscriptions.
pub async fn subs(ctx: &CliContext) -> Result<()> {
    let subscriptions = ctx.service.list_subscriptions().await?;
    if subscriptions.is_empty() {
        println!("No subscriptions. Add one with `vidhoard subscribe <url>`.");
        return Ok(());
    }

    for sub in subscriptions {
        let last_check = sub
            .last_check
            .map_or_else(|| "never".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());
        println!(
            "#{} {} [{}] enabled={} auto={} quality={} checks='{}' last={} new={}",
            sub.id,
            sub.source_url,
            sub.kind.as_str(),
            sub.enabled,
            sub.auto_download,
            sub.quality,
            sub.check_frequency,
            last_check,
            sub.new_videos_count
        );
    }
    Ok(())
}

/// Reset a failed job to queued.
pub async fn retry(ctx: &CliContext, job_id: i64) -> Result<()> {
    ctx.service.retry_job(JobId(job_id)).await?;
    println!("Job #{job_id} re-queued");
    Ok(())
}

fn parse_quality(raw: Option<&str>) -> Result<Option<QualityPreference>> {
    match raw {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|()| anyhow::anyhow!("unknown quality '{s}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quality() {
        assert_eq!(parse_quality(None).unwrap(), None);
        assert_eq!(
            parse_quality(Some("720p")).unwrap(),
            Some(QualityPreference::P720)
        );
        assert!(parse_quality(Some("potato")).is_err());
    }
}
