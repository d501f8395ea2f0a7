//! Subscription scheduler.
//!
//! One timer task per enabled subscription, derived from its cron
//! expression. A firing timer only enqueues a discovery job and re-arms; it
//! never performs source I/O, so a slow discovery can never delay other
//! subscriptions' timers. Timers are rebuilt from the subscription rows at
//! startup; they are not persisted themselves.

use chrono::{DateTime, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use vidhoard_core::{JobQueuePort, NewJob, Subscription, SubscriptionId, SubscriptionStorePort};

/// Scheduling errors.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The cron expression could not be parsed. Subscriptions with a bad
    /// expression fail closed: logged and left unscheduled.
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },
}

/// Parse a subscription's check frequency into a [`Schedule`].
///
/// Subscriptions store standard 5-field crontab expressions; the parser
/// works on 6/7-field expressions with a seconds column, so a seconds field
/// of `0` is prepended to 5-field input. 6- and 7-field expressions are
/// accepted as-is.
pub fn parse_check_frequency(expression: &str) -> Result<Schedule, ScheduleError> {
    let trimmed = expression.trim();
    let fields = trimmed.split_whitespace().count();

    let normalized = match fields {
        5 => format!("0 {trimmed}"),
        6 | 7 => trimmed.to_string(),
        n => {
            return Err(ScheduleError::InvalidCron {
                expression: expression.to_string(),
                reason: format!("expected 5 fields, got {n}"),
            });
        }
    };

    Schedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidCron {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Upcoming fire time of one subscription's timer.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct NextFire {
    pub subscription_id: SubscriptionId,
    pub next_fire: DateTime<Utc>,
}

/// Scheduler state for status surfaces.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub next_fires: Vec<NextFire>,
}

/// Manages the per-subscription discovery timers.
pub struct SubscriptionScheduler {
    jobs: Arc<dyn JobQueuePort>,
    subscriptions: Arc<dyn SubscriptionStorePort>,
    /// Pulsed after each enqueue so idle workers wake immediately.
    notify: Arc<Notify>,
    timers: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
    next_fires: Arc<Mutex<HashMap<SubscriptionId, DateTime<Utc>>>>,
    running: AtomicBool,
}

impl SubscriptionScheduler {
    /// Create a scheduler with no timers armed.
    pub fn new(
        jobs: Arc<dyn JobQueuePort>,
        subscriptions: Arc<dyn SubscriptionStorePort>,
        notify: Arc<Notify>,
    ) -> Self {
        Self {
            jobs,
            subscriptions,
            notify,
            timers: Mutex::new(HashMap::new()),
            next_fires: Arc::new(Mutex::new(HashMap::new())),
            running: AtomicBool::new(false),
        }
    }

    /// Rebuild all timers from persisted enabled subscriptions.
    ///
    /// A subscription with an unparseable cron expression is logged and
    /// skipped; startup never fails because of one bad row.
    pub async fn start(&self) -> Result<(), vidhoard_core::RepositoryError> {
        let subscriptions = self.subscriptions.list_enabled().await?;
        let total = subscriptions.len();
        let mut scheduled = 0usize;

        for subscription in &subscriptions {
            match self.schedule(subscription) {
                Ok(()) => scheduled += 1,
                Err(e) => {
                    tracing::error!(
                        subscription = %subscription.id,
                        error = %e,
                        "skipping subscription with invalid schedule"
                    );
                }
            }
        }

        self.running.store(true, Ordering::SeqCst);
        tracing::info!(scheduled, total, "subscription scheduler started");
        Ok(())
    }

    /// Register (or replace) the timer for one subscription.
    ///
    /// Computes the next fire time from "now" using the stored cron
    /// expression, so re-enabling never resurrects a stale pre-disable time.
    pub fn schedule(&self, subscription: &Subscription) -> Result<(), ScheduleError> {
        if !subscription.enabled {
            self.unschedule(subscription.id);
            return Ok(());
        }

        let schedule = parse_check_frequency(&subscription.check_frequency)?;
        // Replace any existing timer before arming the new one
        self.unschedule(subscription.id);

        let id = subscription.id;
        let jobs = Arc::clone(&self.jobs);
        let notify = Arc::clone(&self.notify);
        let next_fires = Arc::clone(&self.next_fires);

        let handle = tokio::spawn(async move {
            timer_loop(id, schedule, jobs, notify, next_fires).await;
        });

        self.timers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(id, handle);

        tracing::info!(
            subscription = %subscription.id,
            cron = %subscription.check_frequency,
            "scheduled subscription"
        );
        Ok(())
    }

    /// Cancel a subscription's timer. No-op when none is armed.
    pub fn unschedule(&self, id: SubscriptionId) {
        let handle = self
            .timers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&id);

        if let Some(handle) = handle {
            handle.abort();
            tracing::info!(subscription = %id, "unscheduled subscription");
        }

        self.next_fires
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&id);
    }

    /// Unschedule + schedule; used whenever the cron expression or enabled
    /// flag changes.
    pub fn reschedule(&self, subscription: &Subscription) -> Result<(), ScheduleError> {
        self.unschedule(subscription.id);
        self.schedule(subscription)
    }

    /// Abort all timers.
    pub fn shutdown(&self) {
        let handles: Vec<_> = self
            .timers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain()
            .collect();
        for (_, handle) in handles {
            handle.abort();
        }
        self.next_fires
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("subscription scheduler stopped");
    }

    /// Whether `start` has run.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current timer state for status surfaces.
    pub fn status(&self) -> SchedulerStatus {
        let mut next_fires: Vec<NextFire> = self
            .next_fires
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(|(id, at)| NextFire {
                subscription_id: *id,
                next_fire: *at,
            })
            .collect();
        next_fires.sort_by_key(|f| f.next_fire);

        SchedulerStatus {
            running: self.is_running(),
            next_fires,
        }
    }

    /// The next fire time recorded for one subscription, if armed.
    pub fn next_fire(&self, id: SubscriptionId) -> Option<DateTime<Utc>> {
        self.next_fires
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&id)
            .copied()
    }
}

impl Drop for SubscriptionScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The per-subscription timer: sleep to the next occurrence, enqueue a
/// discovery job, re-arm. Enqueue coalescing in the queue collapses missed
/// or overlapping fires into one pending run.
async fn timer_loop(
    id: SubscriptionId,
    schedule: Schedule,
    jobs: Arc<dyn JobQueuePort>,
    notify: Arc<Notify>,
    next_fires: Arc<Mutex<HashMap<SubscriptionId, DateTime<Utc>>>>,
) {
    loop {
        let now = Utc::now();
        let Some(next) = schedule.after(&now).next() else {
            tracing::warn!(subscription = %id, "cron schedule has no upcoming occurrence");
            break;
        };

        next_fires
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(id, next);

        let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(delay).await;

        match jobs.enqueue(&NewJob::discovery(id)).await {
            Ok(enqueued) => {
                if enqueued.coalesced {
                    tracing::debug!(
                        subscription = %id,
                        job = %enqueued.id,
                        "discovery already pending, coalesced timer fire"
                    );
                } else {
                    tracing::info!(subscription = %id, job = %enqueued.id, "discovery due");
                }
                notify.notify_one();
            }
            Err(e) => {
                tracing::error!(subscription = %id, error = %e, "failed to enqueue discovery");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_five_field_crontab() {
        let schedule = parse_check_frequency("0 * * * *").unwrap();
        assert!(schedule.upcoming(Utc).next().is_some());

        let schedule = parse_check_frequency("*/15 2,14 * * 1-5").unwrap();
        assert!(schedule.upcoming(Utc).next().is_some());
    }

    #[test]
    fn test_parse_accepts_seconds_field() {
        assert!(parse_check_frequency("*/2 * * * * *").is_ok());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_check_frequency("not a cron"),
            Err(ScheduleError::InvalidCron { .. })
        ));
        assert!(parse_check_frequency("* * *").is_err());
        assert!(parse_check_frequency("61 * * * *").is_err());
    }

    #[test]
    fn test_parse_hourly_next_fire_is_on_the_hour() {
        let schedule = parse_check_frequency("0 * * * *").unwrap();
        let next = schedule.upcoming(Utc).next().unwrap();
        assert_eq!(next.timestamp() % 3600, 0);
    }
}
