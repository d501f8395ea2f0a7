//! Process-wide backoff governor for the content source.
//!
//! Tracks consecutive failures against the upstream source and, past a
//! threshold, opens an exponentially growing delay window that all workers
//! must respect before their next source call. The state is shared across
//! discovery and download workers because the constraint it models (one
//! upstream's rate tolerance) is global, not per-subscription.

use serde::{Deserialize, Serialize};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Configuration for the backoff governor.
#[derive(Clone, Copy, Debug)]
pub struct BackoffConfig {
    /// Delay of the first window once the threshold is reached.
    pub base_delay: Duration,
    /// Upper bound on the window length.
    pub max_delay: Duration,
    /// Consecutive failures tolerated before a window opens.
    pub failure_threshold: u32,
    /// Relative jitter applied to each window. Clamped to 0.25 so the
    /// doubling always dominates and windows stay non-decreasing.
    pub jitter_ratio: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(30),
            max_delay: Duration::from_secs(900),
            failure_threshold: 3,
            jitter_ratio: 0.2,
        }
    }
}

/// Externally visible backoff state, for status surfaces.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackoffStatus {
    /// Whether a delay window is currently open.
    pub is_backing_off: bool,
    /// Current consecutive-failure count.
    pub failure_count: u32,
    /// Seconds until source calls should proceed again (0 when available).
    pub next_available_in_secs: u64,
}

#[derive(Debug, Default)]
struct State {
    consecutive_failures: u32,
    window_until: Option<Instant>,
}

/// Shared failure tracker gating all calls into the content source.
///
/// Methods are synchronous and cheap; the internal lock is never held across
/// I/O. Callers check [`BackoffGovernor::is_available`] before a source call
/// and defer their work when it returns false.
#[derive(Debug)]
pub struct BackoffGovernor {
    config: BackoffConfig,
    state: Mutex<State>,
}

impl BackoffGovernor {
    /// Create a governor with the given configuration.
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::default()),
        }
    }

    /// Record a successful source call: resets the failure counter and
    /// closes any open window.
    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if state.consecutive_failures > 0 {
            tracing::debug!(
                failures = state.consecutive_failures,
                "source recovered, clearing backoff"
            );
        }
        state.consecutive_failures = 0;
        state.window_until = None;
    }

    /// Record a failed source call; opens or extends the delay window once
    /// the failure threshold is reached.
    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        if state.consecutive_failures < self.config.failure_threshold {
            return;
        }

        let delay = self.window_for(state.consecutive_failures);
        state.window_until = Some(Instant::now() + delay);
        tracing::warn!(
            failures = state.consecutive_failures,
            delay_secs = delay.as_secs(),
            "source failing repeatedly, backing off"
        );
    }

    /// Whether callers may proceed with a source call right now.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.next_available_in().is_zero()
    }

    /// Time remaining until the window closes; zero when available.
    #[must_use]
    pub fn next_available_in(&self) -> Duration {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state
            .window_until
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    /// Snapshot for status surfaces.
    #[must_use]
    pub fn status(&self) -> BackoffStatus {
        let remaining = self.next_available_in();
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        BackoffStatus {
            is_backing_off: !remaining.is_zero(),
            failure_count: state.consecutive_failures,
            next_available_in_secs: remaining.as_secs(),
        }
    }

    /// Window length for the nth consecutive failure:
    /// `min(max_delay, base_delay * 2^(n-1) * jitter)`.
    fn window_for(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(32);
        let raw = self.config.base_delay.as_secs_f64() * 2f64.powi(exp as i32);
        let jittered = raw * self.jitter_factor(failures);
        Duration::from_secs_f64(jittered.min(self.config.max_delay.as_secs_f64()))
    }

    /// Deterministic jitter factor in [1 - ratio, 1 + ratio], derived from a
    /// hash of the failure count so repeated runs are reproducible.
    fn jitter_factor(&self, failures: u32) -> f64 {
        let ratio = self.config.jitter_ratio.clamp(0.0, 0.25);
        if ratio == 0.0 {
            return 1.0;
        }
        let mut hasher = DefaultHasher::default();
        failures.hash(&mut hasher);
        let unit = (hasher.finish() as f64) / (u64::MAX as f64);
        1.0 - ratio + 2.0 * ratio * unit
    }
}

impl Default for BackoffGovernor {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn governor(base_secs: u64, max_secs: u64, threshold: u32) -> BackoffGovernor {
        BackoffGovernor::new(BackoffConfig {
            base_delay: Duration::from_secs(base_secs),
            max_delay: Duration::from_secs(max_secs),
            failure_threshold: threshold,
            jitter_ratio: 0.2,
        })
    }

    #[test]
    fn test_available_before_threshold() {
        let governor = governor(10, 600, 3);
        governor.record_failure();
        governor.record_failure();
        assert!(governor.is_available());
        assert_eq!(governor.next_available_in(), Duration::ZERO);
    }

    #[test]
    fn test_window_opens_at_threshold() {
        let governor = governor(10, 600, 3);
        for _ in 0..3 {
            governor.record_failure();
        }
        assert!(!governor.is_available());
        assert!(governor.next_available_in() > Duration::ZERO);
    }

    #[test]
    fn test_windows_are_non_decreasing_up_to_cap() {
        let governor = governor(1, 60, 1);
        let mut last = Duration::ZERO;
        for _ in 0..12 {
            governor.record_failure();
            let next = governor.next_available_in();
            assert!(next >= last, "window shrank: {next:?} < {last:?}");
            last = next;
        }
        // Far past the doubling range the cap binds
        assert!(last <= Duration::from_secs(60));
        assert!(last >= Duration::from_secs(40));
    }

    #[test]
    fn test_success_resets_everything() {
        let governor = governor(10, 600, 1);
        governor.record_failure();
        governor.record_failure();
        assert!(!governor.is_available());

        governor.record_success();
        assert!(governor.is_available());
        assert_eq!(governor.next_available_in(), Duration::ZERO);

        let status = governor.status();
        assert!(!status.is_backing_off);
        assert_eq!(status.failure_count, 0);
        assert_eq!(status.next_available_in_secs, 0);
    }

    #[test]
    fn test_status_reflects_backoff() {
        let governor = governor(30, 600, 1);
        governor.record_failure();
        let status = governor.status();
        assert!(status.is_backing_off);
        assert_eq!(status.failure_count, 1);
        assert!(status.next_available_in_secs > 0);
    }

    #[test]
    fn test_jitter_factor_bounds() {
        let governor = governor(10, 600, 1);
        for n in 1..50 {
            let factor = governor.jitter_factor(n);
            assert!((0.75..=1.25).contains(&factor), "factor {factor} out of bounds");
        }
    }
}
