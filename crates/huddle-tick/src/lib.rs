//! Fixed-period tick scheduler for Huddle.
//!
//! A game room runs its simulation on its own clock, independent of the
//! room actor's mailbox. [`TickScheduler`] is that clock: it wakes every
//! `period`, detects late wake-ups, decides how to reschedule after one,
//! and watches how much of the period the caller's work consumes.
//!
//! ```ignore
//! let mut ticks = TickScheduler::new(TickConfig::every(Duration::from_millis(30)));
//! loop {
//!     let info = ticks.next_tick().await;
//!     advance_bullets();
//!     ticks.record_tick_end();
//! }
//! ```
//!
//! All timing uses `tokio::time`, so tests can drive the scheduler with a
//! paused clock.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do after a wake-up that came in late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrunPolicy {
    /// Forget the missed ticks; the next one is a full period from now.
    #[default]
    Skip,
    /// Fire up to `max_catchup` missed ticks back to back, then fall back
    /// to `Skip`.
    CatchUp { max_catchup: u32 },
    /// Keep the original cadence; the next deadline may already be past.
    Keep,
}

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickConfig {
    /// Time between ticks.
    pub period: Duration,
    pub policy: OverrunPolicy,
    /// Fraction of the period (0.0–1.0) at which tick work is logged as
    /// approaching the budget.
    pub budget_warn_threshold: f64,
    /// Fraction of the period at which tick work is logged as over budget.
    pub budget_critical_threshold: f64,
    /// Upper bound of the random delay added before the first tick, so
    /// rooms created together do not tick in lockstep.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(30),
            policy: OverrunPolicy::default(),
            budget_warn_threshold: 0.80,
            budget_critical_threshold: 1.0,
            initial_jitter: Duration::from_millis(2),
        }
    }
}

impl TickConfig {
    /// Shortest accepted period.
    pub const MIN_PERIOD: Duration = Duration::from_millis(1);

    /// A config ticking every `period`, defaults elsewhere.
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            ..Default::default()
        }
    }

    /// Same config without first-tick jitter (deterministic tests).
    pub fn without_jitter(mut self) -> Self {
        self.initial_jitter = Duration::ZERO;
        self
    }

    /// Clamps out-of-range values. Called by [`TickScheduler::new`].
    ///
    /// - `period` raised to [`Self::MIN_PERIOD`].
    /// - Thresholds clamped to `0.0..=1.0`, warn never above critical.
    pub fn validated(mut self) -> Self {
        if self.period < Self::MIN_PERIOD {
            warn!(period = ?self.period, min = ?Self::MIN_PERIOD, "tick period too short, clamping");
            self.period = Self::MIN_PERIOD;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self.budget_critical_threshold = self.budget_critical_threshold.clamp(0.0, 1.0);
        if self.budget_warn_threshold > self.budget_critical_threshold {
            self.budget_warn_threshold = self.budget_critical_threshold;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info and metrics
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::next_tick`] for every tick that fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Starts at 1.
    pub tick: u64,
    /// Whether this wake-up came more than a tenth of a period late.
    pub overrun: bool,
    /// Ticks dropped because of this overrun.
    pub ticks_skipped: u64,
}

/// Counters accumulated over the scheduler's lifetime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Sum of the work time reported through `record_tick_end`.
    pub busy_time: Duration,
    pub max_tick_time: Duration,
    /// Work time of the last measured tick as a fraction of the period.
    pub last_utilization: f64,
}

impl TickMetrics {
    /// Mean work time per measured tick.
    pub fn mean_tick_time(&self) -> Duration {
        match u32::try_from(self.total_ticks) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.busy_time / n,
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-period tick clock. One per simulation task.
#[derive(Debug)]
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    deadline: Instant,
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();

        let jitter = if config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max = u64::try_from(config.initial_jitter.as_micros()).unwrap_or(u64::MAX);
            Duration::from_micros(rand::rng().random_range(0..max))
        };

        debug!(period = ?config.period, policy = ?config.policy, ?jitter, "tick scheduler created");

        Self {
            deadline: Instant::now() + config.period + jitter,
            config,
            tick_count: 0,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    /// Sleeps until the next tick is due.
    ///
    /// Cancel-safe: dropping the future before it resolves leaves the
    /// deadline untouched.
    pub async fn next_tick(&mut self) -> TickInfo {
        let due = self.deadline;
        time::sleep_until(due).await;

        let now = Instant::now();
        let period = self.config.period;
        let late_by = now.saturating_duration_since(due);
        let overrun = late_by > period / 10;
        let behind = whole_periods(late_by, period);
        let mut ticks_skipped = 0;

        self.deadline = match self.config.policy {
            OverrunPolicy::Skip => {
                ticks_skipped = behind;
                now + period
            }
            OverrunPolicy::CatchUp { max_catchup } if behind <= u64::from(max_catchup) => {
                due + period
            }
            OverrunPolicy::CatchUp { max_catchup } => {
                ticks_skipped = behind - u64::from(max_catchup);
                now + period
            }
            OverrunPolicy::Keep => due + period,
        };

        self.tick_count += 1;
        self.tick_start = Some(now);
        self.metrics.total_ticks += 1;
        self.metrics.total_skipped += ticks_skipped;
        if overrun {
            self.metrics.total_overruns += 1;
            warn!(
                tick = self.tick_count,
                late_ms = late_by.as_secs_f64() * 1000.0,
                skipped = ticks_skipped,
                policy = ?self.config.policy,
                "tick fired late"
            );
        }

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }

    /// Marks the end of the work done for the current tick.
    ///
    /// Without this call no budget warnings are logged and work-time
    /// metrics stay at zero.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let utilization = elapsed.as_secs_f64() / self.config.period.as_secs_f64();

        if utilization >= self.config.budget_critical_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick work exceeded its period"
            );
        } else if utilization >= self.config.budget_warn_threshold {
            debug!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick work approaching its period"
            );
        }

        self.metrics.last_utilization = utilization;
        self.metrics.busy_time += elapsed;
        self.metrics.max_tick_time = self.metrics.max_tick_time.max(elapsed);
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn period(&self) -> Duration {
        self.config.period
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }
}

fn whole_periods(span: Duration, period: Duration) -> u64 {
    u64::try_from(span.as_nanos() / period.as_nanos()).unwrap_or(u64::MAX)
}
