//! Integration tests for the fixed-period tick scheduler.
//!
//! Every async test runs on a paused Tokio clock: `sleep_until` resolves
//! as soon as the runtime is idle, and `tokio::time::advance` simulates a
//! caller that overslept.

use std::time::Duration;

use huddle_tick::{OverrunPolicy, TickConfig, TickScheduler};
use tokio::time::Instant;

const PERIOD: Duration = Duration::from_millis(30);

fn scheduler(policy: OverrunPolicy) -> TickScheduler {
    TickScheduler::new(TickConfig {
        policy,
        ..TickConfig::every(PERIOD).without_jitter()
    })
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_matches_game_tick() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.period, PERIOD);
    assert_eq!(cfg.policy, OverrunPolicy::Skip);
    assert!(cfg.initial_jitter > Duration::ZERO);
}

#[test]
fn test_scheduler_initial_state() {
    let s = scheduler(OverrunPolicy::Skip);
    assert_eq!(s.tick_count(), 0);
    assert_eq!(s.period(), PERIOD);
    assert_eq!(s.metrics().total_ticks, 0);
    assert_eq!(s.metrics().max_tick_time, Duration::ZERO);
}

// =========================================================================
// Tick firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ticks_fire_once_per_period() {
    let start = Instant::now();
    let mut s = scheduler(OverrunPolicy::Skip);

    for expected in 1..=5u64 {
        let info = s.next_tick().await;
        assert_eq!(info.tick, expected);
        assert!(!info.overrun);
        assert_eq!(info.ticks_skipped, 0);
        assert_eq!(Instant::now() - start, PERIOD * expected as u32);
    }
    assert_eq!(s.tick_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_first_tick_jitter_is_bounded() {
    let start = Instant::now();
    let mut s = TickScheduler::new(TickConfig {
        initial_jitter: Duration::from_millis(5),
        ..TickConfig::every(PERIOD)
    });

    s.next_tick().await;
    let waited = Instant::now() - start;
    assert!(waited >= PERIOD);
    assert!(waited < PERIOD + Duration::from_millis(5));
}

// =========================================================================
// Overrun policies
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_skip_policy_reschedules_from_now() {
    let start = Instant::now();
    let mut s = scheduler(OverrunPolicy::Skip);

    tokio::time::advance(Duration::from_millis(100)).await;
    let info = s.next_tick().await;
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 2);

    let info = s.next_tick().await;
    assert!(!info.overrun);
    assert_eq!(Instant::now() - start, Duration::from_millis(130));
    assert_eq!(s.metrics().total_overruns, 1);
    assert_eq!(s.metrics().total_skipped, 2);
}

#[tokio::test(start_paused = true)]
async fn test_catchup_policy_fires_missed_ticks_back_to_back() {
    let mut s = scheduler(OverrunPolicy::CatchUp { max_catchup: 3 });

    tokio::time::advance(Duration::from_millis(100)).await;
    let late = Instant::now();

    let info = s.next_tick().await;
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 0);

    // Deadline stayed on the original grid (60ms), already in the past.
    s.next_tick().await;
    assert_eq!(Instant::now(), late);
}

#[tokio::test(start_paused = true)]
async fn test_catchup_policy_beyond_cap_skips() {
    let mut s = scheduler(OverrunPolicy::CatchUp { max_catchup: 1 });

    tokio::time::advance(Duration::from_millis(130)).await;
    let info = s.next_tick().await;
    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 2, "3 periods behind, 1 caught up");
}

#[tokio::test(start_paused = true)]
async fn test_keep_policy_holds_original_cadence() {
    let start = Instant::now();
    let mut s = scheduler(OverrunPolicy::Keep);

    tokio::time::advance(Duration::from_millis(50)).await;
    let info = s.next_tick().await;
    assert!(info.overrun);

    s.next_tick().await;
    assert_eq!(Instant::now() - start, Duration::from_millis(60));
}

// =========================================================================
// Metrics and budget
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_measures_work() {
    let mut s = scheduler(OverrunPolicy::Skip);

    s.next_tick().await;
    tokio::time::advance(Duration::from_millis(6)).await;
    s.record_tick_end();

    s.next_tick().await;
    tokio::time::advance(Duration::from_millis(24)).await;
    s.record_tick_end();

    let m = s.metrics();
    assert_eq!(m.total_ticks, 2);
    assert_eq!(m.max_tick_time, Duration::from_millis(24));
    assert_eq!(m.mean_tick_time(), Duration::from_millis(15));
    assert!((m.last_utilization - 0.8).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_without_tick_is_noop() {
    let mut s = scheduler(OverrunPolicy::Skip);
    s.record_tick_end();
    assert_eq!(s.metrics().busy_time, Duration::ZERO);
}

// =========================================================================
// select! loop (how the simulation task uses it)
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_select_loop_pattern() {
    let mut s = scheduler(OverrunPolicy::Skip);
    let (tx, mut rx) = tokio::sync::mpsc::channel::<&str>(1);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send("stop").await.ok();
    });

    let mut fired = 0u64;
    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                assert_eq!(cmd, "stop");
                break;
            }
            info = s.next_tick() => {
                fired += 1;
                assert_eq!(info.tick, fired);
                s.record_tick_end();
            }
        }
    }

    assert_eq!(fired, 3);
}
