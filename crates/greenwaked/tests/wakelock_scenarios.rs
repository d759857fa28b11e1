//! End-to-end scenarios for the wake-lock state machine.
//!
//! All tests run on a paused tokio clock so the status tick and the timers
//! advance deterministically, against a mock power lock that counts backend
//! calls.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{advance, device_event, program_mode_config, started, wol_event};
use greenwake_common::event::EventType;
use greenwake_common::strategy::{SleepMode, Strategy};

// ── Daemon scenarios ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn idle_program_mode_suspends_exactly_once() {
    let cfg = program_mode_config();
    let (core, counters) = started(&cfg);

    advance(31).await;

    assert_eq!(counters.force_sleeps(), 1);
    assert_eq!(counters.acquires(), 0);
    assert!(!counters.held());

    core.stop();
}

#[tokio::test(start_paused = true)]
async fn wol_packet_refreshes_the_wake_window() {
    let cfg = program_mode_config();
    let (core, counters) = started(&cfg);

    advance(10).await;
    core.handle_wake_event(wol_event());

    assert_eq!(counters.acquires(), 1);
    assert!(counters.held());
    assert!(core.snapshot().is_temporary_wake);

    // Held through the whole 300 s temporary-wake window.
    advance(299).await; // t = 309
    assert!(counters.held());
    assert_eq!(counters.force_sleeps(), 0);

    // Released when the window expires at t = 310.
    advance(2).await; // t = 311
    assert!(!counters.held());
    assert!(!core.snapshot().is_temporary_wake);

    // No suspend before the idle grace period has elapsed on top.
    advance(28).await; // t = 339
    assert_eq!(counters.force_sleeps(), 0);

    // Status tick re-armed the sleep timer; it fires within tick granularity.
    advance(6).await; // t = 345
    assert_eq!(counters.force_sleeps(), 1);

    core.stop();
}

#[tokio::test(start_paused = true)]
async fn consecutive_events_extend_the_window() {
    let cfg = program_mode_config();
    let (core, counters) = started(&cfg);

    core.handle_wake_event(wol_event());
    advance(100).await;
    core.handle_wake_event(device_event());

    // The first event's expiry (t = 300) must not release: the second event
    // refreshed the window to t = 400.
    advance(250).await; // t = 350
    assert!(counters.held());
    assert!(core.snapshot().is_temporary_wake);

    advance(51).await; // t = 401
    assert!(!counters.held());

    core.stop();
}

#[tokio::test(start_paused = true)]
async fn timed_strategy_expires_back_to_external_wake() {
    let cfg = program_mode_config();
    let (core, counters) = started(&cfg);

    core.set_strategy(Strategy::Timed, Duration::from_secs(2));
    assert_eq!(counters.acquires(), 1);
    assert!(counters.held());
    assert_eq!(core.strategy(), Strategy::Timed);

    advance(3).await;

    assert!(!counters.held());
    assert_eq!(core.strategy(), Strategy::ExternalWake);

    core.stop();
}

#[tokio::test(start_paused = true)]
async fn timed_expiry_during_temporary_wake_keeps_assertion() {
    let cfg = program_mode_config();
    let (core, counters) = started(&cfg);

    core.set_strategy(Strategy::Timed, Duration::from_secs(60));
    advance(30).await;
    core.handle_wake_event(wol_event()); // wake window until t = 330

    advance(31).await; // t = 61: timed strategy expired
    assert_eq!(core.strategy(), Strategy::ExternalWake);
    assert!(counters.held());

    advance(270).await; // t = 331: wake window expired
    assert!(!counters.held());

    core.stop();
}

#[tokio::test(start_paused = true)]
async fn switching_to_system_mode_cancels_pending_suspend() {
    let cfg = program_mode_config();
    let (core, counters) = started(&cfg);

    // Let the status tick arm a sleep timer.
    advance(1).await;
    assert!(core.snapshot().sleep_pending_in.is_some());
    let held_before = counters.held();

    core.set_sleep_mode(SleepMode::System);
    assert!(core.snapshot().sleep_pending_in.is_none());

    // Tick loop is gone: nothing re-arms, nothing suspends.
    advance(120).await;
    assert!(core.snapshot().sleep_pending_in.is_none());
    assert_eq!(counters.force_sleeps(), 0);
    assert_eq!(counters.held(), held_before);

    core.stop();
}

#[tokio::test(start_paused = true)]
async fn filtered_event_types_are_dropped_without_side_effects() {
    let mut cfg = program_mode_config();
    cfg.sleep_mode = SleepMode::System;
    cfg.external_wake.valid_events = "wol".to_string();
    let (core, counters) = started(&cfg);

    core.handle_wake_event(device_event());

    assert_eq!(counters.acquires(), 0);
    assert!(!core.snapshot().is_temporary_wake);
    assert!(core.last_wake_event().is_none());

    // The accepted type still works.
    core.handle_wake_event(wol_event());
    assert_eq!(counters.acquires(), 1);
    assert_eq!(
        core.last_wake_event().map(|e| e.event_type),
        Some(EventType::Wol)
    );

    core.stop();
}

// ── Properties ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn repeated_set_strategy_is_idempotent() {
    let mut cfg = program_mode_config();
    cfg.sleep_mode = SleepMode::System;
    let (core, counters) = started(&cfg);
    let baseline_releases = counters.releases();

    core.set_strategy(Strategy::Permanent, Duration::ZERO);
    core.set_strategy(Strategy::Permanent, Duration::ZERO);
    assert_eq!(counters.acquires(), 1);

    let d = Duration::from_secs(600);
    core.set_strategy(Strategy::Timed, d);
    core.set_strategy(Strategy::Timed, d);
    assert_eq!(counters.acquires(), 2);
    assert_eq!(counters.releases(), baseline_releases);

    core.stop();
}

#[tokio::test(start_paused = true)]
async fn permanent_strategy_holds_and_clears_timers() {
    let cfg = program_mode_config();
    let (core, counters) = started(&cfg);

    // Arm a sleep timer first, then go permanent over it.
    advance(1).await;
    assert!(core.snapshot().sleep_pending_in.is_some());

    core.set_strategy(Strategy::Permanent, Duration::ZERO);
    assert!(counters.held());
    assert!(core.snapshot().sleep_pending_in.is_none());

    // Nothing suspends a permanent-wake host.
    advance(600).await;
    assert_eq!(counters.force_sleeps(), 0);
    assert!(counters.held());

    core.stop();
}

#[tokio::test(start_paused = true)]
async fn delays_are_clamped_to_the_floor() {
    let mut cfg = program_mode_config();
    cfg.sleep_mode = SleepMode::System;
    cfg.program_sleep_delay = 5;
    cfg.external_wake.timeout_secs = 12;
    let (core, _counters) = started(&cfg);

    assert_eq!(core.program_sleep_delay(), 30);
    assert_eq!(core.timeout_secs(), 30);

    core.set_program_sleep_delay(10);
    core.set_timeout_secs(3);
    assert_eq!(core.program_sleep_delay(), 30);
    assert_eq!(core.timeout_secs(), 30);

    core.set_program_sleep_delay(90);
    assert_eq!(core.program_sleep_delay(), 90);

    core.stop();
}

#[tokio::test(start_paused = true)]
async fn invalid_timed_duration_is_rejected() {
    let mut cfg = program_mode_config();
    cfg.sleep_mode = SleepMode::System;
    let (core, counters) = started(&cfg);

    let saves = Arc::new(AtomicUsize::new(0));
    let saves_in_cb = Arc::clone(&saves);
    core.set_save_config_callback(Box::new(move |_| {
        saves_in_cb.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    core.set_strategy(Strategy::Timed, Duration::ZERO);

    assert_eq!(core.strategy(), Strategy::ExternalWake);
    assert_eq!(counters.acquires(), 0);
    assert_eq!(saves.load(Ordering::SeqCst), 0);

    // A valid transition persists.
    core.set_strategy(Strategy::Permanent, Duration::ZERO);
    assert_eq!(saves.load(Ordering::SeqCst), 1);

    core.stop();
}

#[tokio::test(start_paused = true)]
async fn temporary_wake_blocks_the_sleep_timer() {
    let cfg = program_mode_config();
    let (core, _counters) = started(&cfg);

    core.handle_wake_event(wol_event());

    // While the temporary wake is active no sleep timer may exist.
    for _ in 0..20 {
        advance(10).await;
        let snapshot = core.snapshot();
        if snapshot.is_temporary_wake {
            assert!(snapshot.sleep_pending_in.is_none());
        }
    }

    core.stop();
}

#[tokio::test(start_paused = true)]
async fn timed_remaining_time_counts_down() {
    let mut cfg = program_mode_config();
    cfg.sleep_mode = SleepMode::System;
    let (core, _counters) = started(&cfg);

    core.set_strategy(Strategy::Timed, Duration::from_secs(90));
    advance(30).await;

    let remaining = core.remaining_time();
    assert!(remaining <= Duration::from_secs(60));
    assert!(remaining > Duration::from_secs(55));
    assert_eq!(core.format_remaining_time(), "00:01:00");

    advance(61).await;
    assert_eq!(core.remaining_time(), Duration::ZERO);
    assert_eq!(core.format_remaining_time(), "00:00:00");

    core.stop();
}

#[tokio::test(start_paused = true)]
async fn stop_releases_and_freezes_the_service() {
    let cfg = program_mode_config();
    let (core, counters) = started(&cfg);

    core.set_strategy(Strategy::Permanent, Duration::ZERO);
    assert!(counters.held());

    core.stop();
    assert!(!counters.held());

    // A stopped service ignores everything.
    core.handle_wake_event(wol_event());
    core.set_strategy(Strategy::Permanent, Duration::ZERO);
    assert!(!counters.held());

    advance(600).await;
    assert_eq!(counters.force_sleeps(), 0);
}

#[tokio::test(start_paused = true)]
async fn update_callback_sees_post_transition_state() {
    let mut cfg = program_mode_config();
    cfg.sleep_mode = SleepMode::System;
    let (core, _counters) = started(&cfg);

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_in_cb = Arc::clone(&seen);
    core.set_update_callback(Box::new(move |snapshot| {
        seen_in_cb.lock().unwrap().push(snapshot.strategy);
    }));

    core.set_strategy(Strategy::Permanent, Duration::ZERO);
    core.set_strategy(Strategy::ExternalWake, Duration::ZERO);

    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[Strategy::Permanent, Strategy::ExternalWake]
    );

    core.stop();
}
