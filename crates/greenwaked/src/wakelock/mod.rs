//! Wake-lock core: strategy state machine, timers, and the status tick.
//!
//! Every mutator and every timer callback serializes on one mutex; the
//! critical sections never await, so the spawned timer tasks only touch the
//! lock when they fire. Observer callbacks run inside the critical section
//! (they must see the post-transition state) and receive a snapshot instead
//! of a core handle, since a callback that called back into the core would
//! deadlock.
//!
//! Timer discipline: the sleep timer and the timed timer are exclusive
//! singletons. Arming bumps a generation counter and aborts the previous
//! task; a fired callback re-checks its generation under the mutex and
//! becomes a no-op when it lost the race to a cancellation.

pub mod lock;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use greenwake_common::config::Config;
use greenwake_common::event::{EventType, WakeEvent};
use greenwake_common::strategy::{SleepMode, Strategy};
use greenwake_common::duration::format_hms;

pub use lock::{platform_lock, PowerLock};

/// Cadence of the program-mode idle evaluation.
const STATUS_TICK_INTERVAL: Duration = Duration::from_secs(3);

/// Floor for `program_sleep_delay` and `external_wake.timeout_secs`.
const MIN_DELAY_SECS: u64 = 30;

/// Callback fired after every state change. Receives the post-transition
/// snapshot. Must not call back into the service.
pub type UpdateCallback = Box<dyn Fn(&StatusSnapshot) + Send + Sync>;

/// Callback fired after user-initiated changes so the facade can persist
/// the state back to the config file. Same re-entrancy rule.
pub type SaveConfigCallback = Box<dyn Fn(&StatusSnapshot) -> anyhow::Result<()> + Send + Sync>;

/// Consistent read view of the core, handed to observers and the facade.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub strategy: Strategy,
    pub sleep_mode: SleepMode,
    pub duration: Duration,
    /// Remaining time of an active `timed` strategy, zero otherwise.
    pub remaining: Duration,
    pub is_temporary_wake: bool,
    pub valid_events: Vec<EventType>,
    pub program_sleep_delay: u64,
    pub external_wake_timeout_secs: u64,
    pub last_wake_event: Option<WakeEvent>,
    /// Time until the pending program-managed suspend, if one is armed.
    pub sleep_pending_in: Option<Duration>,
}

/// A live one-shot timer. `gen` ties the spawned task to this slot; the
/// task refuses to act once the slot has been re-armed or cleared.
struct TimerSlot {
    gen: u64,
    started_at: Instant,
    deadline: Duration,
    handle: JoinHandle<()>,
}

impl TimerSlot {
    fn remaining(&self) -> Duration {
        self.deadline.saturating_sub(self.started_at.elapsed())
    }
}

struct CoreState {
    strategy: Strategy,
    sleep_mode: SleepMode,
    duration: Duration,
    valid_events: Vec<EventType>,
    program_sleep_delay: u64,
    external_wake_timeout_secs: u64,
    is_temporary_wake: bool,
    last_wake_event: Option<WakeEvent>,

    sleep_timer: Option<TimerSlot>,
    timed_timer: Option<TimerSlot>,
    timer_gen: u64,

    /// Invalidates in-flight temporary-wake expiries when bumped.
    temp_wake_gen: u64,

    tick_task: Option<JoinHandle<()>>,
    tick_gen: u64,

    update_callback: Option<UpdateCallback>,
    save_config_callback: Option<SaveConfigCallback>,

    stopped: bool,
}

/// The wake-lock service. Owns the platform power lock; nothing else in the
/// process may touch the assertion.
pub struct WakeLockService {
    lock: Box<dyn PowerLock>,
    state: Mutex<CoreState>,
    weak: Weak<WakeLockService>,
}

impl WakeLockService {
    /// Build the service seeded from config. No transitions are applied and
    /// no tasks started until [`initialize_state`](Self::initialize_state).
    pub fn new(lock: Box<dyn PowerLock>, cfg: &Config) -> Arc<Self> {
        let program_sleep_delay = clamp_delay(cfg.program_sleep_delay, "program_sleep_delay");
        let external_wake_timeout_secs =
            clamp_delay(cfg.external_wake.timeout_secs, "external_wake.timeout_secs");

        Arc::new_cyclic(|weak| Self {
            lock,
            weak: weak.clone(),
            state: Mutex::new(CoreState {
                strategy: cfg.strategy,
                sleep_mode: cfg.sleep_mode,
                duration: Duration::ZERO,
                valid_events: cfg.valid_events(),
                program_sleep_delay,
                external_wake_timeout_secs,
                is_temporary_wake: false,
                last_wake_event: None,
                sleep_timer: None,
                timed_timer: None,
                timer_gen: 0,
                temp_wake_gen: 0,
                tick_task: None,
                tick_gen: 0,
                update_callback: None,
                save_config_callback: None,
                stopped: false,
            }),
        })
    }

    // ── Observer wiring ──────────────────────────────────────────────

    pub fn set_update_callback(&self, callback: UpdateCallback) {
        let mut state = self.state.lock().unwrap();
        state.update_callback = Some(callback);
    }

    pub fn set_save_config_callback(&self, callback: SaveConfigCallback) {
        let mut state = self.state.lock().unwrap();
        state.save_config_callback = Some(callback);
    }

    // ── Mutators ─────────────────────────────────────────────────────

    /// Apply the initial strategy/mode from config. Same transitions as the
    /// mutators, but the config is never written back.
    pub fn initialize_state(&self, strategy: Strategy, sleep_mode: SleepMode, duration: Duration) {
        let mut state = self.state.lock().unwrap();
        if state.stopped {
            return;
        }
        info!("initializing state: strategy={strategy}, sleep_mode={sleep_mode}");

        let strategy = if strategy == Strategy::Timed && duration.is_zero() {
            error!("timed strategy configured with zero duration, falling back to external_wake");
            Strategy::ExternalWake
        } else {
            strategy
        };

        state.strategy = strategy;
        state.sleep_mode = sleep_mode;
        state.is_temporary_wake = false;
        state.temp_wake_gen += 1;
        self.cancel_sleep_timer(&mut state);
        self.cancel_timed_timer(&mut state);

        match strategy {
            Strategy::Permanent => self.lock.acquire(),
            Strategy::Timed => {
                state.duration = duration;
                self.lock.acquire();
                self.arm_timed_timer(&mut state);
            }
            Strategy::ExternalWake => self.lock.release(),
        }

        match sleep_mode {
            SleepMode::Program => self.spawn_status_tick(&mut state),
            SleepMode::System => self.stop_status_tick(&mut state),
        }

        notify_update(&state);
    }

    /// Feed one wake event through the accept filter. A dropped event has
    /// no side effects at all.
    pub fn handle_wake_event(&self, event: WakeEvent) {
        let mut state = self.state.lock().unwrap();
        if state.stopped {
            return;
        }

        if !state.valid_events.contains(&event.event_type) {
            debug!("dropping wake event of unaccepted type {}", event.event_type);
            return;
        }

        info!(
            "wake event: type={}, source={}, at={}",
            event.event_type, event.source, event.timestamp
        );

        self.cancel_sleep_timer(&mut state);
        self.lock.acquire();
        state.is_temporary_wake = true;
        state.last_wake_event = Some(event);

        // Refresh the temporary-wake window. Earlier expiries are orphaned
        // by the generation bump.
        state.temp_wake_gen += 1;
        let gen = state.temp_wake_gen;
        let timeout = Duration::from_secs(state.external_wake_timeout_secs);
        debug!("temporary wake armed for {}s", timeout.as_secs());
        if let Some(svc) = self.weak.upgrade() {
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                svc.on_temp_wake_expired(gen);
            });
        }

        notify_update(&state);
    }

    /// Switch strategy. Repeating the current strategy with identical
    /// arguments is a no-op; `timed` with a zero duration is rejected.
    pub fn set_strategy(&self, strategy: Strategy, duration: Duration) {
        let mut state = self.state.lock().unwrap();
        if state.stopped {
            return;
        }

        if strategy == state.strategy
            && (strategy != Strategy::Timed || duration == state.duration)
        {
            return;
        }

        if strategy == Strategy::Timed && duration.is_zero() {
            error!("rejecting timed strategy: duration must be positive");
            return;
        }

        info!("strategy change: {} -> {strategy}", state.strategy);

        match strategy {
            Strategy::Permanent => {
                self.cancel_sleep_timer(&mut state);
                self.cancel_timed_timer(&mut state);
                state.strategy = Strategy::Permanent;
                self.lock.acquire();
            }
            Strategy::Timed => {
                self.cancel_sleep_timer(&mut state);
                self.cancel_timed_timer(&mut state);
                state.strategy = Strategy::Timed;
                state.duration = duration;
                self.lock.acquire();
                self.arm_timed_timer(&mut state);
            }
            Strategy::ExternalWake => {
                self.cancel_timed_timer(&mut state);
                state.strategy = Strategy::ExternalWake;
                // A temporary wake keeps the assertion until its own expiry.
                if !state.is_temporary_wake {
                    self.lock.release();
                }
            }
        }

        notify_update(&state);
        request_save(&state);
    }

    pub fn set_sleep_mode(&self, mode: SleepMode) {
        let mut state = self.state.lock().unwrap();
        if state.stopped || state.sleep_mode == mode {
            return;
        }

        info!("sleep mode change: {} -> {mode}", state.sleep_mode);
        state.sleep_mode = mode;

        match mode {
            SleepMode::System => {
                self.cancel_sleep_timer(&mut state);
                self.stop_status_tick(&mut state);
            }
            SleepMode::Program => self.spawn_status_tick(&mut state),
        }

        notify_update(&state);
        request_save(&state);
    }

    pub fn set_valid_events(&self, events: Vec<EventType>) {
        let mut state = self.state.lock().unwrap();
        if state.stopped {
            return;
        }
        state.valid_events = events;
        notify_update(&state);
        request_save(&state);
    }

    pub fn set_program_sleep_delay(&self, delay_secs: u64) {
        let mut state = self.state.lock().unwrap();
        if state.stopped {
            return;
        }
        state.program_sleep_delay = clamp_delay(delay_secs, "program_sleep_delay");
        notify_update(&state);
    }

    pub fn set_timeout_secs(&self, timeout_secs: u64) {
        let mut state = self.state.lock().unwrap();
        if state.stopped {
            return;
        }
        state.external_wake_timeout_secs =
            clamp_delay(timeout_secs, "external_wake.timeout_secs");
        notify_update(&state);
    }

    /// Shut the core down: cancel every timer, stop the tick, release the
    /// assertion. Idempotent; the service ignores all calls afterwards.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        if state.stopped {
            return;
        }
        state.stopped = true;
        state.is_temporary_wake = false;
        state.temp_wake_gen += 1;
        self.cancel_sleep_timer(&mut state);
        self.cancel_timed_timer(&mut state);
        self.stop_status_tick(&mut state);
        self.lock.release();
        info!("wake-lock service stopped");
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn strategy(&self) -> Strategy {
        self.state.lock().unwrap().strategy
    }

    pub fn sleep_mode(&self) -> SleepMode {
        self.state.lock().unwrap().sleep_mode
    }

    pub fn duration(&self) -> Duration {
        self.state.lock().unwrap().duration
    }

    pub fn valid_events(&self) -> Vec<EventType> {
        self.state.lock().unwrap().valid_events.clone()
    }

    pub fn program_sleep_delay(&self) -> u64 {
        self.state.lock().unwrap().program_sleep_delay
    }

    pub fn timeout_secs(&self) -> u64 {
        self.state.lock().unwrap().external_wake_timeout_secs
    }

    pub fn last_wake_event(&self) -> Option<WakeEvent> {
        self.state.lock().unwrap().last_wake_event.clone()
    }

    /// Remaining time of an active `timed` strategy.
    pub fn remaining_time(&self) -> Duration {
        let state = self.state.lock().unwrap();
        remaining_locked(&state)
    }

    /// `HH:MM:SS` rendering of [`remaining_time`](Self::remaining_time).
    pub fn format_remaining_time(&self) -> String {
        format_hms(self.remaining_time())
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        snapshot_of(&self.state.lock().unwrap())
    }

    // ── Status tick ──────────────────────────────────────────────────

    fn spawn_status_tick(&self, state: &mut CoreState) {
        self.stop_status_tick(state);
        state.tick_gen += 1;
        let gen = state.tick_gen;
        let Some(svc) = self.weak.upgrade() else {
            return;
        };
        debug!("starting status tick");
        state.tick_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(STATUS_TICK_INTERVAL);
            loop {
                ticker.tick().await;
                if !svc.status_tick(gen) {
                    debug!("status tick stopped");
                    return;
                }
            }
        }));
    }

    fn stop_status_tick(&self, state: &mut CoreState) {
        state.tick_gen += 1;
        if let Some(task) = state.tick_task.take() {
            task.abort();
        }
    }

    /// One evaluation of the program-mode idle guard. Returns false when the
    /// loop should exit.
    fn status_tick(&self, gen: u64) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.stopped || gen != state.tick_gen || state.sleep_mode != SleepMode::Program {
            return false;
        }

        debug!(
            "status tick: strategy={}, temp_wake={}, sleep_timer={}",
            state.strategy,
            state.is_temporary_wake,
            state
                .sleep_timer
                .as_ref()
                .map(|t| format!("{}s left", t.remaining().as_secs()))
                .unwrap_or_else(|| "none".into()),
        );

        if state.strategy == Strategy::ExternalWake
            && !state.is_temporary_wake
            && state.sleep_timer.is_none()
        {
            info!(
                "idle conditions met, arming sleep timer for {}s",
                state.program_sleep_delay
            );
            self.arm_sleep_timer(&mut state);
        }
        true
    }

    // ── Timers ───────────────────────────────────────────────────────

    fn arm_sleep_timer(&self, state: &mut CoreState) {
        self.cancel_sleep_timer(state);
        state.timer_gen += 1;
        let gen = state.timer_gen;
        let delay = Duration::from_secs(state.program_sleep_delay);
        let Some(svc) = self.weak.upgrade() else {
            return;
        };
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            svc.on_sleep_timer_fired(gen);
        });
        state.sleep_timer = Some(TimerSlot {
            gen,
            started_at: Instant::now(),
            deadline: delay,
            handle,
        });
    }

    fn cancel_sleep_timer(&self, state: &mut CoreState) {
        if let Some(slot) = state.sleep_timer.take() {
            debug!("cancelling sleep timer");
            slot.handle.abort();
        }
    }

    fn arm_timed_timer(&self, state: &mut CoreState) {
        self.cancel_timed_timer(state);
        state.timer_gen += 1;
        let gen = state.timer_gen;
        let duration = state.duration;
        let Some(svc) = self.weak.upgrade() else {
            return;
        };
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            svc.on_timed_timer_fired(gen);
        });
        state.timed_timer = Some(TimerSlot {
            gen,
            started_at: Instant::now(),
            deadline: duration,
            handle,
        });
        info!("timed wake armed for {}s", duration.as_secs());
    }

    fn cancel_timed_timer(&self, state: &mut CoreState) {
        if let Some(slot) = state.timed_timer.take() {
            debug!("cancelling timed-wake timer");
            slot.handle.abort();
        }
    }

    /// Sleep-timer expiry: release the assertion, then command suspend.
    fn on_sleep_timer_fired(&self, gen: u64) {
        let mut state = self.state.lock().unwrap();
        if state.stopped {
            return;
        }
        match &state.sleep_timer {
            Some(slot) if slot.gen == gen => {}
            _ => return, // cancelled after dispatch
        }
        state.sleep_timer = None;

        info!("idle grace period elapsed, suspending host");
        self.lock.release();
        if let Err(e) = self.lock.force_sleep() {
            error!("suspend command failed: {e:#}");
        }
    }

    /// Timed-strategy expiry: back to external_wake, drop the assertion.
    fn on_timed_timer_fired(&self, gen: u64) {
        let mut state = self.state.lock().unwrap();
        if state.stopped {
            return;
        }
        match &state.timed_timer {
            Some(slot) if slot.gen == gen => {}
            _ => return,
        }
        state.timed_timer = None;

        info!(
            "timed wake finished ({}s), switching to external_wake",
            state.duration.as_secs()
        );
        state.strategy = Strategy::ExternalWake;
        // An overlapping temporary wake keeps the assertion until its own
        // expiry releases it.
        if !state.is_temporary_wake {
            self.lock.release();
        }
        notify_update(&state);
    }

    /// Temporary-wake expiry: clear the flag; in external_wake mode drop the
    /// assertion so the status tick can resume idle accounting.
    fn on_temp_wake_expired(&self, gen: u64) {
        let mut state = self.state.lock().unwrap();
        if state.stopped || gen != state.temp_wake_gen || !state.is_temporary_wake {
            return;
        }
        debug!("temporary wake window expired");
        state.is_temporary_wake = false;
        if state.strategy == Strategy::ExternalWake {
            self.lock.release();
        }
        notify_update(&state);
    }
}

fn clamp_delay(value: u64, key: &str) -> u64 {
    if value < MIN_DELAY_SECS {
        info!("{key} ({value}s) below minimum, clamping to {MIN_DELAY_SECS}s");
        MIN_DELAY_SECS
    } else {
        value
    }
}

fn remaining_locked(state: &CoreState) -> Duration {
    if state.strategy != Strategy::Timed {
        return Duration::ZERO;
    }
    state
        .timed_timer
        .as_ref()
        .map(TimerSlot::remaining)
        .unwrap_or(Duration::ZERO)
}

fn snapshot_of(state: &CoreState) -> StatusSnapshot {
    StatusSnapshot {
        strategy: state.strategy,
        sleep_mode: state.sleep_mode,
        duration: state.duration,
        remaining: remaining_locked(state),
        is_temporary_wake: state.is_temporary_wake,
        valid_events: state.valid_events.clone(),
        program_sleep_delay: state.program_sleep_delay,
        external_wake_timeout_secs: state.external_wake_timeout_secs,
        last_wake_event: state.last_wake_event.clone(),
        sleep_pending_in: state.sleep_timer.as_ref().map(TimerSlot::remaining),
    }
}

fn notify_update(state: &CoreState) {
    if let Some(callback) = &state.update_callback {
        callback(&snapshot_of(state));
    }
}

fn request_save(state: &CoreState) {
    if let Some(callback) = &state.save_config_callback {
        if let Err(e) = callback(&snapshot_of(state)) {
            error!("failed to persist config: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_enforces_floor() {
        assert_eq!(clamp_delay(5, "program_sleep_delay"), 30);
        assert_eq!(clamp_delay(30, "program_sleep_delay"), 30);
        assert_eq!(clamp_delay(45, "program_sleep_delay"), 45);
    }
}
