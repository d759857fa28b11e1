//! External facade: the narrow surface a tray or ctl front-end talks to.
//!
//! The facade installs the core's two observer hooks and keeps a
//! latest-wins snapshot for display. State changes flow one way: front-end
//! mutations go through the delegating setters here, the core calls back
//! with the post-transition snapshot, and user-initiated changes are
//! persisted to the YAML config. Callbacks run inside the core's critical
//! section, so nothing here may call back into the core from them; they
//! only touch facade-owned state.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tracing::debug;

use greenwake_common::config::Config;
use greenwake_common::duration::{format_compact, format_hms};
use greenwake_common::event::{format_valid_events, EventType};
use greenwake_common::strategy::{SleepMode, Strategy};

use crate::wakeevent::device::ProbeSwitch;
use crate::wakelock::{StatusSnapshot, WakeLockService};

pub struct Facade {
    core: Arc<WakeLockService>,
    latest: RwLock<StatusSnapshot>,
}

impl Facade {
    /// Wire the facade into the core: update hook refreshes the display
    /// snapshot and the device-probe switch, save hook writes the config.
    pub fn install(
        core: Arc<WakeLockService>,
        config: Config,
        config_path: PathBuf,
        probe_switch: ProbeSwitch,
    ) -> Arc<Self> {
        let facade = Arc::new(Self {
            latest: RwLock::new(core.snapshot()),
            core,
        });

        let for_update = Arc::clone(&facade);
        facade.core.set_update_callback(Box::new(move |snapshot| {
            *for_update.latest.write().unwrap() = snapshot.clone();
            probe_switch.apply_valid_events(&snapshot.valid_events);
            debug!(
                "state changed: strategy={}, sleep_mode={}, temp_wake={}",
                snapshot.strategy, snapshot.sleep_mode, snapshot.is_temporary_wake
            );
        }));

        let template = Mutex::new(config);
        facade.core.set_save_config_callback(Box::new(move |snapshot| {
            let mut cfg = template.lock().unwrap();
            apply_snapshot(&mut cfg, snapshot);
            cfg.save(&config_path)
        }));

        facade
    }

    /// The most recent post-transition snapshot.
    pub fn latest(&self) -> StatusSnapshot {
        self.latest.read().unwrap().clone()
    }

    /// One-line status, the way a tray menu header renders it.
    pub fn status_line(&self) -> String {
        let snapshot = self.latest();
        match snapshot.strategy {
            Strategy::Timed => format!(
                "strategy: timed ({}) · sleep: {}",
                format_hms(snapshot.remaining),
                snapshot.sleep_mode
            ),
            strategy => format!("strategy: {strategy} · sleep: {}", snapshot.sleep_mode),
        }
    }

    // Delegating mutators, the only write path a front-end gets.

    pub fn set_strategy(&self, strategy: Strategy, duration: Duration) {
        self.core.set_strategy(strategy, duration);
    }

    pub fn set_sleep_mode(&self, mode: SleepMode) {
        self.core.set_sleep_mode(mode);
    }

    pub fn set_valid_events(&self, events: Vec<EventType>) {
        self.core.set_valid_events(events);
    }

    pub fn set_program_sleep_delay(&self, delay_secs: u64) {
        self.core.set_program_sleep_delay(delay_secs);
    }

    pub fn set_timeout_secs(&self, timeout_secs: u64) {
        self.core.set_timeout_secs(timeout_secs);
    }

    /// Diagnostic view for the "what is preventing sleep" dialog.
    pub fn sleep_inhibitors(&self) -> anyhow::Result<crate::power::PowerReport> {
        crate::power::sleep_inhibitors()
    }
}

/// Fold the user-visible state back into the config model before saving.
/// Keys the core does not own (port, log level) keep their loaded values.
fn apply_snapshot(cfg: &mut Config, snapshot: &StatusSnapshot) {
    cfg.strategy = snapshot.strategy;
    cfg.sleep_mode = snapshot.sleep_mode;
    if !snapshot.duration.is_zero() {
        cfg.timed_duration = format_compact(snapshot.duration);
    }
    cfg.program_sleep_delay = snapshot.program_sleep_delay;
    cfg.external_wake.timeout_secs = snapshot.external_wake_timeout_secs;
    cfg.external_wake.valid_events = format_valid_events(&snapshot.valid_events);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_folds_into_config() {
        let mut cfg = Config::default();
        let snapshot = StatusSnapshot {
            strategy: Strategy::Timed,
            sleep_mode: SleepMode::System,
            duration: Duration::from_secs(5400),
            remaining: Duration::from_secs(100),
            is_temporary_wake: false,
            valid_events: vec![EventType::Wol],
            program_sleep_delay: 90,
            external_wake_timeout_secs: 120,
            last_wake_event: None,
            sleep_pending_in: None,
        };

        apply_snapshot(&mut cfg, &snapshot);

        assert_eq!(cfg.strategy, Strategy::Timed);
        assert_eq!(cfg.sleep_mode, SleepMode::System);
        assert_eq!(cfg.timed_duration, "1h30m");
        assert_eq!(cfg.program_sleep_delay, 90);
        assert_eq!(cfg.external_wake.timeout_secs, 120);
        assert_eq!(cfg.external_wake.valid_events, "wol");
        // Keys the core does not own are untouched.
        assert_eq!(cfg.external_wake.wol_port, 9);
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn zero_duration_keeps_configured_value() {
        let mut cfg = Config::default();
        let snapshot = StatusSnapshot {
            strategy: Strategy::ExternalWake,
            sleep_mode: SleepMode::Program,
            duration: Duration::ZERO,
            remaining: Duration::ZERO,
            is_temporary_wake: false,
            valid_events: vec![EventType::Wol, EventType::Device],
            program_sleep_delay: 60,
            external_wake_timeout_secs: 300,
            last_wake_event: None,
            sleep_pending_in: None,
        };

        apply_snapshot(&mut cfg, &snapshot);
        assert_eq!(cfg.timed_duration, "30m");
    }
}
