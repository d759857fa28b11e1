//! Shared fixtures for the integration suites: a counting mock power lock
//! and service constructors.

// Each test binary uses its own subset of these helpers.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use greenwake_common::config::Config;
use greenwake_common::event::{EventType, WakeEvent};
use greenwake_common::strategy::{SleepMode, Strategy};
use greenwaked::wakelock::{PowerLock, WakeLockService};

#[derive(Default)]
pub struct Counters {
    held: AtomicBool,
    acquires: AtomicUsize,
    releases: AtomicUsize,
    force_sleeps: AtomicUsize,
}

impl Counters {
    pub fn held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
    pub fn force_sleeps(&self) -> usize {
        self.force_sleeps.load(Ordering::SeqCst)
    }
}

pub struct MockLock(pub Arc<Counters>);

impl PowerLock for MockLock {
    fn acquire(&self) {
        self.0.acquires.fetch_add(1, Ordering::SeqCst);
        self.0.held.store(true, Ordering::SeqCst);
    }

    fn release(&self) {
        self.0.releases.fetch_add(1, Ordering::SeqCst);
        self.0.held.store(false, Ordering::SeqCst);
    }

    fn force_sleep(&self) -> anyhow::Result<()> {
        self.0.force_sleeps.fetch_add(1, Ordering::SeqCst);
        self.0.held.store(false, Ordering::SeqCst);
        Ok(())
    }
}

pub fn program_mode_config() -> Config {
    let mut cfg = Config::default();
    cfg.strategy = Strategy::ExternalWake;
    cfg.sleep_mode = SleepMode::Program;
    cfg.program_sleep_delay = 30;
    cfg
}

pub fn service(cfg: &Config) -> (Arc<WakeLockService>, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let core = WakeLockService::new(Box::new(MockLock(Arc::clone(&counters))), cfg);
    (core, counters)
}

/// Service with the config's initial state already applied.
pub fn started(cfg: &Config) -> (Arc<WakeLockService>, Arc<Counters>) {
    let (core, counters) = service(cfg);
    core.initialize_state(cfg.strategy, cfg.sleep_mode, Duration::ZERO);
    (core, counters)
}

pub async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

pub fn wol_event() -> WakeEvent {
    WakeEvent::new(EventType::Wol, "192.0.2.7:40000")
}

pub fn device_event() -> WakeEvent {
    WakeEvent::new(EventType::Device, "/dev/input/event3")
}
