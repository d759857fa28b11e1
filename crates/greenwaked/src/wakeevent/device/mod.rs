//! Device-activity probe.
//!
//! Watches for keyboard/mouse activity the platform-appropriate way and
//! feeds `device` events into the core. The probe can be suspended at
//! runtime when `device` leaves the accepted-events set, so a filtered
//! probe stops burning I/O, and resumes when re-accepted.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;

use greenwake_common::event::EventType;

use crate::wakelock::WakeLockService;

/// Handle for toggling the probe as the accepted-events set changes.
#[derive(Clone)]
pub struct ProbeSwitch {
    enabled: Arc<AtomicBool>,
}

impl ProbeSwitch {
    pub fn new(initially_enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(initially_enabled)),
        }
    }

    /// Derive the switch position from an accepted-events set.
    pub fn apply_valid_events(&self, valid_events: &[EventType]) {
        self.enabled
            .store(valid_events.contains(&EventType::Device), Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

/// Run the platform probe until shutdown. Errors bubble up to the
/// supervisor, which respawns the probe after a backoff.
pub async fn run(
    core: Arc<WakeLockService>,
    switch: ProbeSwitch,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        linux::run(core, switch, shutdown).await
    }
    #[cfg(target_os = "macos")]
    {
        macos::run(core, switch, shutdown).await
    }
    #[cfg(target_os = "windows")]
    {
        windows::run(core, switch, shutdown).await
    }
}
