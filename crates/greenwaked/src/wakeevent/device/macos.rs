//! macOS device probe: periodic `pmset -g assertions` polling.
//!
//! The `UserIsActive` assertion shows up in the per-process list whenever
//! the user recently touched an input device; one probe hit emits one
//! `device` event.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::error;

use greenwake_common::event::{EventType, WakeEvent};

use super::ProbeSwitch;
use crate::wakelock::WakeLockService;

const ACTIVITY_CHECK_INTERVAL: Duration = Duration::from_secs(15);

pub(super) async fn run(
    core: Arc<WakeLockService>,
    switch: ProbeSwitch,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut ticker = tokio::time::interval(ACTIVITY_CHECK_INTERVAL);
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(());
                }
            }
            _ = ticker.tick() => {
                if !switch.is_enabled() {
                    continue;
                }
                match Command::new("pmset").args(["-g", "assertions"]).output().await {
                    Ok(out) => {
                        let assertions = String::from_utf8_lossy(&out.stdout);
                        if has_user_activity(&assertions) {
                            core.handle_wake_event(WakeEvent::new(
                                EventType::Device,
                                "user_activity",
                            ));
                        }
                    }
                    Err(e) => error!("failed to run pmset -g assertions: {e}"),
                }
            }
        }
    }
}

fn has_user_activity(output: &str) -> bool {
    output.lines().any(|line| line.contains("UserIsActive"))
}
