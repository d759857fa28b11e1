//! Linux device probe: inotify on the input device nodes.
//!
//! Spawns `inotifywait -m -e access` over `/dev/input/event*` and classifies
//! each touched node with `udevadm info`; only keyboards and mice count as
//! user activity. The watcher child is respawned after a one-second backoff
//! when it exits.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::debug;

use greenwake_common::event::{EventType, WakeEvent};

use super::ProbeSwitch;
use crate::wakeevent::RESPAWN_BACKOFF;
use crate::wakelock::WakeLockService;

const SUSPENDED_POLL: Duration = Duration::from_secs(1);

pub(super) async fn run(
    core: Arc<WakeLockService>,
    switch: ProbeSwitch,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    loop {
        if *shutdown.borrow() {
            return Ok(());
        }
        if !switch.is_enabled() {
            // Probe suspended while `device` events are filtered out.
            tokio::time::sleep(SUSPENDED_POLL).await;
            continue;
        }

        let devices = input_device_nodes()?;
        if devices.is_empty() {
            bail!("no /dev/input/event* devices found");
        }

        let mut child = Command::new("inotifywait")
            .args(["-m", "-e", "access"])
            .args(&devices)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .context("failed to start inotifywait")?;
        let stdout = child
            .stdout
            .take()
            .context("inotifywait stdout unavailable")?;
        let mut lines = BufReader::new(stdout).lines();
        debug!("watching {} input devices", devices.len());

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    let _ = child.kill().await;
                    return Ok(());
                }
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if !switch.is_enabled() {
                                let _ = child.kill().await;
                                break;
                            }
                            if let Some(device) = parse_access_line(&line) {
                                if is_keyboard_or_mouse(&device).await {
                                    core.handle_wake_event(WakeEvent::new(
                                        EventType::Device,
                                        device,
                                    ));
                                }
                            }
                        }
                        // Watcher exited or its pipe broke; respawn below.
                        Ok(None) | Err(_) => break,
                    }
                }
            }
        }

        let _ = child.kill().await;
        tokio::time::sleep(RESPAWN_BACKOFF).await;
    }
}

fn input_device_nodes() -> Result<Vec<String>> {
    let mut nodes = Vec::new();
    let entries =
        std::fs::read_dir("/dev/input").context("failed to list /dev/input")?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("event") {
            nodes.push(format!("/dev/input/{name}"));
        }
    }
    nodes.sort();
    Ok(nodes)
}

/// `inotifywait -m` lines look like `/dev/input/event3 ACCESS`.
fn parse_access_line(line: &str) -> Option<String> {
    let device = line.split_whitespace().next()?;
    device.contains("event").then(|| device.to_string())
}

async fn is_keyboard_or_mouse(device: &str) -> bool {
    let output = Command::new("udevadm")
        .args(["info", "--query=property", &format!("--name={device}")])
        .output()
        .await;
    match output {
        Ok(out) => {
            let info = String::from_utf8_lossy(&out.stdout);
            info.contains("ID_INPUT_KEYBOARD=1") || info.contains("ID_INPUT_MOUSE=1")
        }
        Err(e) => {
            debug!("udevadm query for {device} failed: {e}");
            false
        }
    }
}
