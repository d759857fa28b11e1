//! Linux power lock: systemd-inhibit, with an xdg-screensaver fallback.
//!
//! Acquire takes the first mechanism that starts; there is no re-check that
//! the inhibit is actually effective. Suspend tries `systemctl suspend`,
//! then `pm-suspend`, then the logind D-Bus method, surfacing the last
//! failure when every fallback is exhausted.

use anyhow::{Context, Result};
use std::process::{Child, Command};
use std::sync::Mutex;
use tracing::{debug, error, info};

use super::lock::PowerLock;

enum Inhibitor {
    /// A held `systemd-inhibit ... sleep infinity` child.
    SystemdInhibit(Child),
    /// `xdg-screensaver suspend` registered against our own PID.
    XdgScreensaver,
}

pub struct LinuxLock {
    inhibitor: Mutex<Option<Inhibitor>>,
}

impl LinuxLock {
    pub fn new() -> Self {
        Self {
            inhibitor: Mutex::new(None),
        }
    }
}

impl Default for LinuxLock {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerLock for LinuxLock {
    fn acquire(&self) {
        let mut inhibitor = self.inhibitor.lock().unwrap();
        if inhibitor.is_some() {
            return;
        }

        match Command::new("systemd-inhibit")
            .args([
                "--what=sleep:idle",
                "--who=greenwake-guard",
                "--why=Keep system awake",
                "--mode=block",
                "sleep",
                "infinity",
            ])
            .spawn()
        {
            Ok(child) => {
                info!("wake lock acquired via systemd-inhibit (pid {})", child.id());
                *inhibitor = Some(Inhibitor::SystemdInhibit(child));
                return;
            }
            Err(e) => debug!("systemd-inhibit unavailable: {e}"),
        }

        let pid = std::process::id().to_string();
        match Command::new("xdg-screensaver").args(["suspend", &pid]).status() {
            Ok(status) if status.success() => {
                info!("wake lock acquired via xdg-screensaver");
                *inhibitor = Some(Inhibitor::XdgScreensaver);
            }
            Ok(status) => error!(
                "failed to acquire wake lock: xdg-screensaver exited with {status} and systemd-inhibit is unavailable"
            ),
            Err(e) => error!(
                "failed to acquire wake lock: neither systemd-inhibit nor xdg-screensaver usable ({e})"
            ),
        }
    }

    fn release(&self) {
        let mut inhibitor = self.inhibitor.lock().unwrap();
        match inhibitor.take() {
            None => {}
            Some(Inhibitor::SystemdInhibit(mut child)) => {
                if let Err(e) = child.kill() {
                    error!("failed to stop systemd-inhibit (pid {}): {e}", child.id());
                    return;
                }
                let _ = child.wait();
                info!("wake lock released");
            }
            Some(Inhibitor::XdgScreensaver) => {
                let pid = std::process::id().to_string();
                match Command::new("xdg-screensaver").args(["resume", &pid]).status() {
                    Ok(status) if status.success() => info!("wake lock released"),
                    Ok(status) => error!("xdg-screensaver resume exited with {status}"),
                    Err(e) => error!("failed to run xdg-screensaver resume: {e}"),
                }
            }
        }
    }

    fn force_sleep(&self) -> Result<()> {
        self.release();

        if run_quiet("systemctl", &["suspend"]) {
            return Ok(());
        }
        if run_quiet("pm-suspend", &[]) {
            return Ok(());
        }

        // Last resort: ask logind over the system bus.
        let status = Command::new("dbus-send")
            .args([
                "--system",
                "--print-reply",
                "--dest=org.freedesktop.login1",
                "/org/freedesktop/login1",
                "org.freedesktop.login1.Manager.Suspend",
                "boolean:true",
            ])
            .status()
            .context("failed to run dbus-send (systemctl and pm-suspend already failed)")?;
        if !status.success() {
            anyhow::bail!("all suspend mechanisms failed; dbus-send exited with {status}");
        }
        Ok(())
    }
}

fn run_quiet(program: &str, args: &[&str]) -> bool {
    match Command::new(program).args(args).status() {
        Ok(status) if status.success() => true,
        Ok(status) => {
            debug!("{program} exited with {status}");
            false
        }
        Err(e) => {
            debug!("{program} not runnable: {e}");
            false
        }
    }
}
