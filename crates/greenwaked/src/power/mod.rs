//! Power introspection: who is keeping the host awake right now.
//!
//! Read-only and purely diagnostic; nothing here feeds the state machine.
//! Each platform shells out to its native tooling and parses best-effort;
//! malformed lines are skipped, a missing tool just yields an empty report
//! section.

pub mod parsers;

use anyhow::Result;

pub use parsers::{KernelAssertion, PowerReport, SleepInhibitor, SystemPowerState};

/// Enumerate processes and assertions currently preventing sleep.
pub fn sleep_inhibitors() -> Result<PowerReport> {
    #[cfg(target_os = "macos")]
    {
        macos_report()
    }
    #[cfg(target_os = "linux")]
    {
        linux_report()
    }
    #[cfg(target_os = "windows")]
    {
        windows_report()
    }
}

#[cfg(target_os = "macos")]
fn macos_report() -> Result<PowerReport> {
    use anyhow::Context;
    use std::process::Command;

    let output = Command::new("pmset")
        .args(["-g", "assertions"])
        .output()
        .context("failed to run pmset -g assertions")?;
    Ok(parsers::parse_pmset_assertions(&String::from_utf8_lossy(
        &output.stdout,
    )))
}

#[cfg(target_os = "linux")]
fn linux_report() -> Result<PowerReport> {
    use std::process::Command;
    use tracing::debug;

    let mut report = PowerReport::default();

    match Command::new("systemd-inhibit")
        .args(["--list", "--no-pager"])
        .output()
    {
        Ok(out) if out.status.success() => {
            let inhibitors =
                parsers::parse_systemd_inhibit_list(&String::from_utf8_lossy(&out.stdout));
            report.inhibitors.extend(inhibitors);
        }
        Ok(out) => debug!("systemd-inhibit --list exited with {}", out.status),
        Err(e) => debug!("systemd-inhibit unavailable: {e}"),
    }

    match Command::new("loginctl").arg("show-session").output() {
        Ok(out) if out.status.success() => {
            if let Some(session) =
                parsers::parse_loginctl_session(&String::from_utf8_lossy(&out.stdout))
            {
                report.inhibitors.push(session);
            }
        }
        Ok(out) => debug!("loginctl show-session exited with {}", out.status),
        Err(e) => debug!("loginctl unavailable: {e}"),
    }

    if is_desktop_environment() {
        if let Ok(out) = Command::new("gsettings")
            .args(["get", "org.gnome.desktop.session", "idle-delay"])
            .output()
        {
            if let Some(inhibitor) =
                parsers::parse_gsettings_idle_delay(&String::from_utf8_lossy(&out.stdout))
            {
                report.inhibitors.push(inhibitor);
            }
        }
        if let Ok(out) = Command::new("xset").arg("q").output() {
            if let Some(inhibitor) = parsers::parse_xset_dpms(&String::from_utf8_lossy(&out.stdout))
            {
                report.inhibitors.push(inhibitor);
            }
        }
    }

    Ok(report)
}

#[cfg(target_os = "linux")]
fn is_desktop_environment() -> bool {
    std::path::Path::new("/tmp/.X11-unix").exists()
        || std::env::var("WAYLAND_DISPLAY").map(|v| !v.is_empty()).unwrap_or(false)
}

#[cfg(target_os = "windows")]
fn windows_report() -> Result<PowerReport> {
    use anyhow::Context;
    use std::process::Command;

    let output = Command::new("powercfg")
        .arg("/requests")
        .output()
        .context("failed to run powercfg /requests")?;
    let mut report = PowerReport::default();
    report.inhibitors =
        parsers::parse_powercfg_requests(&String::from_utf8_lossy(&output.stdout));
    Ok(report)
}
