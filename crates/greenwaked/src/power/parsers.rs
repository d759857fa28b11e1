//! Parsers for the platform power-introspection tools.
//!
//! All parsing is best-effort: a line that does not match the expected shape
//! is skipped, never an error. The parse functions are platform-independent
//! so they stay testable everywhere; only the command invocations in the
//! parent module are target-gated.

/// One process (or pseudo-process) holding the host awake.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SleepInhibitor {
    pub pid: Option<u32>,
    pub name: String,
    /// Why it inhibits sleep, as reported by the tool.
    pub reason: String,
    /// Assertion class, normalized to the pmset vocabulary
    /// (`PreventSystemSleep`, `PreventUserIdleSystemSleep`, ...).
    pub kind: String,
    /// Raw tool output for this entry, for display.
    pub details: String,
    /// How long the assertion has been held, when the tool reports it.
    pub duration: String,
}

/// System-wide assertion summary (pmset's first section).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemPowerState {
    pub prevent_system_sleep: bool,
    pub prevent_user_idle: bool,
    pub prevent_display_sleep: bool,
    pub background_activity: bool,
    pub external_device: bool,
    pub network_activity: bool,
}

/// A kernel-level assertion (macOS only).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KernelAssertion {
    pub id: u32,
    pub level: u32,
    pub description: String,
    pub owner: String,
    pub created: String,
    pub modified: String,
}

#[derive(Debug, Clone, Default)]
pub struct PowerReport {
    pub inhibitors: Vec<SleepInhibitor>,
    pub system_state: SystemPowerState,
    pub kernel_assertions: Vec<KernelAssertion>,
}

// ── pmset -g assertions (macOS) ─────────────────────────────────────

pub fn parse_pmset_assertions(output: &str) -> PowerReport {
    let mut report = PowerReport::default();

    #[derive(PartialEq)]
    enum Section {
        None,
        System,
        Process,
        Kernel,
    }
    let mut section = Section::None;

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.contains("Assertion status system-wide:") {
            section = Section::System;
            continue;
        }
        if trimmed.contains("Listed by owning process:") {
            section = Section::Process;
            continue;
        }
        if trimmed.contains("Kernel Assertions:") {
            section = Section::Kernel;
            continue;
        }

        match section {
            Section::System => parse_system_assertion_line(trimmed, &mut report.system_state),
            Section::Process => {
                if trimmed.starts_with("pid ") {
                    report.inhibitors.push(parse_pmset_process_line(trimmed));
                } else if line.starts_with('\t') || line.starts_with("    ") {
                    // Continuation line: append to the last entry's details.
                    if let Some(last) = report.inhibitors.last_mut() {
                        if !last.details.is_empty() {
                            last.details.push_str(" | ");
                        }
                        last.details.push_str(trimmed);
                    }
                }
            }
            Section::Kernel => {
                if let Some(assertion) = parse_kernel_assertion_line(trimmed) {
                    report.kernel_assertions.push(assertion);
                }
            }
            Section::None => {}
        }
    }

    report
}

fn parse_system_assertion_line(line: &str, state: &mut SystemPowerState) {
    let mut fields = line.split_whitespace();
    let (Some(key), Some(value)) = (fields.next(), fields.last()) else {
        return;
    };
    let on = value == "1";
    match key {
        "BackgroundTask" => state.background_activity = on,
        "PreventSystemSleep" => state.prevent_system_sleep = on,
        "PreventUserIdleSystemSleep" => state.prevent_user_idle = on,
        "PreventUserIdleDisplaySleep" | "InternalPreventDisplaySleep" => {
            state.prevent_display_sleep = on
        }
        "ExternalMedia" => state.external_device = on,
        "NetworkClientActive" => state.network_activity = on,
        _ => {}
    }
}

/// `pid 120(hidd): [0x0000012c] 00:00:42 UserIsActive named: "..."`
fn parse_pmset_process_line(line: &str) -> SleepInhibitor {
    let mut inhibitor = SleepInhibitor::default();

    if let Some(rest) = line.strip_prefix("pid ") {
        if let Some(paren) = rest.find('(') {
            inhibitor.pid = rest[..paren].trim().parse().ok();
            if let Some(close) = rest[paren..].find(')') {
                inhibitor.name = rest[paren + 1..paren + close].to_string();
            }
        }
    }

    if let Some(bracket_end) = line.find("] ") {
        let after = &line[bracket_end + 2..];
        if let Some(duration) = after.split_whitespace().next() {
            inhibitor.duration = duration.to_string();
        }
    }

    if let Some(named) = line.find("named: \"") {
        let reason = &line[named + 8..];
        if let Some(end) = reason.find('"') {
            inhibitor.reason = reason[..end].to_string();
        }
    }

    inhibitor.kind = classify_pmset_line(line, &inhibitor.reason);
    inhibitor.details = line.to_string();
    inhibitor
}

fn classify_pmset_line(line: &str, reason: &str) -> String {
    for kind in [
        "PreventUserIdleSystemSleep",
        "PreventSystemSleep",
        "PreventUserIdleDisplaySleep",
        "PreventDisplaySleep",
        "BackgroundTask",
        "NetworkClientActive",
        "ExternalMedia",
        "UserIsActive",
    ] {
        if line.contains(kind) {
            return kind.to_string();
        }
    }
    // No explicit class: infer from the reason text.
    if reason.contains("display") {
        "PreventDisplaySleep".to_string()
    } else if reason.contains("network") {
        "NetworkClientActive".to_string()
    } else if reason.contains("background") {
        "BackgroundTask".to_string()
    } else {
        "PreventUserIdleSystemSleep".to_string()
    }
}

/// `id=500 level=255 ... description=com.apple owner=IODisplayWrangler`
fn parse_kernel_assertion_line(line: &str) -> Option<KernelAssertion> {
    if !line.starts_with("id=") {
        return None;
    }
    let mut assertion = KernelAssertion::default();
    for part in line.split_whitespace() {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key {
            "id" => assertion.id = value.parse().ok()?,
            "level" => assertion.level = value.parse().unwrap_or(0),
            "description" => assertion.description = value.to_string(),
            "owner" => assertion.owner = value.to_string(),
            "creat" => assertion.created = value.to_string(),
            "mod" => assertion.modified = value.to_string(),
            _ => {}
        }
    }
    Some(assertion)
}

// ── systemd-inhibit --list (Linux) ──────────────────────────────────

/// Columns: `WHO UID USER PID COMM WHAT WHY MODE`. Only block-mode sleep
/// and idle inhibitors are interesting; everything else is still reported
/// with a best-effort class.
pub fn parse_systemd_inhibit_list(output: &str) -> Vec<SleepInhibitor> {
    let mut inhibitors = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("WHO") || line.ends_with("inhibitors listed.") {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 7 {
            continue;
        }
        let Ok(pid) = fields[3].parse::<u32>() else {
            continue;
        };

        let what = fields[5];
        let why = fields[6..fields.len().saturating_sub(1)].join(" ");
        inhibitors.push(SleepInhibitor {
            pid: Some(pid),
            name: fields[4].to_string(),
            reason: why,
            kind: classify_inhibit_what(what),
            details: line.to_string(),
            duration: String::new(),
        });
    }

    inhibitors
}

fn classify_inhibit_what(what: &str) -> String {
    // WHAT may be a colon-joined list (`sleep:idle`); the strongest class wins.
    if what.split(':').any(|w| w == "sleep") {
        return "PreventSystemSleep".to_string();
    }
    if what.split(':').any(|w| {
        matches!(
            w,
            "handle-power-key" | "handle-suspend-key" | "handle-hibernate-key"
        )
    }) {
        return "PreventSystemSleep".to_string();
    }
    if what.split(':').any(|w| w == "handle-lid-switch") {
        return "PreventDisplaySleep".to_string();
    }
    "PreventUserIdleSystemSleep".to_string()
}

/// An active (non-idle) logind session counts as an inhibitor.
pub fn parse_loginctl_session(output: &str) -> Option<SleepInhibitor> {
    let mut details = String::new();
    for line in output.lines() {
        if line.contains("IdleHint=no") {
            details.push_str(line);
            return Some(SleepInhibitor {
                pid: None,
                name: "Login Session".to_string(),
                reason: "active user session".to_string(),
                kind: "PreventUserIdleSystemSleep".to_string(),
                details,
                duration: String::new(),
            });
        }
        details.push_str(line);
        details.push_str(" | ");
    }
    None
}

/// `gsettings get org.gnome.desktop.session idle-delay` → `uint32 0` means
/// the user disabled idle sleep entirely.
pub fn parse_gsettings_idle_delay(output: &str) -> Option<SleepInhibitor> {
    (output.trim() == "uint32 0").then(|| SleepInhibitor {
        pid: None,
        name: "GNOME Session".to_string(),
        reason: "idle sleep disabled in session settings".to_string(),
        kind: "PreventUserIdleSystemSleep".to_string(),
        details: "idle-delay=0".to_string(),
        duration: String::new(),
    })
}

/// `xset q` reports `DPMS is Disabled` when display power management is off.
pub fn parse_xset_dpms(output: &str) -> Option<SleepInhibitor> {
    output.contains("DPMS is Disabled").then(|| SleepInhibitor {
        pid: None,
        name: "X11 DPMS".to_string(),
        reason: "display power management disabled".to_string(),
        kind: "PreventDisplaySleep".to_string(),
        details: "DPMS is Disabled".to_string(),
        duration: String::new(),
    })
}

// ── powercfg /requests (Windows) ────────────────────────────────────

/// Sections are `DISPLAY:` / `SYSTEM:` / `AWAYMODE:` / `EXECUTION:` /
/// `PERFBOOST:` / `ACTIVELOCKSCREEN:`; entries open with a `[PROCESS]` or
/// `[DRIVER]` tag, optionally followed by a free-text reason line.
pub fn parse_powercfg_requests(output: &str) -> Vec<SleepInhibitor> {
    let mut inhibitors = Vec::new();
    let mut current_kind = String::new();

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == "None." {
            continue;
        }

        if trimmed.ends_with(':') && trimmed.chars().all(|c| c.is_ascii_uppercase() || c == ':') {
            current_kind = match trimmed.trim_end_matches(':') {
                "DISPLAY" => "PreventDisplaySleep",
                "SYSTEM" => "PreventSystemSleep",
                "AWAYMODE" => "PreventUserIdleSystemSleep",
                _ => "PreventUserIdleSystemSleep",
            }
            .to_string();
            continue;
        }

        if trimmed.starts_with('[') {
            let name = trimmed
                .split_once(']')
                .map(|(_, rest)| rest.trim())
                .unwrap_or(trimmed);
            inhibitors.push(SleepInhibitor {
                pid: None,
                name: name.to_string(),
                reason: String::new(),
                kind: current_kind.clone(),
                details: trimmed.to_string(),
                duration: String::new(),
            });
        } else if let Some(last) = inhibitors.last_mut() {
            if last.reason.is_empty() {
                last.reason = trimmed.to_string();
            }
        }
    }

    inhibitors
}
