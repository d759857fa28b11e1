//! Duration parsing and formatting for the config file and status display.
//!
//! The config key `timed_duration` uses the compact `h`/`m`/`s` syntax
//! (`"30m"`, `"1h30m"`, `"90s"`). Bare numbers are rejected: a unit is
//! always required so a stray `30` cannot silently mean either unit.

use anyhow::{bail, Result};
use std::time::Duration;

/// Parse a duration written as a sequence of `<number><unit>` groups.
pub fn parse(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        bail!("empty duration");
    }

    let mut total_secs: u64 = 0;
    let mut digits = String::new();
    let mut saw_group = false;

    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            bail!("invalid duration '{input}': unit '{c}' without a number");
        }
        let value: u64 = digits.parse()?;
        let unit_secs = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            other => bail!("invalid duration '{input}': unknown unit '{other}'"),
        };
        total_secs += value * unit_secs;
        digits.clear();
        saw_group = true;
    }

    if !digits.is_empty() {
        bail!("invalid duration '{input}': trailing number without a unit");
    }
    if !saw_group {
        bail!("invalid duration '{input}'");
    }

    Ok(Duration::from_secs(total_secs))
}

/// Render a duration in the compact config syntax (`1h30m`, `45s`).
pub fn format_compact(d: Duration) -> String {
    let total = d.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 || out.is_empty() {
        out.push_str(&format!("{seconds}s"));
    }
    out
}

/// Render a duration as `HH:MM:SS` for the status display.
pub fn format_hms(d: Duration) -> String {
    let total = d.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_units() {
        assert_eq!(parse("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn parses_compound_durations() {
        assert_eq!(parse("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse("1h2m3s").unwrap(), Duration::from_secs(3723));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse("").is_err());
        assert!(parse("30").is_err());
        assert!(parse("m30").is_err());
        assert!(parse("30x").is_err());
        assert!(parse("ten minutes").is_err());
    }

    #[test]
    fn compact_round_trip() {
        for raw in ["30m", "1h30m", "45s", "2h"] {
            let parsed = parse(raw).unwrap();
            assert_eq!(parse(&format_compact(parsed)).unwrap(), parsed);
        }
    }

    #[test]
    fn hms_formatting() {
        assert_eq!(format_hms(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_hms(Duration::from_secs(3723)), "01:02:03");
        assert_eq!(format_hms(Duration::from_secs(86400)), "24:00:00");
    }
}
