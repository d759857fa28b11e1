//! Wake strategy and sleep mode vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the daemon decides whether to hold a power assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Hold the assertion only during the window following an external wake
    /// event. Older config files call this `wol_wake`; both spellings load.
    #[serde(alias = "wol_wake")]
    ExternalWake,
    /// Hold the assertion unconditionally.
    Permanent,
    /// Hold the assertion for a fixed duration, then fall back to
    /// `external_wake`.
    Timed,
}

impl Default for Strategy {
    fn default() -> Self {
        Self::ExternalWake
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ExternalWake => "external_wake",
            Self::Permanent => "permanent",
            Self::Timed => "timed",
        };
        f.write_str(s)
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "external_wake" | "wol_wake" => Ok(Self::ExternalWake),
            "permanent" => Ok(Self::Permanent),
            "timed" => Ok(Self::Timed),
            other => Err(format!("unknown strategy: '{other}'")),
        }
    }
}

/// Who decides when the host actually suspends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepMode {
    /// The OS sleeps the host whenever no assertion is held.
    System,
    /// The daemon commands suspend itself after an idle grace period.
    Program,
}

impl Default for SleepMode {
    fn default() -> Self {
        Self::Program
    }
}

impl fmt::Display for SleepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::System => "system",
            Self::Program => "program",
        };
        f.write_str(s)
    }
}

impl FromStr for SleepMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "program" => Ok(Self::Program),
            other => Err(format!("unknown sleep mode: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_accepts_legacy_spelling() {
        assert_eq!("wol_wake".parse::<Strategy>(), Ok(Strategy::ExternalWake));
        assert_eq!(
            "external_wake".parse::<Strategy>(),
            Ok(Strategy::ExternalWake)
        );
    }

    #[test]
    fn strategy_displays_canonical_name() {
        assert_eq!(Strategy::ExternalWake.to_string(), "external_wake");
        assert_eq!(Strategy::Timed.to_string(), "timed");
    }

    #[test]
    fn unknown_values_are_rejected() {
        assert!("forever".parse::<Strategy>().is_err());
        assert!("auto".parse::<SleepMode>().is_err());
    }
}
