//! Wake-event model.
//!
//! Every external stimulus the daemon reacts to is normalized into a
//! [`WakeEvent`] before it reaches the wake-lock core. The core filters
//! events by type against the configured accepted set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classes of wake stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// A Wake-on-LAN magic packet received on the UDP listener.
    Wol,
    /// Keyboard/mouse activity observed by the platform device probe.
    Device,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wol => f.write_str("wol"),
            Self::Device => f.write_str("device"),
        }
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "wol" => Ok(Self::Wol),
            "device" => Ok(Self::Device),
            other => Err(format!("unknown event type: '{other}'")),
        }
    }
}

/// A single wake stimulus. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeEvent {
    pub event_type: EventType,
    /// Where the stimulus came from: the remote `ip:port` for a magic
    /// packet, a device node or `user_activity` for the device probe.
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

impl WakeEvent {
    pub fn new(event_type: EventType, source: impl Into<String>) -> Self {
        Self {
            event_type,
            source: source.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Parse a comma-separated accepted-events list (`"wol,device"`).
///
/// Unknown entries are skipped; duplicates collapse.
pub fn parse_valid_events(raw: &str) -> Vec<EventType> {
    let mut events = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Ok(event_type) = part.parse::<EventType>() {
            if !events.contains(&event_type) {
                events.push(event_type);
            }
        }
    }
    events
}

/// Render an accepted-events list back to its config form.
pub fn format_valid_events(events: &[EventType]) -> String {
    events
        .iter()
        .map(EventType::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
