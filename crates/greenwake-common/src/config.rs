//! Daemon configuration.
//!
//! Loaded from a per-user YAML file. A missing file is created with defaults
//! on first launch; missing keys fall back to defaults on load. All writes go
//! through a temp-file-then-rename so a crash mid-write never leaves a
//! truncated config behind.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

use crate::duration;
use crate::event::{parse_valid_events, EventType};
use crate::strategy::{SleepMode, Strategy};

pub const APP_NAME: &str = "greenwake-guard";

const DEFAULT_TIMED_DURATION: &str = "30m";
const DEFAULT_PROGRAM_SLEEP_DELAY: u64 = 60;
const DEFAULT_WOL_PORT: u16 = 9;
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_VALID_EVENTS: &str = "wol,device";
const DEFAULT_LOG_LEVEL: &str = "debug";

/// External-wake specific settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalWakeConfig {
    /// UDP port the magic-packet listener binds.
    #[serde(default = "default_wol_port")]
    pub wol_port: u16,

    /// Seconds a received event suppresses the idle countdown for.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Comma-separated accepted event types (subset of `wol,device`).
    #[serde(default = "default_valid_events")]
    pub valid_events: String,
}

impl Default for ExternalWakeConfig {
    fn default() -> Self {
        Self {
            wol_port: DEFAULT_WOL_PORT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            valid_events: DEFAULT_VALID_EVENTS.to_string(),
        }
    }
}

/// Top-level config file model. Key names match the YAML file exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub strategy: Strategy,

    #[serde(default)]
    pub sleep_mode: SleepMode,

    /// Initial duration for the `timed` strategy, in `h`/`m`/`s` syntax.
    #[serde(default = "default_timed_duration")]
    pub timed_duration: String,

    #[serde(default)]
    pub external_wake: ExternalWakeConfig,

    /// Seconds of inactivity before program-managed suspend. Values below
    /// the 30 s floor are clamped when the core applies them.
    #[serde(default = "default_program_sleep_delay")]
    pub program_sleep_delay: u64,

    /// One of `debug`, `info`, `error`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            sleep_mode: SleepMode::default(),
            timed_duration: DEFAULT_TIMED_DURATION.to_string(),
            external_wake: ExternalWakeConfig::default(),
            program_sleep_delay: DEFAULT_PROGRAM_SLEEP_DELAY,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

fn default_timed_duration() -> String {
    DEFAULT_TIMED_DURATION.to_string()
}

fn default_program_sleep_delay() -> u64 {
    DEFAULT_PROGRAM_SLEEP_DELAY
}

fn default_wol_port() -> u16 {
    DEFAULT_WOL_PORT
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_valid_events() -> String {
    DEFAULT_VALID_EVENTS.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Config {
    /// Default per-user config path:
    /// `<user-config-dir>/greenwake-guard/config.yaml`.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("cannot determine user config directory")?;
        Ok(base.join(APP_NAME).join("config.yaml"))
    }

    /// Path of the single-instance lock file, next to the config file.
    pub fn lock_path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("cannot determine user config directory")?;
        Ok(base.join(APP_NAME).join(format!("{APP_NAME}.lock")))
    }

    /// Load the config from `path`, writing a default file first if none
    /// exists.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let cfg = Self::default();
            cfg.save(path)
                .with_context(|| format!("failed to write default config to {}", path.display()))?;
            return Ok(cfg);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let cfg: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(cfg)
    }

    /// Atomically write the config to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path.parent().context("config path has no parent directory")?;
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;

        let yaml = serde_yaml::to_string(self).context("failed to serialize config")?;

        let tmp = NamedTempFile::new_in(parent)
            .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
        fs::write(tmp.path(), yaml.as_bytes())
            .with_context(|| format!("failed to write {}", tmp.path().display()))?;
        tmp.persist(path)
            .with_context(|| format!("failed to replace {}", path.display()))?;
        Ok(())
    }

    /// The accepted event types, parsed from their comma-separated form.
    pub fn valid_events(&self) -> Vec<EventType> {
        parse_valid_events(&self.external_wake.valid_events)
    }

    /// The `timed` strategy duration, parsed.
    pub fn timed_duration(&self) -> Result<Duration> {
        duration::parse(&self.timed_duration)
            .with_context(|| format!("invalid timed_duration '{}'", self.timed_duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn first_launch_writes_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let cfg = Config::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.strategy, Strategy::ExternalWake);
        assert_eq!(cfg.sleep_mode, SleepMode::Program);
        assert_eq!(cfg.external_wake.wol_port, 9);
        assert_eq!(cfg.external_wake.timeout_secs, 300);
        assert_eq!(cfg.program_sleep_delay, 60);
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let mut cfg = Config::default();
        cfg.strategy = Strategy::Timed;
        cfg.sleep_mode = SleepMode::System;
        cfg.timed_duration = "1h30m".to_string();
        cfg.external_wake.valid_events = "wol".to_string();
        cfg.save(&path).unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded, cfg);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "strategy: permanent\n").unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.strategy, Strategy::Permanent);
        assert_eq!(cfg.sleep_mode, SleepMode::Program);
        assert_eq!(cfg.timed_duration, "30m");
        assert_eq!(cfg.external_wake.valid_events, "wol,device");
    }

    #[test]
    fn legacy_wol_wake_spelling_loads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "strategy: wol_wake\n").unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.strategy, Strategy::ExternalWake);

        // Saving writes the canonical spelling back.
        cfg.save(&path).unwrap();
        let yaml = fs::read_to_string(&path).unwrap();
        assert!(yaml.contains("external_wake"));
        assert!(!yaml.contains("wol_wake"));
    }

    #[test]
    fn valid_events_and_duration_helpers() {
        let mut cfg = Config::default();
        assert_eq!(cfg.valid_events(), vec![EventType::Wol, EventType::Device]);
        assert_eq!(cfg.timed_duration().unwrap(), Duration::from_secs(1800));

        cfg.timed_duration = "nonsense".to_string();
        assert!(cfg.timed_duration().is_err());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "strategy: [not, a, string\n").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
