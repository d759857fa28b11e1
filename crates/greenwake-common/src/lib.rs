//! Shared types for the greenwake-guard daemon.
//!
//! This crate carries everything the daemon and any companion surface (tray,
//! ctl) must agree on: the YAML configuration model, the wake-event model,
//! the strategy/sleep-mode vocabulary, duration parsing, and logging setup.

pub mod config;
pub mod duration;
pub mod event;
pub mod logging;
pub mod strategy;

pub use config::Config;
pub use event::{EventType, WakeEvent};
pub use strategy::{SleepMode, Strategy};
