//! Single-instance lock.
//!
//! A JSON file records which process owns the daemon. Startup refuses when
//! the recorded PID is still alive; a stale file (dead PID, or unparseable
//! leftovers from a crash) is reclaimed. The file is deleted on clean exit.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, info, warn};

use greenwake_common::config::Config;

#[derive(Debug, Serialize, Deserialize)]
struct ProcessInfo {
    pid: u32,
    start_time: DateTime<Utc>,
    config: Config,
}

#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    held: bool,
}

impl InstanceLock {
    /// Claim the lock at `path`, recording this process and its config.
    ///
    /// Fails when another live process holds it; the caller should treat
    /// that as a fatal startup error.
    pub fn acquire(path: &Path, config: &Config) -> Result<Self> {
        if path.exists() {
            match read_owner(path) {
                Ok(owner) if owner.pid != std::process::id() && pid_alive(owner.pid) => {
                    bail!(
                        "another instance is already running (pid {}, started {})",
                        owner.pid,
                        owner.start_time.format("%Y-%m-%d %H:%M:%S")
                    );
                }
                Ok(owner) => {
                    info!("reclaiming stale lock file (pid {} is gone)", owner.pid);
                    fs::remove_file(path)
                        .with_context(|| format!("failed to remove {}", path.display()))?;
                }
                Err(e) => {
                    warn!("unreadable lock file, reclaiming: {e:#}");
                    fs::remove_file(path)
                        .with_context(|| format!("failed to remove {}", path.display()))?;
                }
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let info = ProcessInfo {
            pid: std::process::id(),
            start_time: Utc::now(),
            config: config.clone(),
        };
        let json = serde_json::to_string_pretty(&info).context("failed to serialize lock info")?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        debug!("instance lock claimed at {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            held: true,
        })
    }

    pub fn release(&mut self) {
        if !self.held {
            return;
        }
        self.held = false;
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("failed to remove lock file {}: {e}", self.path.display());
        } else {
            debug!("instance lock released");
        }
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        self.release();
    }
}

fn read_owner(path: &Path) -> Result<ProcessInfo> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// The zero-signal probe, portable edition: ask the process table.
fn pid_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).is_some()
}
