//! macOS power lock: a held `caffeinate` child process.
//!
//! `caffeinate -i -d -s` asserts against idle, display and system sleep for
//! as long as the child lives, so releasing is just killing it. Suspend goes
//! through `pmset sleepnow`.

use anyhow::{bail, Context, Result};
use std::process::{Child, Command};
use std::sync::Mutex;
use tracing::{error, info};

use super::lock::PowerLock;

pub struct MacosLock {
    caffeinate: Mutex<Option<Child>>,
}

impl MacosLock {
    pub fn new() -> Self {
        Self {
            caffeinate: Mutex::new(None),
        }
    }
}

impl Default for MacosLock {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerLock for MacosLock {
    fn acquire(&self) {
        let mut child = self.caffeinate.lock().unwrap();
        if child.is_some() {
            return;
        }

        match Command::new("caffeinate").args(["-i", "-d", "-s"]).spawn() {
            Ok(c) => {
                info!("wake lock acquired via caffeinate (pid {})", c.id());
                *child = Some(c);
            }
            Err(e) => error!("failed to start caffeinate: {e}"),
        }
    }

    fn release(&self) {
        let mut child = self.caffeinate.lock().unwrap();
        let Some(mut c) = child.take() else {
            return;
        };

        if let Err(e) = c.kill() {
            error!("failed to stop caffeinate (pid {}): {e}", c.id());
            return;
        }
        let _ = c.wait();
        info!("wake lock released");
    }

    fn force_sleep(&self) -> Result<()> {
        self.release();

        let status = Command::new("pmset")
            .arg("sleepnow")
            .status()
            .context("failed to run pmset sleepnow")?;
        if !status.success() {
            bail!("pmset sleepnow exited with {status}");
        }
        Ok(())
    }
}
