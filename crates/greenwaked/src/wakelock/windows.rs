//! Windows power lock: SetThreadExecutionState / SetSuspendState.

use anyhow::{bail, Result};
use std::sync::Mutex;
use tracing::{error, info};

use super::lock::PowerLock;

const ES_CONTINUOUS: u32 = 0x8000_0000;
const ES_SYSTEM_REQUIRED: u32 = 0x0000_0001;
const ES_DISPLAY_REQUIRED: u32 = 0x0000_0002;

#[link(name = "kernel32")]
extern "system" {
    fn SetThreadExecutionState(es_flags: u32) -> u32;
}

#[link(name = "powrprof")]
extern "system" {
    fn SetSuspendState(hibernate: u8, force: u8, wake_events_disabled: u8) -> u8;
}

pub struct WindowsLock {
    held: Mutex<bool>,
}

impl WindowsLock {
    pub fn new() -> Self {
        Self {
            held: Mutex::new(false),
        }
    }
}

impl Default for WindowsLock {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerLock for WindowsLock {
    fn acquire(&self) {
        let mut held = self.held.lock().unwrap();
        if *held {
            return;
        }

        let prev = unsafe {
            SetThreadExecutionState(ES_CONTINUOUS | ES_SYSTEM_REQUIRED | ES_DISPLAY_REQUIRED)
        };
        if prev == 0 {
            error!("SetThreadExecutionState failed");
            return;
        }
        *held = true;
        info!("wake lock acquired via SetThreadExecutionState");
    }

    fn release(&self) {
        let mut held = self.held.lock().unwrap();
        if !*held {
            return;
        }

        let prev = unsafe { SetThreadExecutionState(ES_CONTINUOUS) };
        if prev == 0 {
            error!("SetThreadExecutionState reset failed");
            return;
        }
        *held = false;
        info!("wake lock released");
    }

    fn force_sleep(&self) -> Result<()> {
        self.release();

        let ok = unsafe { SetSuspendState(0, 0, 0) };
        if ok == 0 {
            bail!("SetSuspendState refused to suspend");
        }
        Ok(())
    }
}
