//! Platform power-assertion contract.
//!
//! Three operations, no state exposed. `acquire`/`release` are idempotent
//! and infallible by contract: a backend failure is logged and the prior
//! state kept, because stalling the state machine is worse than a transient
//! policy mismatch. Backends never call back into the core.

use anyhow::Result;

pub trait PowerLock: Send + Sync {
    /// Keep the OS from sleeping until [`release`](Self::release). A second
    /// call while already held is a no-op.
    fn acquire(&self);

    /// Drop the assertion if held; no-op otherwise.
    fn release(&self);

    /// Release, then command the OS to suspend immediately. The OS may
    /// refuse (e.g. recent user activity); the error is surfaced to the
    /// caller and never retried here.
    fn force_sleep(&self) -> Result<()>;
}

/// The power lock for the build target.
pub fn platform_lock() -> Box<dyn PowerLock> {
    #[cfg(target_os = "macos")]
    {
        Box::new(super::macos::MacosLock::new())
    }
    #[cfg(target_os = "linux")]
    {
        Box::new(super::linux::LinuxLock::new())
    }
    #[cfg(target_os = "windows")]
    {
        Box::new(super::windows::WindowsLock::new())
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
compile_error!("greenwaked supports macOS, Linux and Windows only");
