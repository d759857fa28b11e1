//! greenwaked: wake-lock daemon internals.
//!
//! The daemon keeps the host awake when wanted (OS power assertion), lets it
//! sleep when not (system- or program-managed), and reacts to wake stimuli:
//! UDP magic packets, device activity, and facade mutators.
//!
//! Layering: event sources feed [`wakelock::WakeLockService`], which is the
//! only component allowed to touch the platform [`wakelock::PowerLock`].
//! [`power`] is read-only diagnostics and feeds nothing.

pub mod facade;
pub mod instance;
pub mod power;
pub mod wakeevent;
pub mod wakelock;
