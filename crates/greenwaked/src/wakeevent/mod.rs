//! Wake-event sources.
//!
//! Two independent sources feed the core: the UDP magic-packet listener and
//! the platform device-activity probe. Both run as supervised tasks: a
//! source that errors or panics is logged and respawned after a short
//! backoff, never taking the daemon down with it.

pub mod device;
pub mod wol;

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Delay before a failed source is respawned.
pub const RESPAWN_BACKOFF: Duration = Duration::from_secs(1);

/// Run an event source under supervision.
///
/// A clean return ends the task (the source observed shutdown). An error or
/// a panic is logged and the source is restarted after [`RESPAWN_BACKOFF`],
/// unless shutdown has been signalled in the meantime.
pub fn supervise<F, Fut>(
    name: &'static str,
    shutdown: watch::Receiver<bool>,
    mut source: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let run = tokio::spawn(source());
            match run.await {
                Ok(Ok(())) => return,
                Ok(Err(e)) => error!("{name} failed: {e:#}"),
                Err(e) => error!("{name} panicked: {e}"),
            }
            if *shutdown.borrow() {
                return;
            }
            tokio::time::sleep(RESPAWN_BACKOFF).await;
            warn!("restarting {name}");
        }
    })
}
