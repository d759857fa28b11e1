//! UDP magic-packet listener.
//!
//! Binds `0.0.0.0:<wol_port>` and feeds one `wol` event into the core per
//! accepted packet. Reads use a one-second deadline so shutdown stays
//! responsive; a socket error observed after shutdown was signalled is the
//! expected closed-connection case and is not logged as an error.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, error, info};

use greenwake_common::event::{EventType, WakeEvent};

use crate::wakelock::WakeLockService;

const READ_DEADLINE: Duration = Duration::from_secs(1);
const MAGIC_PACKET_LEN: usize = 102;
const SYNC_STREAM_LEN: usize = 6;

/// A buffer is a magic packet iff it is exactly 102 bytes and opens with the
/// six-byte `0xFF` synchronization stream. The 16 MAC repetitions that
/// follow are not validated.
pub fn is_magic_packet(data: &[u8]) -> bool {
    data.len() == MAGIC_PACKET_LEN && data[..SYNC_STREAM_LEN].iter().all(|&b| b == 0xFF)
}

/// Listen until shutdown. Bind failures are returned so the supervisor can
/// retry them.
pub async fn run(
    port: u16,
    core: Arc<WakeLockService>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let socket = UdpSocket::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind udp port {port}"))?;
    info!("wake packet listener on 0.0.0.0:{port}");

    let mut buf = [0u8; 1024];
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    debug!("wake packet listener stopping");
                    return Ok(());
                }
            }
            read = tokio::time::timeout(READ_DEADLINE, socket.recv_from(&mut buf)) => {
                match read {
                    // Deadline expiry; loop around and re-check shutdown.
                    Err(_) => {}
                    Ok(Ok((len, addr))) => {
                        if is_magic_packet(&buf[..len]) {
                            debug!("magic packet from {addr}");
                            core.handle_wake_event(WakeEvent::new(
                                EventType::Wol,
                                addr.to_string(),
                            ));
                        }
                    }
                    Ok(Err(e)) => {
                        if *shutdown.borrow() {
                            debug!("wake packet socket closed during shutdown");
                            return Ok(());
                        }
                        error!("udp read failed: {e}");
                    }
                }
            }
        }
    }
}
