//! Outgoing connections that never give up
//!
//! Dials a peer, runs an actor pair on the connection and, once it closes,
//! dials again. Refusals, timeouts and dropped connections all wait the same
//! fixed delay before the next attempt.

use crate::actor::spawn_actor;
use crate::event::HubSender;
use crate::peer::next_peer_id;
use crate::wire::PeerKind;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long a single connect attempt may take
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run_connector<K: PeerKind>(target: SocketAddr, retry_delay: Duration, kind: K, hub: HubSender, shutdown: CancellationToken) {
    let mut attempts: u32 = 0;

    loop {
        let attempt = tokio::select! {
            _ = shutdown.cancelled() => return,
            attempt = timeout(CONNECT_TIMEOUT, TcpStream::connect(target)) => attempt,
        };

        match attempt {
            Ok(Ok(stream)) => {
                attempts = 0;
                let _ = stream.set_nodelay(true);
                let id = next_peer_id();
                info!("Connected to {} as {}", target, id);

                let supervisor = spawn_actor(&kind, stream, target, id, hub.clone());
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = supervisor => warn!("Connection to {} closed, reconnecting in {:?}", target, retry_delay),
                }
            }
            Ok(Err(e)) => {
                attempts += 1;
                // Keep the log quiet while the other side stays down
                if attempts == 1 {
                    warn!("Cannot connect to {}: {}; retrying every {:?}", target, e, retry_delay);
                } else {
                    debug!("Connect attempt {} to {} failed: {}", attempts, target, e);
                }
            }
            Err(_) => {
                attempts += 1;
                debug!("Connect attempt {} to {} timed out", attempts, target);
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = sleep(retry_delay) => {}
        }
    }
}
