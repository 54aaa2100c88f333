//! Accept loops for incoming connections

use crate::actor::spawn_actor;
use crate::event::HubSender;
use crate::peer::next_peer_id;
use crate::wire::PeerKind;
use lobby_core::{Result, ServerError};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const BACKLOG: i32 = 1024;

/// Bind a listening socket with address reuse, so a restarted server can
/// take its port back while old connections sit in TIME_WAIT.
///
/// A port that cannot be bound is a configuration problem and fatal.
pub fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    let setup = |socket: &Socket| -> std::io::Result<()> {
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(BACKLOG)
    };
    setup(&socket).map_err(|e| ServerError::Config(format!("cannot listen on {}: {}", addr, e)))?;

    let std_listener: std::net::TcpListener = socket.into();
    Ok(TcpListener::from_std(std_listener)?)
}

/// Accept connections until `shutdown` fires, one actor pair per socket
pub async fn serve<K: PeerKind>(listener: TcpListener, kind: K, hub: HubSender, shutdown: CancellationToken) -> Result<()> {
    let local = listener.local_addr()?;
    info!("Listening on {}", local);

    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Listener on {} shutting down", local);
                return Ok(());
            }
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("TCP_NODELAY on {}: {}", addr, e);
                }
                let id = next_peer_id();
                debug!("Accepted {} as {} on {}", addr, id, local);
                spawn_actor(&kind, stream, addr, id, hub.clone());
            }
            Err(e) => {
                // Per-connection accept errors (e.g. aborted handshakes) are not fatal
                warn!("Accept on {} failed: {}", local, e);
            }
        }
    }
}
