//! # Connection Actors
//!
//! Every connection is served by two tasks that share nothing but queues:
//!
//! - the **reader** posts `PeerConnected`, then decodes frames into requests
//!   for the hub. When the socket closes or a frame is bad it posts
//!   `PeerDisconnected` and exits. It is the only task that reports teardown.
//! - the **writer** drains the peer's outbound queue. A failed write does not
//!   stop it; only the `Disconnect` sentinel does. On exit it cancels the
//!   reader.
//!
//! A third supervisor task awaits both and turns a panic in either into an
//! ordinary disconnect, so one broken connection never takes the hub down.
//!
//! ```text
//!  socket ──► reader ──► hub queue ──► hub ──► peer queue ──► writer ──► socket
//! ```

use crate::event::{HubEvent, HubSender};
use crate::peer::{Outbound, Peer, PeerHandle};
use crate::ratelimit::TokenBucket;
use crate::wire::{MessageReader, MessageWriter, PeerKind};
use futures::{SinkExt, StreamExt};
use lobby_core::{PeerId, ServerError};
use lobby_protocol::ChunkCodec;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// Start the actor pair for an accepted or dialed socket.
///
/// Returns the supervisor, which finishes once both halves have exited.
pub fn spawn_actor<K: PeerKind>(kind: &K, stream: TcpStream, addr: SocketAddr, id: PeerId, hub: HubSender) -> JoinHandle<()> {
    let (read_half, write_half) = stream.into_split();
    spawn_actor_on(kind, read_half, write_half, addr, id, hub)
}

/// Same as [`spawn_actor`] over any pair of byte streams
pub fn spawn_actor_on<K, R, W>(kind: &K, read_half: R, write_half: W, addr: SocketAddr, id: PeerId, hub: HubSender) -> JoinHandle<()>
where
    K: PeerKind,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let peer = K::peer(PeerHandle::new(id, addr, tx));
    let cancel = CancellationToken::new();

    let frames = FramedRead::new(read_half, ChunkCodec::new(kind.max_chunk()));
    let sink = FramedWrite::new(write_half, ChunkCodec::new(kind.max_chunk()));
    let bucket = kind.rate_limit().map(TokenBucket::new);

    let reader = tokio::spawn(read_loop(
        peer.clone(),
        frames,
        kind.reader(),
        bucket,
        hub.clone(),
        cancel.clone(),
    ));
    let writer = tokio::spawn(write_loop(id, sink, kind.writer(), rx, cancel));

    tokio::spawn(supervise(peer, reader, writer, hub))
}

async fn read_loop<S, R>(
    peer: Peer,
    mut frames: FramedRead<S, ChunkCodec>,
    mut reader: R,
    mut bucket: Option<TokenBucket>,
    hub: HubSender,
    cancel: CancellationToken,
) where
    S: AsyncRead + Unpin,
    R: MessageReader,
{
    if hub.send(HubEvent::PeerConnected(peer.clone())).is_err() {
        return;
    }

    let id = peer.id();
    let error = loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break None,
            next = frames.next() => next,
        };

        let message = match next {
            None => break None,
            Some(Err(e)) => break Some(e),
            Some(Ok(message)) => message,
        };

        if let Some(bucket) = bucket.as_mut() {
            if !bucket.try_acquire() {
                break Some(ServerError::RateLimitExceeded);
            }
        }

        trace!("{} <- {} bytes", id, message.len());
        match reader.read(&message) {
            Ok(request) => {
                if hub.send(HubEvent::Request(id, request)).is_err() {
                    // Hub is gone; nobody left to report to
                    return;
                }
            }
            Err(e) => break Some(e),
        }
    };

    let error = match error {
        Some(e) if e.is_connection_reset() => {
            debug!("{} reset by peer", peer);
            None
        }
        other => other,
    };

    let _ = hub.send(HubEvent::PeerDisconnected(peer, error));
}

async fn write_loop<S, M, W>(
    id: PeerId,
    mut sink: FramedWrite<S, ChunkCodec>,
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Outbound<M>>,
    cancel: CancellationToken,
) -> Option<ServerError>
where
    S: AsyncWrite + Unpin,
    W: MessageWriter<M>,
{
    // Stops the reader however this task ends
    let _guard = cancel.drop_guard();
    let mut broken = false;

    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Message(message) => {
                if broken {
                    continue;
                }
                let bytes = match writer.write(message) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("{} dropping unencodable message: {}", id, e);
                        continue;
                    }
                };
                trace!("{} -> {} bytes", id, bytes.len());
                if let Err(e) = sink.send(bytes).await {
                    // The reader will notice the dead socket and report it
                    debug!("{} write failed: {}", id, e);
                    broken = true;
                }
            }
            Outbound::Disconnect(reason) => {
                let _ = sink.close().await;
                return reason;
            }
        }
    }

    None
}

async fn supervise(peer: Peer, reader: JoinHandle<()>, writer: JoinHandle<Option<ServerError>>, hub: HubSender) {
    if let Err(e) = reader.await {
        if e.is_panic() {
            error!("{} reader crashed", peer);
            let fault = ServerError::ActorFault(format!("reader of {} panicked", peer.id()));
            let _ = hub.send(HubEvent::PeerDisconnected(peer.clone(), Some(fault)));
        }
    }

    match writer.await {
        Ok(Some(reason)) => debug!("{} closed: {}", peer, reason),
        Ok(None) => debug!("{} closed", peer),
        Err(e) if e.is_panic() => error!("{} writer crashed", peer),
        Err(_) => {}
    }
}
