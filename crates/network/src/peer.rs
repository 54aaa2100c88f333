//! # Peers
//!
//! A [`Peer`] is the hub's handle on one live connection: its id, remote
//! address and the sending side of its outbound queue. Exactly one exists per
//! connection; clones share the same queue.

use lobby_core::{PeerId, ServerError};
use lobby_protocol::control::{HubToAuthBot, HubToFirewall, HubToLauncher};
use lobby_protocol::Field;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

static NEXT_PEER_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique peer id
pub fn next_peer_id() -> PeerId {
    PeerId(NEXT_PEER_ID.fetch_add(1, Ordering::Relaxed))
}

/// Item on a connection's outbound queue
#[derive(Debug)]
pub enum Outbound<M> {
    Message(M),
    /// Close the connection, optionally carrying the reason
    Disconnect(Option<ServerError>),
}

/// Records for a game client, with the ack to put in the trailer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOut {
    pub records: Vec<Field>,
    pub ack: u32,
}

/// Sending side of one connection
pub struct PeerHandle<M> {
    id: PeerId,
    addr: SocketAddr,
    tx: mpsc::UnboundedSender<Outbound<M>>,
}

impl<M> PeerHandle<M> {
    pub fn new(id: PeerId, addr: SocketAddr, tx: mpsc::UnboundedSender<Outbound<M>>) -> Self {
        Self { id, addr, tx }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queue a message. Returns false once the writer has gone away.
    pub fn send(&self, message: M) -> bool {
        self.tx.send(Outbound::Message(message)).is_ok()
    }

    /// Ask the writer to close the connection
    pub fn disconnect(&self, reason: Option<ServerError>) {
        let _ = self.tx.send(Outbound::Disconnect(reason));
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<M> Clone for PeerHandle<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            addr: self.addr,
            tx: self.tx.clone(),
        }
    }
}

impl<M> fmt::Debug for PeerHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerHandle")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerRole {
    Player,
    GameServer,
    AuthBot,
    Firewall,
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerRole::Player => "player",
            PeerRole::GameServer => "game server",
            PeerRole::AuthBot => "auth bot",
            PeerRole::Firewall => "firewall",
        };
        f.write_str(name)
    }
}

/// One connection, tagged by what is on the other end
#[derive(Debug, Clone)]
pub enum Peer {
    Player(PeerHandle<ClientOut>),
    GameServer(PeerHandle<HubToLauncher>),
    AuthBot(PeerHandle<HubToAuthBot>),
    Firewall(PeerHandle<HubToFirewall>),
}

impl Peer {
    pub fn id(&self) -> PeerId {
        match self {
            Peer::Player(h) => h.id(),
            Peer::GameServer(h) => h.id(),
            Peer::AuthBot(h) => h.id(),
            Peer::Firewall(h) => h.id(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        match self {
            Peer::Player(h) => h.addr(),
            Peer::GameServer(h) => h.addr(),
            Peer::AuthBot(h) => h.addr(),
            Peer::Firewall(h) => h.addr(),
        }
    }

    pub fn ip(&self) -> IpAddr {
        self.addr().ip()
    }

    pub fn role(&self) -> PeerRole {
        match self {
            Peer::Player(_) => PeerRole::Player,
            Peer::GameServer(_) => PeerRole::GameServer,
            Peer::AuthBot(_) => PeerRole::AuthBot,
            Peer::Firewall(_) => PeerRole::Firewall,
        }
    }

    pub fn disconnect(&self, reason: Option<ServerError>) {
        match self {
            Peer::Player(h) => h.disconnect(reason),
            Peer::GameServer(h) => h.disconnect(reason),
            Peer::AuthBot(h) => h.disconnect(reason),
            Peer::Firewall(h) => h.disconnect(reason),
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.role(), self.id(), self.addr())
    }
}
