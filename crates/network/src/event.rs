//! Events on the hub's inbound queue

use crate::peer::Peer;
use lobby_core::{PeerId, ServerError};
use lobby_protocol::control::{AuthBotToHub, FirewallToHub, LauncherToHub};
use lobby_protocol::Packet;
use tokio::sync::mpsc;

/// Slot number of a scheduled callback
pub type CallbackId = usize;

pub type HubSender = mpsc::UnboundedSender<HubEvent>;
pub type HubReceiver = mpsc::UnboundedReceiver<HubEvent>;

pub fn hub_channel() -> (HubSender, HubReceiver) {
    mpsc::unbounded_channel()
}

/// A parsed request, by the kind of connection it came from
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Client(Packet),
    Launcher(LauncherToHub),
    AuthBot(AuthBotToHub),
    Firewall(FirewallToHub),
}

impl From<Packet> for Inbound {
    fn from(packet: Packet) -> Self {
        Inbound::Client(packet)
    }
}

impl From<LauncherToHub> for Inbound {
    fn from(msg: LauncherToHub) -> Self {
        Inbound::Launcher(msg)
    }
}

impl From<AuthBotToHub> for Inbound {
    fn from(msg: AuthBotToHub) -> Self {
        Inbound::AuthBot(msg)
    }
}

impl From<FirewallToHub> for Inbound {
    fn from(msg: FirewallToHub) -> Self {
        Inbound::Firewall(msg)
    }
}

/// Reports from the process-lifecycle collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LauncherInfo {
    ProcessStarted { server_name: String, process_id: u32 },
    ProcessExited { server_name: String, exit_code: Option<i32> },
}

#[derive(Debug)]
pub enum HubEvent {
    /// Posted by a reader before its first read
    PeerConnected(Peer),
    /// Posted by a reader as its last act, or by a supervisor for a crashed reader
    PeerDisconnected(Peer, Option<ServerError>),
    Request(PeerId, Inbound),
    ExecuteCallback(CallbackId),
    LauncherInfo(LauncherInfo),
}
