//! Firewall collaborator link
//!
//! Membership commands go to the firewall daemon over its control
//! connection. While the daemon is unreachable they are queued and flushed,
//! in order, once it connects again.

use lobby_core::PeerId;
use lobby_network::PeerHandle;
use lobby_protocol::control::{FirewallAction, FirewallList, HubToFirewall};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::net::IpAddr;

#[derive(Debug, Default)]
pub struct FirewallLink {
    peer: Option<PeerHandle<HubToFirewall>>,
    backlog: VecDeque<HubToFirewall>,

    /// Whitelisted address → players on game servers from it
    whitelist: HashMap<IpAddr, usize>,

    blacklist: BTreeSet<IpAddr>,

    /// Commands sent and not yet acknowledged
    unacked: usize,
}

impl FirewallLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The daemon connected: send everything queued while it was away
    pub fn attach(&mut self, handle: PeerHandle<HubToFirewall>) {
        tracing::info!("Firewall connected, flushing {} queued commands", self.backlog.len());
        self.peer = Some(handle);
        while let Some(command) = self.backlog.pop_front() {
            if !self.deliver(command) {
                break;
            }
        }
    }

    pub fn detach(&mut self, peer: PeerId) {
        if self.peer.as_ref().map(PeerHandle::id) == Some(peer) {
            tracing::warn!("Firewall disconnected, queueing commands until it is back");
            self.peer = None;
            self.unacked = 0;
        }
    }

    pub fn is_attached(&self) -> bool {
        self.peer.is_some()
    }

    pub fn peer_id(&self) -> Option<PeerId> {
        self.peer.as_ref().map(PeerHandle::id)
    }

    /// Let an address reach the game servers. Counted per player.
    pub fn whitelist(&mut self, address: IpAddr) {
        let count = self.whitelist.entry(address).or_insert(0);
        *count += 1;
        if *count == 1 {
            self.issue(FirewallList::Whitelist, FirewallAction::Add, Some(address));
        }
    }

    /// Undo one [`whitelist`](Self::whitelist); the address is removed with its last player
    pub fn unwhitelist(&mut self, address: IpAddr) {
        let Some(count) = self.whitelist.get_mut(&address) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.whitelist.remove(&address);
            self.issue(FirewallList::Whitelist, FirewallAction::Remove, Some(address));
        }
    }

    pub fn blacklist(&mut self, address: IpAddr) {
        if self.blacklist.insert(address) {
            self.issue(FirewallList::Blacklist, FirewallAction::Add, Some(address));
        }
    }

    pub fn unblacklist(&mut self, address: IpAddr) {
        if self.blacklist.remove(&address) {
            self.issue(FirewallList::Blacklist, FirewallAction::Remove, Some(address));
        }
    }

    pub fn is_blacklisted(&self, address: IpAddr) -> bool {
        self.blacklist.contains(&address)
    }

    pub fn is_whitelisted(&self, address: IpAddr) -> bool {
        self.whitelist.contains_key(&address)
    }

    /// Empty both lists, on the daemon and here
    pub fn reset(&mut self) {
        self.whitelist.clear();
        self.blacklist.clear();
        self.issue(FirewallList::Whitelist, FirewallAction::Reset, None);
        self.issue(FirewallList::Blacklist, FirewallAction::Reset, None);
    }

    pub fn on_ack(&mut self) {
        self.unacked = self.unacked.saturating_sub(1);
        tracing::debug!("Firewall ack, {} outstanding", self.unacked);
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    fn issue(&mut self, list: FirewallList, action: FirewallAction, address: Option<IpAddr>) {
        let command = HubToFirewall::SetMembership { list, action, address };
        if !self.backlog.is_empty() || !self.deliver(command.clone()) {
            self.backlog.push_back(command);
        }
    }

    fn deliver(&mut self, command: HubToFirewall) -> bool {
        let Some(peer) = &self.peer else {
            return false;
        };
        if peer.send(command.clone()) {
            self.unacked += 1;
            true
        } else {
            self.peer = None;
            self.backlog.push_front(command);
            false
        }
    }
}
