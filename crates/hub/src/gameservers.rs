//! # Game Server Registry
//!
//! A launcher connection becomes a listed game server once it has sent its
//! first `ServerInfo`. Later `ServerInfo` messages update the listing in place.

use lobby_core::{GameServerId, IdAllocator, PeerId, Result, ServerError};
use lobby_network::PeerHandle;
use lobby_protocol::control::HubToLauncher;
use lobby_protocol::records::ServerListing;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::Ipv4Addr;

/// What a launcher announces about its server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDetails {
    pub name: String,
    pub description: String,
    pub address: Ipv4Addr,
    pub port: u16,
    pub max_players: u16,
    /// Lowercase hex SHA-256 of the join password
    pub password_hash: Option<String>,
}

/// Ballots against one kick target
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VoteTally {
    /// Which opening of a vote on this server this is
    pub round: u64,
    pub voters: BTreeSet<PeerId>,
}

/// Game server
///
/// # Purpose
/// One registered match server and the players the hub has sent to it.
#[derive(Debug)]
pub struct GameServer {
    pub id: GameServerId,

    /// Connection to the launcher that registered this server
    pub launcher: PeerHandle<HubToLauncher>,

    pub details: ServerDetails,

    /// Sessions currently `OnGameServer` here
    pub players: BTreeSet<PeerId>,

    /// Player id → team, as last reported by the launcher
    pub teams: BTreeMap<u32, u8>,

    /// `(seconds_remaining, counting)`
    pub match_time: Option<(u32, bool)>,

    /// Kick target → open vote
    pub votes: HashMap<PeerId, VoteTally>,

    next_round: u64,
}

impl GameServer {
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.details.max_players as usize
    }

    pub fn is_passworded(&self) -> bool {
        self.details.password_hash.is_some()
    }

    /// Check a join password against the announced hash.
    ///
    /// The password arrives padded to its doubled wire length, so trailing
    /// zero bytes are not part of it.
    pub fn password_matches(&self, candidate: &[u8]) -> bool {
        match &self.details.password_hash {
            None => true,
            Some(expected) => hash_password(candidate).eq_ignore_ascii_case(expected),
        }
    }

    /// Strict majority of the players on this server
    pub fn kick_threshold(&self) -> usize {
        self.players.len() / 2 + 1
    }

    /// The open vote against `target`, and whether it was opened just now
    pub fn vote_against(&mut self, target: PeerId) -> (&mut VoteTally, bool) {
        let opened = !self.votes.contains_key(&target);
        if opened {
            self.next_round += 1;
        }
        let round = self.next_round;
        let tally = self.votes.entry(target).or_insert_with(|| VoteTally {
            round,
            voters: BTreeSet::new(),
        });
        (tally, opened)
    }

    /// Take back one ballot. A vote nobody supports any more is closed.
    pub fn withdraw(&mut self, voter: PeerId, target: PeerId) {
        if let Some(tally) = self.votes.get_mut(&target) {
            tally.voters.remove(&voter);
            if tally.voters.is_empty() {
                self.votes.remove(&target);
            }
        }
    }

    /// Close the vote against `target` if it is still in `round`
    pub fn close_vote(&mut self, target: PeerId, round: Option<u64>) -> Option<VoteTally> {
        match (self.votes.get(&target), round) {
            (Some(tally), Some(round)) if tally.round != round => None,
            _ => self.votes.remove(&target),
        }
    }

    pub fn listing(&self) -> ServerListing {
        ServerListing {
            id: self.id,
            name: self.details.name.clone(),
            description: self.details.description.clone(),
            player_count: self.players.len().min(u16::MAX as usize) as u16,
            max_players: self.details.max_players,
            passworded: self.is_passworded(),
        }
    }

    /// Forward a message to the launcher, logging if it has gone away
    pub fn send(&self, message: HubToLauncher) {
        if !self.launcher.send(message) {
            tracing::debug!("Launcher for server {} is gone, dropping message", self.id);
        }
    }
}

/// Lowercase hex SHA-256 of a join password, zero padding stripped
pub fn hash_password(password: &[u8]) -> String {
    let end = password.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let digest = Sha256::digest(&password[..end]);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[derive(Debug)]
pub struct GameServerTable {
    /// Connected launchers, registered or not
    launchers: HashMap<PeerId, PeerHandle<HubToLauncher>>,
    servers: BTreeMap<GameServerId, GameServer>,
    by_peer: HashMap<PeerId, GameServerId>,
    ids: IdAllocator,
}

impl Default for GameServerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl GameServerTable {
    pub fn new() -> Self {
        Self {
            launchers: HashMap::new(),
            servers: BTreeMap::new(),
            by_peer: HashMap::new(),
            ids: IdAllocator::new(GameServerId::RANGE),
        }
    }

    pub fn add_launcher(&mut self, handle: PeerHandle<HubToLauncher>) {
        self.launchers.insert(handle.id(), handle);
    }

    /// Forget a launcher and unlist its server, if it registered one
    pub fn remove_launcher(&mut self, peer: PeerId) -> Option<GameServer> {
        self.launchers.remove(&peer);
        let id = self.by_peer.remove(&peer)?;
        self.ids.release(id.get());
        self.servers.remove(&id)
    }

    /// Register a launcher's server on its first `ServerInfo`, update it after.
    ///
    /// Returns the server id and whether it was newly registered.
    pub fn register_or_update(&mut self, peer: PeerId, details: ServerDetails) -> Result<(GameServerId, bool)> {
        if let Some(&id) = self.by_peer.get(&peer) {
            if let Some(server) = self.servers.get_mut(&id) {
                server.details = details;
                return Ok((id, false));
            }
        }

        let launcher = self
            .launchers
            .get(&peer)
            .cloned()
            .ok_or_else(|| ServerError::ProtocolViolation(format!("{} is not a launcher", peer)))?;
        let id = self
            .ids
            .allocate()
            .map(GameServerId::new)
            .ok_or_else(|| ServerError::InvalidData("game server ids exhausted".into()))?;

        self.servers.insert(
            id,
            GameServer {
                id,
                launcher,
                details,
                players: BTreeSet::new(),
                teams: BTreeMap::new(),
                match_time: None,
                votes: HashMap::new(),
                next_round: 0,
            },
        );
        self.by_peer.insert(peer, id);
        Ok((id, true))
    }

    pub fn get(&self, id: GameServerId) -> Option<&GameServer> {
        self.servers.get(&id)
    }

    pub fn get_mut(&mut self, id: GameServerId) -> Option<&mut GameServer> {
        self.servers.get_mut(&id)
    }

    pub fn contains(&self, id: GameServerId) -> bool {
        self.servers.contains_key(&id)
    }

    /// Server registered by the given launcher connection
    pub fn by_peer(&self, peer: PeerId) -> Option<GameServerId> {
        self.by_peer.get(&peer).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<GameServerId> {
        self.servers
            .values()
            .find(|s| s.details.name == name)
            .map(|s| s.id)
    }

    /// Rows for the server browser, in id order
    pub fn listings(&self) -> Vec<ServerListing> {
        self.servers.values().map(GameServer::listing).collect()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn details(name: &str) -> ServerDetails {
        ServerDetails {
            name: name.to_string(),
            description: "CTF".to_string(),
            address: Ipv4Addr::new(10, 0, 0, 5),
            port: 7777,
            max_players: 2,
            password_hash: None,
        }
    }

    fn table_with_launcher(peer: u64) -> GameServerTable {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut table = GameServerTable::new();
        table.add_launcher(PeerHandle::new(PeerId(peer), "10.0.0.5:5000".parse().unwrap(), tx));
        table
    }

    #[test]
    fn test_first_info_registers_later_info_updates() {
        let mut table = table_with_launcher(1);
        let (id, new) = table.register_or_update(PeerId(1), details("alpha")).unwrap();
        assert!(new);
        assert_eq!(id, GameServerId::new(1));

        let (again, new) = table.register_or_update(PeerId(1), details("renamed")).unwrap();
        assert!(!new);
        assert_eq!(again, id);
        assert_eq!(table.by_name("renamed"), Some(id));
        assert_eq!(table.listings().len(), 1);
    }

    #[test]
    fn test_unknown_launcher_is_rejected() {
        let mut table = GameServerTable::new();
        let err = table.register_or_update(PeerId(3), details("x")).unwrap_err();
        assert!(matches!(err, ServerError::ProtocolViolation(_)));
    }

    #[test]
    fn test_removal_frees_id() {
        let mut table = table_with_launcher(1);
        table.register_or_update(PeerId(1), details("alpha")).unwrap();
        assert!(table.remove_launcher(PeerId(1)).is_some());
        assert!(table.is_empty());

        let (tx, _rx) = mpsc::unbounded_channel();
        table.add_launcher(PeerHandle::new(PeerId(2), "10.0.0.6:5000".parse().unwrap(), tx));
        let (id, _) = table.register_or_update(PeerId(2), details("beta")).unwrap();
        assert_eq!(id, GameServerId::new(1));
    }

    #[test]
    fn test_password_hash_ignores_wire_padding() {
        let mut table = table_with_launcher(1);
        let mut d = details("locked");
        d.password_hash = Some(hash_password(b"secret").to_uppercase());
        let (id, _) = table.register_or_update(PeerId(1), d).unwrap();

        let server = table.get(id).unwrap();
        assert!(server.is_passworded());
        assert!(server.password_matches(b"secret\0\0\0\0\0\0"));
        assert!(!server.password_matches(b"guess"));
        assert_eq!(server.kick_threshold(), 1);
    }

    #[test]
    fn test_reopened_vote_gets_new_round() {
        let mut table = table_with_launcher(1);
        let (id, _) = table.register_or_update(PeerId(1), details("alpha")).unwrap();
        let server = table.get_mut(id).unwrap();
        let (voter, target) = (PeerId(20), PeerId(21));

        let (tally, opened) = server.vote_against(target);
        assert!(opened);
        tally.voters.insert(voter);
        let first = tally.round;
        assert!(!server.vote_against(target).1);

        server.withdraw(voter, target);
        assert!(server.votes.is_empty());

        let (tally, opened) = server.vote_against(target);
        assert!(opened);
        tally.voters.insert(voter);
        let second = tally.round;
        assert_ne!(first, second);

        // A timer from the first round leaves the second alone
        assert!(server.close_vote(target, Some(first)).is_none());
        assert!(server.votes.contains_key(&target));
        assert_eq!(server.close_vote(target, Some(second)).map(|t| t.voters.len()), Some(1));
        assert!(server.votes.is_empty());
    }
}
