//! # Social Graph
//!
//! Presence of online players and who is watching whom. Friends lists
//! themselves live in the profiles; the graph only mirrors them for the
//! players currently connected.

use lobby_accounts::normalize_login;
use lobby_core::PeerId;
use lobby_protocol::ident::presence;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default)]
pub struct SocialGraph {
    /// Login → current presence, for players that announced themselves
    presence: HashMap<String, u8>,

    /// Login → peer of the online player with that login
    online: HashMap<String, PeerId>,

    /// Login → peers whose friends list names it
    watchers: HashMap<String, BTreeSet<PeerId>>,

    /// Peer → the logins it watches
    friends: HashMap<PeerId, BTreeSet<String>>,
}

impl SocialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an authenticated player and the friends it lists
    pub fn join<'a>(&mut self, peer: PeerId, login_name: &str, friends: impl IntoIterator<Item = &'a String>) {
        self.online.insert(normalize_login(login_name), peer);
        for friend in friends {
            self.add_friend(peer, friend);
        }
    }

    /// Stop tracking a player, returning the peers that should hear it went offline
    pub fn leave(&mut self, peer: PeerId, login_name: &str) -> Vec<PeerId> {
        let watchers = self.set_presence(login_name, presence::OFFLINE);

        let key = normalize_login(login_name);
        if self.online.get(&key) == Some(&peer) {
            self.online.remove(&key);
            self.presence.remove(&key);
        }
        for watched in self.friends.remove(&peer).unwrap_or_default() {
            if let Some(set) = self.watchers.get_mut(&watched) {
                set.remove(&peer);
                if set.is_empty() {
                    self.watchers.remove(&watched);
                }
            }
        }
        watchers
    }

    pub fn add_friend(&mut self, peer: PeerId, friend: &str) {
        let key = normalize_login(friend);
        self.watchers.entry(key.clone()).or_default().insert(peer);
        self.friends.entry(peer).or_default().insert(key);
    }

    pub fn remove_friend(&mut self, peer: PeerId, friend: &str) {
        let key = normalize_login(friend);
        if let Some(set) = self.watchers.get_mut(&key) {
            set.remove(&peer);
            if set.is_empty() {
                self.watchers.remove(&key);
            }
        }
        if let Some(set) = self.friends.get_mut(&peer) {
            set.remove(&key);
        }
    }

    /// Record a presence change.
    ///
    /// Returns the watchers to notify, or nothing when the presence did not change.
    pub fn set_presence(&mut self, login_name: &str, value: u8) -> Vec<PeerId> {
        let key = normalize_login(login_name);
        let previous = self.presence.insert(key.clone(), value).unwrap_or(presence::OFFLINE);
        if previous == value {
            return Vec::new();
        }
        self.watchers
            .get(&key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn presence_of(&self, login_name: &str) -> u8 {
        self.presence
            .get(&normalize_login(login_name))
            .copied()
            .unwrap_or(presence::OFFLINE)
    }

    pub fn peer_of(&self, login_name: &str) -> Option<PeerId> {
        self.online.get(&normalize_login(login_name)).copied()
    }
}
