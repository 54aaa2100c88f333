//! # Player Table
//!
//! All connected players, indexed by connection, by player id and by login.

use crate::session::PlayerSession;
use lobby_accounts::normalize_login;
use lobby_core::{IdAllocator, PeerId, PlayerId, Result, ServerError};
use std::collections::HashMap;

/// Player table
///
/// # Purpose
/// Owns every [`PlayerSession`] and the temporary id range handed to
/// sessions that have not proven an account.
///
/// # Thread Safety
/// None needed: only the hub touches it.
#[derive(Debug)]
pub struct PlayerTable {
    sessions: HashMap<PeerId, PlayerSession>,

    /// Key: player id, temporary or verified
    by_id: HashMap<PlayerId, PeerId>,

    /// Key: normalized login name
    by_login: HashMap<String, PeerId>,

    temp_ids: IdAllocator,
}

impl Default for PlayerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerTable {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            by_id: HashMap::new(),
            by_login: HashMap::new(),
            temp_ids: IdAllocator::new(PlayerId::TEMPORARY),
        }
    }

    /// Reserve the lowest free temporary id for a new session
    pub fn allocate_temp_id(&mut self) -> Result<PlayerId> {
        self.temp_ids
            .allocate()
            .map(PlayerId::new)
            .ok_or_else(|| ServerError::InvalidData("temporary player ids exhausted".into()))
    }

    pub fn insert(&mut self, session: PlayerSession) {
        tracing::debug!("Adding player {} as {}", session.peer_id(), session.player_id);
        self.by_id.insert(session.player_id, session.peer_id());
        self.sessions.insert(session.peer_id(), session);
    }

    /// Drop a session and release everything it indexed
    pub fn remove(&mut self, peer: PeerId) -> Option<PlayerSession> {
        let session = self.sessions.remove(&peer)?;
        tracing::debug!("Removing player {} ({})", peer, session.player_id);

        if self.by_id.get(&session.player_id) == Some(&peer) {
            self.by_id.remove(&session.player_id);
        }
        let key = normalize_login(&session.login_name);
        if self.by_login.get(&key) == Some(&peer) {
            self.by_login.remove(&key);
        }
        if session.player_id.is_temporary() {
            self.temp_ids.release(session.player_id.get());
        }
        Some(session)
    }

    pub fn get(&self, peer: PeerId) -> Option<&PlayerSession> {
        self.sessions.get(&peer)
    }

    pub fn get_mut(&mut self, peer: PeerId) -> Option<&mut PlayerSession> {
        self.sessions.get_mut(&peer)
    }

    pub fn contains(&self, peer: PeerId) -> bool {
        self.sessions.contains_key(&peer)
    }

    pub fn peer_of(&self, id: PlayerId) -> Option<PeerId> {
        self.by_id.get(&id).copied()
    }

    pub fn peer_of_login(&self, login_name: &str) -> Option<PeerId> {
        self.by_login.get(&normalize_login(login_name)).copied()
    }

    /// Index a session under the login name it authenticated with
    pub fn set_login(&mut self, peer: PeerId, login_name: &str) {
        let Some(session) = self.sessions.get_mut(&peer) else {
            return;
        };
        let old = normalize_login(&session.login_name);
        if self.by_login.get(&old) == Some(&peer) {
            self.by_login.remove(&old);
        }
        session.login_name = login_name.to_string();
        self.by_login.insert(normalize_login(login_name), peer);
    }

    /// Move a session from its temporary id to a verified one.
    ///
    /// The temporary id goes back to the pool.
    pub fn reassign_id(&mut self, peer: PeerId, id: PlayerId) {
        let Some(session) = self.sessions.get_mut(&peer) else {
            return;
        };
        let old = std::mem::replace(&mut session.player_id, id);
        if old == id {
            return;
        }
        tracing::debug!("Player {} merged from {} into {}", peer, old, id);

        if self.by_id.get(&old) == Some(&peer) {
            self.by_id.remove(&old);
        }
        if old.is_temporary() {
            self.temp_ids.release(old.get());
        }
        self.by_id.insert(id, peer);
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerSession> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
