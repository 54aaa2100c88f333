//! Player profile data

use lobby_core::{LoadoutSlot, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Largest number of friends a profile keeps
pub const MAX_FRIENDS: usize = 100;

/// Everything persisted about one account
///
/// # Purpose
/// Loaded when a player logs in, mutated by the hub while they are online,
/// and saved when their session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Name the account logs in with, as typed at registration
    pub login_name: String,

    /// Persistent id, always in the verified range
    pub player_id: PlayerId,

    /// Password bytes exactly as the client sends them
    pub password: Vec<u8>,

    /// Name shown to other players
    pub display_name: String,

    pub xp: u32,
    pub rank: u16,
    pub gold: u32,

    /// Equipped items, at most one per `(class, loadout, slot)`
    #[serde(default)]
    pub loadouts: Vec<LoadoutSlot>,

    /// Friends by normalized login name
    #[serde(default)]
    pub friends: BTreeSet<String>,
}

impl ProfileRecord {
    pub fn new(login_name: &str, player_id: PlayerId, password: Vec<u8>) -> Self {
        Self {
            login_name: login_name.to_string(),
            player_id,
            password,
            display_name: login_name.to_string(),
            xp: 0,
            rank: 1,
            gold: 0,
            loadouts: Vec::new(),
            friends: BTreeSet::new(),
        }
    }

    pub fn password_matches(&self, candidate: &[u8]) -> bool {
        self.password == candidate
    }

    /// Equip an item, replacing whatever held the same slot
    pub fn set_loadout(&mut self, slot: LoadoutSlot) {
        match self.loadouts.iter_mut().find(|s| s.same_slot(&slot)) {
            Some(existing) => existing.item_id = slot.item_id,
            None => self.loadouts.push(slot),
        }
    }

    /// Returns false if already present, the list is full, or it names ourselves
    pub fn add_friend(&mut self, login_name: &str) -> bool {
        let key = normalize_login(login_name);
        if key == normalize_login(&self.login_name) || self.friends.len() >= MAX_FRIENDS {
            return false;
        }
        self.friends.insert(key)
    }

    pub fn remove_friend(&mut self, login_name: &str) -> bool {
        self.friends.remove(&normalize_login(login_name))
    }
}

/// Login names compare case-insensitively
pub fn normalize_login(login_name: &str) -> String {
    login_name.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ProfileRecord {
        ProfileRecord::new("Alice", PlayerId::new(1), b"secret".to_vec())
    }

    #[test]
    fn test_set_loadout_replaces_same_slot() {
        let mut p = profile();
        let slot = LoadoutSlot { class_id: 1, loadout: 0, slot: 2, item_id: 10 };
        p.set_loadout(slot);
        p.set_loadout(LoadoutSlot { item_id: 11, ..slot });
        p.set_loadout(LoadoutSlot { slot: 3, ..slot });
        assert_eq!(p.loadouts.len(), 2);
        assert_eq!(p.loadouts[0].item_id, 11);
    }

    #[test]
    fn test_friends_are_case_insensitive() {
        let mut p = profile();
        assert!(p.add_friend("Bob"));
        assert!(!p.add_friend("BOB"));
        assert!(!p.add_friend("alice"));
        assert!(p.friends.contains("bob"));
        assert!(p.remove_friend("bOb"));
        assert!(p.friends.is_empty());
    }

    #[test]
    fn test_serde_defaults() {
        let json = r#"{"login_name":"x","player_id":4,"password":[1,2],"display_name":"X","xp":0,"rank":1,"gold":0}"#;
        let p: ProfileRecord = serde_json::from_str(json).unwrap();
        assert!(p.loadouts.is_empty());
        assert!(p.password_matches(&[1, 2]));
    }
}
