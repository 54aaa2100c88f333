//! Storage collaborator
//!
//! The hub loads a profile at login, saves it when the session ends and
//! registers new accounts. Persistence format is the store's business.

use crate::error::{AccountError, Result};
use crate::profile::{normalize_login, ProfileRecord};
use lobby_core::{IdAllocator, PlayerId};
use std::collections::HashMap;
use tracing::debug;

pub trait AccountStore: Send {
    /// Fails with `NotFound` for an unknown login name
    fn load_player(&self, login_name: &str) -> Result<ProfileRecord>;

    fn save_player(&mut self, login_name: &str, profile: &ProfileRecord) -> Result<()>;

    /// Create an account with a fresh verified id
    fn register_player(&mut self, login_name: &str, password: &[u8]) -> Result<ProfileRecord>;
}

/// Keeps every profile in memory for the life of the process
#[derive(Debug)]
pub struct MemoryStore {
    profiles: HashMap<String, ProfileRecord>,
    ids: IdAllocator,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            profiles: HashMap::new(),
            ids: IdAllocator::new(PlayerId::VERIFIED),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing profile, keeping its id
    pub fn insert(&mut self, profile: ProfileRecord) -> Result<()> {
        let key = normalize_login(&profile.login_name);
        if self.profiles.contains_key(&key) {
            return Err(AccountError::AlreadyExists(profile.login_name));
        }
        if !PlayerId::VERIFIED.contains(&profile.player_id.get()) {
            return Err(AccountError::InvalidData(format!(
                "{} has unverified id {}",
                profile.login_name, profile.player_id
            )));
        }
        if !self.ids.claim(profile.player_id.get()) {
            return Err(AccountError::InvalidData(format!(
                "player id {} already in use",
                profile.player_id
            )));
        }
        self.profiles.insert(key, profile);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl AccountStore for MemoryStore {
    fn load_player(&self, login_name: &str) -> Result<ProfileRecord> {
        self.profiles
            .get(&normalize_login(login_name))
            .cloned()
            .ok_or_else(|| AccountError::NotFound(login_name.to_string()))
    }

    fn save_player(&mut self, login_name: &str, profile: &ProfileRecord) -> Result<()> {
        let key = normalize_login(login_name);
        match self.profiles.get_mut(&key) {
            Some(existing) => {
                if existing.player_id != profile.player_id {
                    return Err(AccountError::InvalidData(format!(
                        "{} cannot change id from {} to {}",
                        login_name, existing.player_id, profile.player_id
                    )));
                }
                *existing = profile.clone();
                debug!("Saved profile {}", login_name);
                Ok(())
            }
            None => Err(AccountError::NotFound(login_name.to_string())),
        }
    }

    fn register_player(&mut self, login_name: &str, password: &[u8]) -> Result<ProfileRecord> {
        let key = normalize_login(login_name);
        if key.is_empty() {
            return Err(AccountError::InvalidData("empty login name".into()));
        }
        if self.profiles.contains_key(&key) {
            return Err(AccountError::AlreadyExists(login_name.to_string()));
        }

        let id = self.ids.allocate().ok_or(AccountError::IdsExhausted)?;
        let profile = ProfileRecord::new(login_name, PlayerId::new(id), password.to_vec());
        self.profiles.insert(key, profile.clone());
        debug!("Registered {} as player {}", login_name, id);
        Ok(profile)
    }
}
