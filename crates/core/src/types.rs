//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Player ID
///
/// Verified accounts own a persistent id in [`PlayerId::VERIFIED`]; sessions
/// that have not proven an account get a temporary id in [`PlayerId::TEMPORARY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl PlayerId {
    pub const VERIFIED: Range<u32> = 1..0x1000_0000;
    pub const TEMPORARY: Range<u32> = 0x1000_0000..0x2000_0000;

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn is_temporary(&self) -> bool {
        Self::TEMPORARY.contains(&self.0)
    }
}

impl From<u32> for PlayerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Game server ID, as shown to clients in the server list
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GameServerId(pub u32);

impl GameServerId {
    pub const RANGE: Range<u32> = 1..0x1_0000;

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for GameServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one live connection. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub u64);

impl PeerId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One equipped item: `(class, loadout, slot) -> item`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoadoutSlot {
    pub class_id: u32,
    pub loadout: u8,
    pub slot: u8,
    pub item_id: u32,
}

impl LoadoutSlot {
    /// Whether `other` addresses the same slot, regardless of item
    pub fn same_slot(&self, other: &LoadoutSlot) -> bool {
        self.class_id == other.class_id && self.loadout == other.loadout && self.slot == other.slot
    }
}
