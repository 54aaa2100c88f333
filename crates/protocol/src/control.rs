//! Inter-process control messages
//!
//! Launchers, the auth bot and the firewall daemon exchange JSON objects over
//! the same chunk framing as game clients. Every message is tagged by a
//! `"type"` key.

use bytes::Bytes;
use lobby_core::{LoadoutSlot, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

/// Launcher → hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LauncherToHub {
    ServerInfo {
        name: String,
        description: String,
        address: Ipv4Addr,
        port: u16,
        max_players: u16,
        /// Lowercase hex SHA-256 of the join password, if there is one
        #[serde(default)]
        password_hash: Option<String>,
    },
    /// Player id → team
    TeamInfo { teams: BTreeMap<u32, u8> },
    MatchTime { seconds_remaining: u32, counting: bool },
    MatchEnd,
}

/// Hub → launcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubToLauncher {
    PlayerJoined {
        player_id: u32,
        login_name: String,
        address: IpAddr,
    },
    Loadouts {
        player_id: u32,
        loadouts: Vec<LoadoutSlot>,
    },
    PlayerLeft { player_id: u32 },
    KickPlayer { player_id: u32 },
}

/// Auth bot → hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthBotToHub {
    AuthCodeRequest { login_name: String },
}

/// Hub → auth bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubToAuthBot {
    AuthCode { login_name: String, code: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirewallList {
    Whitelist,
    Blacklist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirewallAction {
    Add,
    Remove,
    /// Empty the list; carries no address
    Reset,
}

/// Hub → firewall daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubToFirewall {
    SetMembership {
        list: FirewallList,
        action: FirewallAction,
        address: Option<IpAddr>,
    },
}

/// Firewall daemon → hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FirewallToHub {
    Ack,
}

pub fn encode_json<T: Serialize>(message: &T) -> Result<Bytes> {
    Ok(serde_json::to_vec(message)?.into())
}

pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}
