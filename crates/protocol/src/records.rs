//! Builders for server → client records
//!
//! Each function returns one top-level record. The caller hands one or more of
//! them to a [`PacketEncoder`](crate::PacketEncoder).

use crate::field::{Field, Verbatim};
use crate::ident::*;
use lobby_core::{GameServerId, LoadoutSlot, PlayerId};
use std::net::Ipv4Addr;

/// Protocol version the supported client build speaks
pub const PROTOCOL_VERSION_VALUE: u32 = 0x0000_0303;

/// Echo of the client hello
///
/// # Format
/// `HELLO { PROTOCOL_VERSION, SESSION_TOKEN }`
pub fn hello_echo(session_token: &[u8]) -> Field {
    Field::record(
        HELLO,
        vec![
            Field::int4(PROTOCOL_VERSION, PROTOCOL_VERSION_VALUE),
            Field::new(
                SESSION_TOKEN,
                crate::FieldValue::Bytes32(session_token.to_vec()),
            ),
        ],
    )
}

/// Sent right after the hello echo, in the same packet
pub fn server_info(server_name: &str) -> Field {
    Field::record(
        SERVER_INFO,
        vec![
            Field::string(SERVER_NAME, server_name),
            Field::int4(PROTOCOL_VERSION, PROTOCOL_VERSION_VALUE),
        ],
    )
}

/// An empty LOGIN asks the client for credentials
pub fn credentials_request() -> Field {
    Field::record(LOGIN, vec![])
}

/// LOGIN carrying a failure status
pub fn login_status(status: u32) -> Field {
    Field::record(LOGIN, vec![Field::int4(STATUS_CODE, status)])
}

/// Head of the menu snapshot
///
/// # Format
/// `MENU_SNAPSHOT { STATUS_CODE, PLAYER_ID, LOGIN_NAME, DISPLAY_NAME, VERIFIED }`
pub fn menu_snapshot(player: PlayerId, login_name: &str, display_name: &str, verified: bool) -> Field {
    Field::record(
        MENU_SNAPSHOT,
        vec![
            Field::int4(STATUS_CODE, status::OK),
            Field::int4(PLAYER_ID, player.get()),
            Field::string(LOGIN_NAME, login_name),
            Field::string(DISPLAY_NAME, display_name),
            Field::int1(VERIFIED, verified as u8),
        ],
    )
}

pub fn profile_stats(xp: u32, rank: u16, gold: u32) -> Field {
    Field::record(
        PROFILE_STATS,
        vec![Field::int4(XP, xp), Field::int2(RANK, rank), Field::int4(GOLD, gold)],
    )
}

/// Every equipped item, one array per slot
pub fn loadouts(slots: &[LoadoutSlot]) -> Field {
    let entries = slots
        .iter()
        .map(|s| {
            vec![
                Field::int4(CLASS_ID, s.class_id),
                Field::int1(LOADOUT_INDEX, s.loadout),
                Field::int1(SLOT, s.slot),
                Field::int4(ITEM_ID, s.item_id),
            ]
        })
        .collect();
    Field::record(LOADOUTS, vec![Field::arrays(LOADOUT_ENTRIES, entries)])
}

/// Friends with their current presence
pub fn friends_list(friends: &[(String, u8)]) -> Field {
    let entries = friends
        .iter()
        .map(|(name, presence)| {
            vec![Field::string(FRIEND_NAME, name.as_str()), Field::int1(PRESENCE, *presence)]
        })
        .collect();
    Field::record(FRIENDS_LIST, vec![Field::arrays(FRIENDS, entries)])
}

/// A menu data record, replayed from the capture when a range is available
pub fn menu_data(ident: u16, capture: Option<Verbatim>) -> Field {
    let entries = match capture {
        Some(verbatim) => Field::verbatim(MENU_ENTRIES, verbatim),
        None => Field::arrays(MENU_ENTRIES, vec![]),
    };
    Field::record(ident, vec![entries])
}

pub fn chat(sender: &str, channel: u8, text: &str) -> Field {
    Field::record(
        CHAT,
        vec![
            Field::string(CHAT_SENDER, sender),
            Field::int1(CHAT_CHANNEL, channel),
            Field::string(CHAT_TEXT, text),
        ],
    )
}

/// One row of the server browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerListing {
    pub id: GameServerId,
    pub name: String,
    pub description: String,
    pub player_count: u16,
    pub max_players: u16,
    pub passworded: bool,
}

pub fn server_list(servers: &[ServerListing]) -> Field {
    let rows = servers
        .iter()
        .map(|s| {
            vec![
                Field::int4(SERVER_ID, s.id.get()),
                Field::string(SERVER_NAME, s.name.as_str()),
                Field::string(SERVER_DESCRIPTION, s.description.as_str()),
                Field::int2(PLAYER_COUNT, s.player_count),
                Field::int2(MAX_PLAYERS, s.max_players),
                Field::int1(PASSWORDED, s.passworded as u8),
            ]
        })
        .collect();
    Field::record(SERVER_LIST, vec![Field::arrays(SERVERS, rows)])
}

/// Answer to either join step. The endpoint is only present once confirmed.
///
/// # Format
/// `JOIN_INFO { SERVER_ID, STATUS_CODE, [ENDPOINT { ADDRESS, PORT }] }`
pub fn join_info(server: GameServerId, status: u32, endpoint: Option<(Ipv4Addr, u16)>) -> Field {
    let mut fields = vec![Field::int4(SERVER_ID, server.get()), Field::int4(STATUS_CODE, status)];
    if let Some((addr, port)) = endpoint {
        fields.push(Field::record(
            ENDPOINT,
            vec![Field::address(ADDRESS, addr), Field::int2(PORT, port)],
        ));
    }
    Field::record(JOIN_INFO, fields)
}

pub fn friend_status(name: &str, presence: u8) -> Field {
    Field::record(
        FRIEND_STATUS,
        vec![Field::string(FRIEND_NAME, name), Field::int1(PRESENCE, presence)],
    )
}
