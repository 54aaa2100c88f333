//! Ident registry and field decoding
//!
//! Containers do not know their element types statically: each element is
//! decoded by peeking its ident and looking the kind up here. An ident that
//! was never registered is a hard error; the protocol is closed, so there is
//! no skip-unknown path.

use crate::field::{decode_latin1, Field, FieldKind, FieldValue, Reader, RecordArrays};
use crate::ident::*;
use lobby_core::{Result, ServerError};
use std::collections::HashMap;

/// Nesting deeper than this is rejected instead of recursing further
const MAX_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy)]
struct Entry {
    name: &'static str,
    kind: FieldKind,
}

/// Maps idents to the kind of field they introduce
///
/// Built once at startup and shared by reference with every decoder.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<u16, Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an ident.
    ///
    /// # Panics
    /// If the ident is already registered. Tables are static, so this is a
    /// programming error caught on the first startup.
    pub fn register(&mut self, ident: u16, name: &'static str, kind: FieldKind) -> &mut Self {
        let previous = self.entries.insert(ident, Entry { name, kind });
        assert!(
            previous.is_none(),
            "ident {:#06x} ({}) registered twice",
            ident,
            name
        );
        self
    }

    /// The registry for the game protocol
    pub fn standard() -> Self {
        let mut reg = Self::new();

        reg.register(HELLO, "HELLO", FieldKind::Record)
            .register(SERVER_INFO, "SERVER_INFO", FieldKind::Record)
            .register(LOGIN, "LOGIN", FieldKind::Record)
            .register(MENU_SNAPSHOT, "MENU_SNAPSHOT", FieldKind::Record)
            .register(PROFILE_STATS, "PROFILE_STATS", FieldKind::Record)
            .register(LOADOUTS, "LOADOUTS", FieldKind::Record)
            .register(FRIENDS_LIST, "FRIENDS_LIST", FieldKind::Record)
            .register(MENU_DATA_1, "MENU_DATA_1", FieldKind::Record)
            .register(MENU_DATA_2, "MENU_DATA_2", FieldKind::Record)
            .register(MENU_DATA_3, "MENU_DATA_3", FieldKind::Record)
            .register(MENU_DATA_4, "MENU_DATA_4", FieldKind::Record)
            .register(MENU_DATA_5, "MENU_DATA_5", FieldKind::Record)
            .register(MENU_DATA_6, "MENU_DATA_6", FieldKind::Record)
            .register(MENU_DATA_7, "MENU_DATA_7", FieldKind::Record)
            .register(MENU_DATA_8, "MENU_DATA_8", FieldKind::Record)
            .register(PING, "PING", FieldKind::Record)
            .register(CHAT, "CHAT", FieldKind::Record)
            .register(SERVER_LIST, "SERVER_LIST", FieldKind::Record)
            .register(JOIN, "JOIN", FieldKind::Record)
            .register(JOIN_INFO, "JOIN_INFO", FieldKind::Record)
            .register(LEAVE, "LEAVE", FieldKind::Record)
            .register(LOADOUT_CHANGE, "LOADOUT_CHANGE", FieldKind::Record)
            .register(FRIEND_EDIT, "FRIEND_EDIT", FieldKind::Record)
            .register(FRIEND_STATUS, "FRIEND_STATUS", FieldKind::Record)
            .register(VOTE_KICK, "VOTE_KICK", FieldKind::Record);

        reg.register(PROTOCOL_VERSION, "PROTOCOL_VERSION", FieldKind::Int4)
            .register(CLIENT_NONCE, "CLIENT_NONCE", FieldKind::Fixed(8))
            .register(SESSION_TOKEN, "SESSION_TOKEN", FieldKind::Bytes32)
            .register(CLIENT_BUILD, "CLIENT_BUILD", FieldKind::Bytes16)
            .register(TIMESTAMP, "TIMESTAMP", FieldKind::Int4)
            .register(LOGIN_NAME, "LOGIN_NAME", FieldKind::String)
            .register(PASSWORD, "PASSWORD", FieldKind::Password)
            .register(STATUS_CODE, "STATUS_CODE", FieldKind::Int4)
            .register(PLAYER_ID, "PLAYER_ID", FieldKind::Int4)
            .register(DISPLAY_NAME, "DISPLAY_NAME", FieldKind::String)
            .register(VERIFIED, "VERIFIED", FieldKind::Int1)
            .register(XP, "XP", FieldKind::Int4)
            .register(RANK, "RANK", FieldKind::Int2)
            .register(GOLD, "GOLD", FieldKind::Int4)
            .register(CLASS_ID, "CLASS_ID", FieldKind::Int4)
            .register(LOADOUT_INDEX, "LOADOUT_INDEX", FieldKind::Int1)
            .register(SLOT, "SLOT", FieldKind::Int1)
            .register(ITEM_ID, "ITEM_ID", FieldKind::Int4)
            .register(LOADOUT_ENTRIES, "LOADOUT_ENTRIES", FieldKind::Arrays)
            .register(FRIEND_NAME, "FRIEND_NAME", FieldKind::String)
            .register(FRIEND_ACTION, "FRIEND_ACTION", FieldKind::Int1)
            .register(PRESENCE, "PRESENCE", FieldKind::Int1)
            .register(FRIENDS, "FRIENDS", FieldKind::Arrays)
            .register(MENU_ENTRIES, "MENU_ENTRIES", FieldKind::Arrays)
            .register(CHAT_CHANNEL, "CHAT_CHANNEL", FieldKind::Int1)
            .register(CHAT_TEXT, "CHAT_TEXT", FieldKind::String)
            .register(CHAT_SENDER, "CHAT_SENDER", FieldKind::String)
            .register(SERVER_ID, "SERVER_ID", FieldKind::Int4)
            .register(SERVER_NAME, "SERVER_NAME", FieldKind::String)
            .register(SERVER_DESCRIPTION, "SERVER_DESCRIPTION", FieldKind::String)
            .register(PLAYER_COUNT, "PLAYER_COUNT", FieldKind::Int2)
            .register(MAX_PLAYERS, "MAX_PLAYERS", FieldKind::Int2)
            .register(PASSWORDED, "PASSWORDED", FieldKind::Int1)
            .register(SERVERS, "SERVERS", FieldKind::Arrays)
            .register(CONFIRM, "CONFIRM", FieldKind::Int1)
            .register(SERVER_PASSWORD, "SERVER_PASSWORD", FieldKind::Password)
            .register(ENDPOINT, "ENDPOINT", FieldKind::Record)
            .register(ADDRESS, "ADDRESS", FieldKind::Fixed(4))
            .register(PORT, "PORT", FieldKind::Int2)
            .register(TEAM, "TEAM", FieldKind::Int1)
            .register(KICK_TARGET, "KICK_TARGET", FieldKind::Int4)
            .register(VOTE, "VOTE", FieldKind::Int1);

        reg
    }

    pub fn kind_of(&self, ident: u16) -> Option<FieldKind> {
        self.entries.get(&ident).map(|e| e.kind)
    }

    /// Name for logging; unregistered idents read as `"?"`
    pub fn name_of(&self, ident: u16) -> &'static str {
        self.entries.get(&ident).map(|e| e.name).unwrap_or("?")
    }

    pub fn contains(&self, ident: u16) -> bool {
        self.entries.contains_key(&ident)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode a field whose ident is fixed by its position.
    ///
    /// Fails with `DecodeMismatch` when the bytes carry a different ident.
    pub fn decode(&self, expected: u16, reader: &mut Reader<'_>) -> Result<Field> {
        self.decode_at_depth(expected, reader, 0)
    }

    /// Decode whatever field comes next, resolving its kind by ident
    pub fn decode_next(&self, reader: &mut Reader<'_>) -> Result<Field> {
        let ident = reader.peek_u16()?;
        self.decode_at_depth(ident, reader, 0)
    }

    fn decode_at_depth(&self, expected: u16, reader: &mut Reader<'_>, depth: usize) -> Result<Field> {
        let offset = reader.position();
        let actual = reader.read_u16()?;
        if actual != expected {
            return Err(ServerError::DecodeMismatch {
                expected,
                actual,
                offset,
            });
        }

        let kind = self
            .kind_of(actual)
            .ok_or(ServerError::UnknownFieldIdent { ident: actual, offset })?;
        let value = self.decode_value(kind, reader, depth)?;
        Ok(Field::new(actual, value))
    }

    fn decode_value(&self, kind: FieldKind, reader: &mut Reader<'_>, depth: usize) -> Result<FieldValue> {
        let value = match kind {
            FieldKind::Int1 => FieldValue::Int1(reader.read_u8()?),
            FieldKind::Int2 => FieldValue::Int2(reader.read_u16()?),
            FieldKind::Int4 => FieldValue::Int4(reader.read_u32()?),
            FieldKind::Fixed(n) => FieldValue::Fixed(reader.take(n)?.to_vec()),
            FieldKind::Password => {
                let words = reader.read_u16()? as usize;
                FieldValue::Password(reader.take(words * 2)?.to_vec())
            }
            FieldKind::String => {
                let len = reader.read_u16()? as usize;
                FieldValue::String(decode_latin1(reader.take(len)?))
            }
            FieldKind::Bytes16 => {
                let len = reader.read_u16()? as usize;
                FieldValue::Bytes16(reader.take(len)?.to_vec())
            }
            FieldKind::Bytes32 => {
                let len = reader.read_u32()? as usize;
                FieldValue::Bytes32(reader.take(len)?.to_vec())
            }
            FieldKind::Record => {
                self.check_depth(depth, reader)?;
                FieldValue::Record(self.decode_elements(reader, depth + 1)?)
            }
            FieldKind::Arrays => {
                self.check_depth(depth, reader)?;
                let count = reader.read_u16()? as usize;
                let mut arrays = Vec::with_capacity(count.min(256));
                for _ in 0..count {
                    arrays.push(self.decode_elements(reader, depth + 1)?);
                }
                FieldValue::Arrays(RecordArrays::Structured(arrays))
            }
        };
        Ok(value)
    }

    /// A count word followed by that many self-identifying fields
    fn decode_elements(&self, reader: &mut Reader<'_>, depth: usize) -> Result<Vec<Field>> {
        let count = reader.read_u16()? as usize;
        let mut fields = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            let ident = reader.peek_u16()?;
            fields.push(self.decode_at_depth(ident, reader, depth)?);
        }
        Ok(fields)
    }

    fn check_depth(&self, depth: usize, reader: &Reader<'_>) -> Result<()> {
        if depth >= MAX_DEPTH {
            return Err(ServerError::InvalidData(format!(
                "nesting deeper than {} at offset {}",
                MAX_DEPTH,
                reader.position()
            )));
        }
        Ok(())
    }
}
