//! Wire idents
//!
//! Records and fields share one 2-byte namespace. Top-level records use the
//! idents the client was captured sending; fields live in `0x0200..0x0700`.

// ---------------------------------------------------------------------------
// Top-level records
// ---------------------------------------------------------------------------

/// Connection hello. Never carries a seq/ack trailer.
pub const HELLO: u16 = 0x01bc;
pub const SERVER_INFO: u16 = 0x0197;
/// Login name alone, credentials, or a failure status from the server
pub const LOGIN: u16 = 0x003a;
/// Full menu snapshot sent after a successful login
pub const MENU_SNAPSHOT: u16 = 0x0033;
pub const PROFILE_STATS: u16 = 0x0036;
pub const LOADOUTS: u16 = 0x0037;
pub const FRIENDS_LIST: u16 = 0x0038;
pub const MENU_DATA_1: u16 = 0x0041;
pub const MENU_DATA_2: u16 = 0x0044;
pub const MENU_DATA_3: u16 = 0x0063;
pub const MENU_DATA_4: u16 = 0x0072;
pub const MENU_DATA_5: u16 = 0x0087;
pub const MENU_DATA_6: u16 = 0x0099;
pub const MENU_DATA_7: u16 = 0x00a8;
pub const MENU_DATA_8: u16 = 0x0176;
pub const PING: u16 = 0x0062;
pub const CHAT: u16 = 0x006e;
pub const SERVER_LIST: u16 = 0x00b4;
/// Candidate pick (no `CONFIRM`) or confirm (with `CONFIRM`)
pub const JOIN: u16 = 0x00b0;
pub const JOIN_INFO: u16 = 0x00b3;
pub const LEAVE: u16 = 0x00b2;
pub const LOADOUT_CHANGE: u16 = 0x00d5;
pub const FRIEND_EDIT: u16 = 0x011c;
pub const FRIEND_STATUS: u16 = 0x011d;
pub const VOTE_KICK: u16 = 0x0183;

/// Records that always follow a `MENU_SNAPSHOT`, in wire order.
///
/// The client expects exactly this many; there is no count on the wire.
pub const MENU_SNAPSHOT_FOLLOWUPS: [u16; 11] = [
    PROFILE_STATS,
    LOADOUTS,
    FRIENDS_LIST,
    MENU_DATA_1,
    MENU_DATA_2,
    MENU_DATA_3,
    MENU_DATA_4,
    MENU_DATA_5,
    MENU_DATA_6,
    MENU_DATA_7,
    MENU_DATA_8,
];

/// The menu data records that may be replayed verbatim from a capture
pub const MENU_DATA: [u16; 8] = [
    MENU_DATA_1,
    MENU_DATA_2,
    MENU_DATA_3,
    MENU_DATA_4,
    MENU_DATA_5,
    MENU_DATA_6,
    MENU_DATA_7,
    MENU_DATA_8,
];

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

// Session
pub const PROTOCOL_VERSION: u16 = 0x0201;
pub const CLIENT_NONCE: u16 = 0x0202;
pub const SESSION_TOKEN: u16 = 0x0203;
pub const CLIENT_BUILD: u16 = 0x0204;
pub const TIMESTAMP: u16 = 0x0205;

// Identity
pub const LOGIN_NAME: u16 = 0x0210;
/// Doubled-length password field
pub const PASSWORD: u16 = 0x0211;
pub const STATUS_CODE: u16 = 0x0212;
pub const PLAYER_ID: u16 = 0x0213;
pub const DISPLAY_NAME: u16 = 0x0214;
pub const VERIFIED: u16 = 0x0215;

// Profile
pub const XP: u16 = 0x0220;
pub const RANK: u16 = 0x0221;
pub const GOLD: u16 = 0x0222;

// Loadouts
pub const CLASS_ID: u16 = 0x0230;
pub const LOADOUT_INDEX: u16 = 0x0231;
pub const SLOT: u16 = 0x0232;
pub const ITEM_ID: u16 = 0x0233;
pub const LOADOUT_ENTRIES: u16 = 0x0234;

// Social
pub const FRIEND_NAME: u16 = 0x0240;
pub const FRIEND_ACTION: u16 = 0x0241;
pub const PRESENCE: u16 = 0x0242;
pub const FRIENDS: u16 = 0x0243;

// Menu
pub const MENU_ENTRIES: u16 = 0x0250;

// Chat
pub const CHAT_CHANNEL: u16 = 0x0260;
pub const CHAT_TEXT: u16 = 0x0261;
pub const CHAT_SENDER: u16 = 0x0262;

// Game servers
pub const SERVER_ID: u16 = 0x0270;
pub const SERVER_NAME: u16 = 0x0271;
pub const SERVER_DESCRIPTION: u16 = 0x0272;
pub const PLAYER_COUNT: u16 = 0x0273;
pub const MAX_PLAYERS: u16 = 0x0274;
pub const PASSWORDED: u16 = 0x0275;
pub const SERVERS: u16 = 0x0276;
pub const CONFIRM: u16 = 0x0277;
/// Doubled-length, same as `PASSWORD`
pub const SERVER_PASSWORD: u16 = 0x0278;
pub const ENDPOINT: u16 = 0x0279;
pub const ADDRESS: u16 = 0x027a;
pub const PORT: u16 = 0x027b;
pub const TEAM: u16 = 0x027c;

// Vote kick
pub const KICK_TARGET: u16 = 0x0280;
pub const VOTE: u16 = 0x0281;

/// Values of `STATUS_CODE`
pub mod status {
    pub const OK: u32 = 0;
    pub const CREDENTIALS_REQUESTED: u32 = 1;
    pub const BAD_PASSWORD: u32 = 2;
    pub const UNKNOWN_ACCOUNT: u32 = 3;
    pub const SERVER_FULL: u32 = 4;
    pub const BAD_SERVER_PASSWORD: u32 = 5;
}

/// Values of `PRESENCE`
pub mod presence {
    pub const OFFLINE: u8 = 0;
    pub const ONLINE: u8 = 1;
    pub const IN_GAME: u8 = 2;
}

/// Values of `FRIEND_ACTION`
pub mod friend_action {
    pub const REMOVE: u8 = 0;
    pub const ADD: u8 = 1;
}
