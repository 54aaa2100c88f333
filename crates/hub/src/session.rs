//! # Player Sessions
//!
//! One [`PlayerSession`] per connected game client, created on connect in the
//! `Unauthenticated` state and dropped after its `Offline` side effects ran.

use crate::states::StateKind;
use lobby_accounts::ProfileRecord;
use lobby_core::{GameServerId, PeerId, PlayerId};
use lobby_network::{ClientOut, PeerHandle};
use lobby_protocol::Field;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::Instant;

/// Player session
///
/// # Purpose
/// Everything the hub knows about one game client for the life of its
/// connection.
#[derive(Debug)]
pub struct PlayerSession {
    pub peer: PeerHandle<ClientOut>,

    /// Temporary until the account is verified, then the profile's id
    pub player_id: PlayerId,

    /// Empty until the first login attempt names one
    pub login_name: String,

    pub display_name: String,

    /// Whether the account was proven by password
    pub verified: bool,

    /// Password bytes from the last login, kept for `/register`
    pub password: Vec<u8>,

    pub state: StateKind,

    /// Server picked in the first join step, waiting for confirm
    pub candidate: Option<GameServerId>,

    /// Server the player is on while `OnGameServer`
    pub game_server: Option<GameServerId>,

    pub team: Option<u8>,

    /// Player this session voted to kick
    pub vote: Option<PeerId>,

    /// Loaded (or, for unverified sessions, made up) at login
    pub profile: Option<ProfileRecord>,

    /// Last sequence number received, echoed as our ack
    pub last_seq: Option<u32>,

    last_activity: Instant,
}

impl PlayerSession {
    pub fn new(peer: PeerHandle<ClientOut>, player_id: PlayerId, now: Instant) -> Self {
        Self {
            peer,
            player_id,
            login_name: String::new(),
            display_name: String::new(),
            verified: false,
            password: Vec::new(),
            state: StateKind::Unauthenticated,
            candidate: None,
            game_server: None,
            team: None,
            vote: None,
            profile: None,
            last_seq: None,
            last_activity: now,
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer.id()
    }

    pub fn ip(&self) -> IpAddr {
        self.peer.addr().ip()
    }

    /// Record inbound traffic. The timestamp always moves forward.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now.max(self.last_activity + Duration::from_nanos(1));
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    pub fn ack(&self) -> u32 {
        self.last_seq.unwrap_or(0)
    }

    /// Queue records for the client. The writer adds the trailer.
    pub fn send(&self, records: Vec<Field>) {
        let ack = self.ack();
        if !self.peer.send(ClientOut { records, ack }) {
            tracing::debug!("{} queue closed, dropping reply", self.peer_id());
        }
    }

    /// Label for logs
    pub fn name(&self) -> &str {
        if self.login_name.is_empty() {
            "<anonymous>"
        } else {
            &self.login_name
        }
    }
}
