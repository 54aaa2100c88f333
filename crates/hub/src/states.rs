//! # Player Protocol States
//!
//! Each state owns a fixed table from request record to handler, built once
//! at startup. A request is dispatched on its first record: the ident picks
//! candidate routes and an optional required or forbidden element tells
//! variants of the same record apart (a bare LOGIN name has no PASSWORD, a
//! join confirm carries CONFIRM).
//!
//! ```text
//! Unauthenticated ──login──► Authenticated ──join──► OnGameServer
//!                                  ▲                      │
//!                                  └──── leave/match end ─┘
//!   any state ──disconnect──► Offline
//! ```
//!
//! No route is normal: the request is logged and ignored. More than one
//! route is a bug in the tables and stops the hub.

use crate::handlers;
use crate::hub::Hub;
use crate::matchmaking;
use lobby_core::{PeerId, Result, ServerError};
use lobby_protocol::ident::*;
use lobby_protocol::Field;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    Unauthenticated,
    Authenticated,
    OnGameServer,
    /// Entered once, on disconnect, to run persistence
    Offline,
}

impl StateKind {
    pub fn name(self) -> &'static str {
        match self {
            StateKind::Unauthenticated => "Unauthenticated",
            StateKind::Authenticated => "Authenticated",
            StateKind::OnGameServer => "OnGameServer",
            StateKind::Offline => "Offline",
        }
    }

    /// Whether the player has logged in and not yet gone
    pub fn is_online(self) -> bool {
        matches!(self, StateKind::Authenticated | StateKind::OnGameServer)
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub type Handler = fn(&mut Hub, PeerId, &Field) -> Result<()>;

/// Which requests a route accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestMatcher {
    pub ident: u16,
    pub requires: Option<u16>,
    pub forbids: Option<u16>,
}

impl RequestMatcher {
    pub const fn any(ident: u16) -> Self {
        Self {
            ident,
            requires: None,
            forbids: None,
        }
    }

    pub const fn with(ident: u16, element: u16) -> Self {
        Self {
            ident,
            requires: Some(element),
            forbids: None,
        }
    }

    pub const fn without(ident: u16, element: u16) -> Self {
        Self {
            ident,
            requires: None,
            forbids: Some(element),
        }
    }

    pub fn matches(&self, request: &Field) -> bool {
        request.ident == self.ident
            && self.requires.map_or(true, |e| request.has(e))
            && self.forbids.map_or(true, |e| !request.has(e))
    }
}

#[derive(Clone)]
struct Route {
    matcher: RequestMatcher,
    name: &'static str,
    handler: Handler,
}

/// Routes of one state
#[derive(Clone, Default)]
pub struct StateTable {
    routes: Vec<Route>,
}

impl StateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, matcher: RequestMatcher, name: &'static str, handler: Handler) -> Self {
        self.routes.push(Route { matcher, name, handler });
        self
    }

    /// Everything in `base`, then this table's own routes
    pub fn extending(base: &StateTable) -> Self {
        base.clone()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The single route for `request`, if any
    pub fn lookup(&self, state: StateKind, request: &Field) -> Result<Option<(&'static str, Handler)>> {
        let mut found = self.routes.iter().filter(|r| r.matcher.matches(request));
        let Some(first) = found.next() else {
            return Ok(None);
        };
        if found.next().is_some() {
            return Err(ServerError::DuplicateHandlerMatch {
                ident: request.ident,
                state: state.name(),
            });
        }
        Ok(Some((first.name, first.handler)))
    }
}

impl fmt::Debug for StateTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.routes.iter().map(|r| r.name)).finish()
    }
}

/// The tables of every state
#[derive(Debug, Clone)]
pub struct StateTables {
    unauthenticated: StateTable,
    authenticated: StateTable,
    on_game_server: StateTable,
    offline: StateTable,
}

impl StateTables {
    pub fn build() -> Self {
        let unauthenticated = StateTable::new()
            .route(RequestMatcher::any(HELLO), "hello", handlers::hello)
            .route(RequestMatcher::any(PING), "ping", handlers::ping)
            .route(RequestMatcher::without(LOGIN, PASSWORD), "login_name_only", handlers::login_name_only)
            .route(RequestMatcher::with(LOGIN, PASSWORD), "login_credentials", handlers::login_credentials);

        let authenticated = StateTable::new()
            .route(RequestMatcher::any(PING), "ping", handlers::ping)
            .route(RequestMatcher::any(SERVER_LIST), "server_list", handlers::server_list)
            .route(RequestMatcher::without(JOIN, CONFIRM), "join_pick", matchmaking::join_pick)
            .route(RequestMatcher::with(JOIN, CONFIRM), "join_confirm", matchmaking::join_confirm)
            .route(RequestMatcher::any(CHAT), "chat", handlers::chat)
            .route(RequestMatcher::any(LOADOUT_CHANGE), "loadout_change", handlers::loadout_change)
            .route(RequestMatcher::any(FRIEND_EDIT), "friend_edit", handlers::friend_edit);

        let on_game_server = StateTable::extending(&authenticated)
            .route(RequestMatcher::any(VOTE_KICK), "vote_kick", matchmaking::vote_kick)
            .route(RequestMatcher::any(LEAVE), "leave", matchmaking::leave);

        Self {
            unauthenticated,
            authenticated,
            on_game_server,
            offline: StateTable::new(),
        }
    }

    pub fn table(&self, state: StateKind) -> &StateTable {
        match state {
            StateKind::Unauthenticated => &self.unauthenticated,
            StateKind::Authenticated => &self.authenticated,
            StateKind::OnGameServer => &self.on_game_server,
            StateKind::Offline => &self.offline,
        }
    }

    pub fn lookup(&self, state: StateKind, request: &Field) -> Result<Option<(&'static str, Handler)>> {
        self.table(state).lookup(state, request)
    }
}

impl Default for StateTables {
    fn default() -> Self {
        Self::build()
    }
}
