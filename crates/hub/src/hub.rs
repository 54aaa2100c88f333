//! # The Hub
//!
//! One task drains one queue and owns every shared table. Events are handled
//! to completion one at a time, which is all the synchronization the tables
//! need.
//!
//! Errors raised while handling an event are contained by severity: a
//! `Connection` error attributable to a peer disconnects that peer and the
//! hub carries on; anything else ends [`Hub::run`] and, with it, the process.

use crate::authcodes::AuthCodes;
use crate::callbacks::{CallbackAction, Callbacks};
use crate::config::HubConfig;
use crate::firewall::FirewallLink;
use crate::gameservers::GameServerTable;
use crate::matchmaking;
use crate::menu::MenuData;
use crate::players::PlayerTable;
use crate::process::ProcessControl;
use crate::session::PlayerSession;
use crate::social::SocialGraph;
use crate::states::{StateKind, StateTables};
use lobby_accounts::AccountStore;
use lobby_core::{PeerId, Result, ServerError, Severity};
use lobby_network::{HubEvent, HubReceiver, HubSender, Inbound, LauncherInfo, Peer, PeerHandle};
use lobby_protocol::control::{AuthBotToHub, HubToAuthBot, HubToLauncher};
use lobby_protocol::ident::presence;
use lobby_protocol::{records, Packet};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct Hub {
    pub(crate) config: HubConfig,
    events: HubSender,

    /// Every live connection, by role
    peers: HashMap<PeerId, Peer>,

    pub(crate) players: PlayerTable,
    pub(crate) servers: GameServerTable,
    pub(crate) social: SocialGraph,
    pub(crate) firewall: FirewallLink,
    pub(crate) auth_codes: AuthCodes,
    pub(crate) callbacks: Callbacks,
    pub(crate) store: Box<dyn AccountStore>,
    pub(crate) process: Box<dyn ProcessControl>,
    pub(crate) menu: MenuData,
    states: StateTables,
}

impl Hub {
    /// Create a hub posting its callbacks to `events`, the sending side of the
    /// queue later handed to [`run`](Self::run)
    pub fn new(
        config: HubConfig,
        store: Box<dyn AccountStore>,
        process: Box<dyn ProcessControl>,
        menu: MenuData,
        events: HubSender,
    ) -> Self {
        Self {
            config,
            events,
            peers: HashMap::new(),
            players: PlayerTable::new(),
            servers: GameServerTable::new(),
            social: SocialGraph::new(),
            firewall: FirewallLink::new(),
            auth_codes: AuthCodes::new(),
            callbacks: Callbacks::new(),
            store,
            process,
            menu,
            states: StateTables::build(),
        }
    }

    /// Drain the queue until shutdown, the queue closing, or an error that
    /// no single peer can absorb.
    pub async fn run(mut self, mut events: HubReceiver, shutdown: CancellationToken) -> Result<()> {
        info!("Hub running");
        let outcome = loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break Ok(()),
                },
            };
            if let Err(e) = self.handle_event(event) {
                break Err(e);
            }
        };

        match &outcome {
            Ok(()) => info!("Hub stopping"),
            Err(e) => error!("Hub failed: {}", e),
        }
        self.close_all();
        outcome
    }

    /// Handle one event to completion
    pub fn handle_event(&mut self, event: HubEvent) -> Result<()> {
        match event {
            HubEvent::PeerConnected(peer) => {
                let id = peer.id();
                let result = self.on_connected(peer);
                self.contain(id, result)
            }
            HubEvent::PeerDisconnected(peer, reason) => self.on_disconnected(peer, reason),
            HubEvent::Request(id, request) => {
                let result = self.on_request(id, request);
                self.contain(id, result)
            }
            HubEvent::ExecuteCallback(slot) => match self.callbacks.fire(slot) {
                Some(action) => self.run_callback(action),
                None => Ok(()),
            },
            HubEvent::LauncherInfo(info) => self.on_launcher_info(info),
        }
    }

    /// Turn a peer's `Connection` error into its disconnect
    pub(crate) fn contain(&mut self, peer: PeerId, result: Result<()>) -> Result<()> {
        match result {
            Err(e) if e.severity() == Severity::Connection => {
                if self.peers.contains_key(&peer) {
                    self.force_disconnect(peer, e);
                } else {
                    debug!("Error for departed {}: {}", peer, e);
                }
                Ok(())
            }
            other => other,
        }
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    fn on_connected(&mut self, peer: Peer) -> Result<()> {
        info!("{} connected", peer);
        let id = peer.id();
        self.peers.insert(id, peer.clone());

        match peer {
            Peer::Player(handle) => {
                let player_id = self.players.allocate_temp_id()?;
                self.players.insert(PlayerSession::new(handle, player_id, Instant::now()));
                let timeout = self.config.idle_timeout;
                self.schedule(Some(id), timeout, CallbackAction::IdleCheck(id));
            }
            Peer::GameServer(handle) => self.servers.add_launcher(handle),
            Peer::AuthBot(_) => {}
            Peer::Firewall(handle) => self.firewall.attach(handle),
        }
        Ok(())
    }

    /// The reader is done with this connection. Unknown peers were already
    /// cleaned up by a forced disconnect.
    fn on_disconnected(&mut self, peer: Peer, reason: Option<ServerError>) -> Result<()> {
        let Some(peer) = self.peers.remove(&peer.id()) else {
            debug!("{} already gone", peer);
            return Ok(());
        };
        match &reason {
            Some(e) => warn!("{} disconnected: {}", peer, e),
            None => info!("{} disconnected", peer),
        }
        peer.disconnect(None);
        self.cleanup(&peer);
        Ok(())
    }

    /// Close a connection from the hub side and forget it right away
    pub(crate) fn force_disconnect(&mut self, peer: PeerId, reason: ServerError) {
        let Some(peer) = self.peers.remove(&peer) else {
            return;
        };
        warn!("Disconnecting {}: {}", peer, reason);
        peer.disconnect(Some(reason));
        self.cleanup(&peer);
    }

    fn cleanup(&mut self, peer: &Peer) {
        let id = peer.id();
        self.callbacks.neutralize_owner(id);

        match peer {
            Peer::Player(_) => self.drop_player(id),
            Peer::GameServer(_) => {
                if let Some(server) = self.servers.by_peer(id) {
                    self.evacuate(server);
                }
                if let Some(server) = self.servers.remove_launcher(id) {
                    info!("Game server {} ({}) unlisted", server.id, server.details.name);
                }
            }
            Peer::AuthBot(_) => {
                let revoked = self.auth_codes.revoke_issued_by(id);
                if revoked > 0 {
                    debug!("Revoked {} auth codes issued by {}", revoked, peer);
                }
            }
            Peer::Firewall(_) => self.firewall.detach(id),
        }
    }

    /// Run the Offline side effects and forget the session
    fn drop_player(&mut self, peer: PeerId) {
        if let Err(e) = self.transition(peer, StateKind::Offline) {
            error!("Offline transition of {} failed: {}", peer, e);
        }
        self.players.remove(peer);
    }

    fn close_all(&mut self) {
        let peers: Vec<PeerId> = self.peers.keys().copied().collect();
        for id in peers {
            if let Some(peer) = self.peers.remove(&id) {
                peer.disconnect(None);
                self.cleanup(&peer);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    fn on_request(&mut self, peer: PeerId, request: Inbound) -> Result<()> {
        if !self.peers.contains_key(&peer) {
            debug!("Dropping request from departed {}", peer);
            return Ok(());
        }
        match request {
            Inbound::Client(packet) => self.on_client_packet(peer, packet),
            Inbound::Launcher(message) => matchmaking::launcher_message(self, peer, message),
            Inbound::AuthBot(AuthBotToHub::AuthCodeRequest { login_name }) => {
                self.issue_auth_code(peer, login_name);
                Ok(())
            }
            Inbound::Firewall(_) => {
                self.firewall.on_ack();
                Ok(())
            }
        }
    }

    fn on_client_packet(&mut self, peer: PeerId, packet: Packet) -> Result<()> {
        let Some(session) = self.players.get_mut(peer) else {
            return Ok(());
        };
        session.touch(Instant::now());
        if let Some(seq) = packet.seq() {
            session.last_seq = Some(seq);
        }
        let state = session.state;

        let Some(request) = packet.records.first() else {
            return Ok(());
        };
        match self.states.lookup(state, request)? {
            Some((name, handler)) => {
                debug!("{} {} in {}", peer, name, state);
                handler(self, peer, request)
            }
            None => {
                debug!("No handler for {:#06x} from {} in {}", request.ident, peer, state);
                Ok(())
            }
        }
    }

    fn issue_auth_code(&mut self, bot: PeerId, login_name: String) {
        let Some(Peer::AuthBot(handle)) = self.peers.get(&bot) else {
            return;
        };
        let handle: PeerHandle<HubToAuthBot> = handle.clone();
        let code = self.auth_codes.issue(&login_name, bot);
        info!("Issued auth code for {}", login_name);
        handle.send(HubToAuthBot::AuthCode {
            login_name: login_name.clone(),
            code: code.clone(),
        });
        let ttl = self.config.auth_code_ttl;
        self.schedule(Some(bot), ttl, CallbackAction::AuthCodeExpiry { login_name, code });
    }

    fn on_launcher_info(&mut self, info: LauncherInfo) -> Result<()> {
        match info {
            LauncherInfo::ProcessStarted { server_name, process_id } => {
                info!("Game server process {} started as pid {}", server_name, process_id);
                if let Some(module) = self.config.inject_module.clone() {
                    if let Err(e) = self.process.inject(process_id, &module) {
                        error!("Injecting into {} failed: {}", server_name, e);
                    }
                }
            }
            LauncherInfo::ProcessExited { server_name, exit_code } => {
                warn!("Game server process {} exited ({:?})", server_name, exit_code);
                if let Some(server) = self.servers.by_name(&server_name) {
                    self.evacuate(server);
                }
                if self.config.restart_game_servers {
                    if let Err(e) = self.process.start(&server_name) {
                        error!("Restarting {} failed: {}", server_name, e);
                    }
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Callbacks
    // -----------------------------------------------------------------------

    pub(crate) fn schedule(&mut self, owner: Option<PeerId>, delay: Duration, action: CallbackAction) {
        self.callbacks.schedule(&self.events, owner, delay, action);
    }

    fn run_callback(&mut self, action: CallbackAction) -> Result<()> {
        match action {
            CallbackAction::IdleCheck(peer) => {
                self.check_idle(peer);
                Ok(())
            }
            CallbackAction::CandidateExpiry { peer, server } => {
                if let Some(session) = self.players.get_mut(peer) {
                    if session.candidate == Some(server) {
                        debug!("{} candidate server {} expired", peer, server);
                        session.candidate = None;
                    }
                }
                Ok(())
            }
            CallbackAction::VoteKickExpire { server, target, round } => {
                matchmaking::expire_votes(self, server, target, Some(round));
                Ok(())
            }
            CallbackAction::Unblacklist(address) => {
                info!("Ban on {} lifted", address);
                self.firewall.unblacklist(address);
                Ok(())
            }
            CallbackAction::AuthCodeExpiry { login_name, code } => {
                if self.auth_codes.expire(&login_name, &code) {
                    debug!("Auth code for {} expired", login_name);
                }
                Ok(())
            }
        }
    }

    fn check_idle(&mut self, peer: PeerId) {
        let Some(session) = self.players.get(peer) else {
            return;
        };
        let timeout = self.config.idle_timeout;
        let idle = session.idle_for(Instant::now());
        if idle >= timeout {
            self.force_disconnect(peer, ServerError::IdleTimeout(timeout));
        } else {
            self.schedule(Some(peer), timeout - idle, CallbackAction::IdleCheck(peer));
        }
    }

    // -----------------------------------------------------------------------
    // State transitions
    // -----------------------------------------------------------------------

    /// Move a session to `to`, running exit effects of the old state and
    /// enter effects of the new one
    pub(crate) fn transition(&mut self, peer: PeerId, to: StateKind) -> Result<()> {
        let Some(session) = self.players.get_mut(peer) else {
            return Ok(());
        };
        let from = session.state;
        if from == to {
            return Ok(());
        }
        debug!("{} {} -> {}", peer, from, to);

        if from == StateKind::OnGameServer {
            self.leave_game_server(peer);
        }
        if let Some(session) = self.players.get_mut(peer) {
            session.state = to;
        }

        match to {
            StateKind::Unauthenticated => {}
            StateKind::Authenticated => self.announce(peer, presence::ONLINE),
            StateKind::OnGameServer => {
                self.enter_game_server(peer)?;
                self.announce(peer, presence::IN_GAME);
            }
            StateKind::Offline => self.go_offline(peer, from),
        }
        Ok(())
    }

    fn enter_game_server(&mut self, peer: PeerId) -> Result<()> {
        let Some(session) = self.players.get(peer) else {
            return Ok(());
        };
        let server_id = session
            .game_server
            .ok_or_else(|| ServerError::ProtocolViolation("no game server to enter".into()))?;
        let player_id = session.player_id.get();
        let address = session.ip();
        let login_name = session.login_name.clone();
        let loadouts = session
            .profile
            .as_ref()
            .map(|p| p.loadouts.clone())
            .unwrap_or_default();

        let server = self
            .servers
            .get_mut(server_id)
            .ok_or_else(|| ServerError::ProtocolViolation(format!("no game server {}", server_id)))?;
        server.players.insert(peer);
        let team = server.teams.get(&player_id).copied();
        server.send(HubToLauncher::PlayerJoined {
            player_id,
            login_name,
            address,
        });
        server.send(HubToLauncher::Loadouts { player_id, loadouts });
        info!("{} joined game server {}", peer, server_id);

        if let Some(session) = self.players.get_mut(peer) {
            session.team = team;
        }
        self.firewall.whitelist(address);
        Ok(())
    }

    fn leave_game_server(&mut self, peer: PeerId) {
        let Some(session) = self.players.get_mut(peer) else {
            return;
        };
        let server_id = session.game_server.take();
        session.team = None;
        session.vote = None;
        let player_id = session.player_id.get();
        let address = session.ip();

        let Some(server_id) = server_id else {
            return;
        };
        if let Some(server) = self.servers.get_mut(server_id) {
            server.players.remove(&peer);
            let targets: Vec<PeerId> = server.votes.keys().copied().collect();
            for target in targets {
                server.withdraw(peer, target);
            }
            // Ballots against the leaving player lapse with it
            let against = server.close_vote(peer, None).unwrap_or_default();
            for voter in against.voters {
                if let Some(session) = self.players.get_mut(voter) {
                    session.vote = None;
                }
            }
            server.send(HubToLauncher::PlayerLeft { player_id });
            info!("{} left game server {}", peer, server_id);
        }
        self.firewall.unwhitelist(address);
    }

    fn go_offline(&mut self, peer: PeerId, from: StateKind) {
        let Some(session) = self.players.get(peer) else {
            return;
        };
        if !from.is_online() {
            return;
        }
        let login_name = session.login_name.clone();
        let watchers = self.social.leave(peer, &login_name);
        self.notify_watchers(&watchers, &login_name, presence::OFFLINE);

        let Some(session) = self.players.get(peer) else {
            return;
        };
        if session.verified {
            if let Some(profile) = &session.profile {
                match self.store.save_player(&login_name, profile) {
                    Ok(()) => debug!("Saved profile of {}", login_name),
                    Err(e) => error!("Saving profile of {} failed: {}", login_name, e),
                }
            }
        }
    }

    /// Move every player on a server back to Authenticated
    pub(crate) fn evacuate(&mut self, server: lobby_core::GameServerId) {
        let players: Vec<PeerId> = self
            .servers
            .get(server)
            .map(|s| s.players.iter().copied().collect())
            .unwrap_or_default();
        for peer in players {
            if let Err(e) = self.transition(peer, StateKind::Authenticated) {
                self.force_disconnect(peer, e);
            }
        }
    }

    fn announce(&mut self, peer: PeerId, value: u8) {
        let Some(session) = self.players.get(peer) else {
            return;
        };
        let login_name = session.login_name.clone();
        let watchers = self.social.set_presence(&login_name, value);
        self.notify_watchers(&watchers, &login_name, value);
    }

    fn notify_watchers(&self, watchers: &[PeerId], login_name: &str, value: u8) {
        for watcher in watchers {
            if let Some(session) = self.players.get(*watcher) {
                session.send(vec![records::friend_status(login_name, value)]);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn state_of(&self, peer: PeerId) -> Option<StateKind> {
        self.players.get(peer).map(|s| s.state)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    pub fn is_connected(&self, peer: PeerId) -> bool {
        self.peers.contains_key(&peer)
    }
}
