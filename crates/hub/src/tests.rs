use crate::config::HubConfig;
use crate::hub::Hub;
use crate::menu::MenuData;
use crate::process::{LoggingProcessControl, ProcessControl};
use crate::states::StateKind;
use lobby_accounts::{AccountError, AccountStore, MemoryStore, ProfileRecord};
use lobby_core::{PeerId, PlayerId, ServerError};
use lobby_network::{
    hub_channel, next_peer_id, ClientOut, HubEvent, HubReceiver, Inbound, LauncherInfo, Outbound, Peer,
    PeerHandle,
};
use lobby_protocol::control::{
    AuthBotToHub, FirewallAction, FirewallList, HubToAuthBot, HubToFirewall, HubToLauncher, LauncherToHub,
};
use lobby_protocol::ident::*;
use lobby_protocol::{records, Field, Packet, Trailer};
use std::cell::Cell;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

type Rx<M> = UnboundedReceiver<Outbound<M>>;

fn password() -> Vec<u8> {
    vec![b'p'; 72]
}

fn seeded_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store
        .insert(ProfileRecord::new("alice", PlayerId::new(12), password()))
        .unwrap();
    let mut bob = ProfileRecord::new("bob", PlayerId::new(13), password());
    bob.friends.insert("alice".to_string());
    store.insert(bob).unwrap();
    store
}

/// Serves a limited number of profile loads, then reports corrupt data
struct RationedStore {
    inner: MemoryStore,
    loads_left: Cell<usize>,
}

impl AccountStore for RationedStore {
    fn load_player(&self, login_name: &str) -> lobby_accounts::Result<ProfileRecord> {
        match self.loads_left.get() {
            0 => Err(AccountError::InvalidData("store unavailable".into())),
            n => {
                self.loads_left.set(n - 1);
                self.inner.load_player(login_name)
            }
        }
    }

    fn save_player(&mut self, login_name: &str, profile: &ProfileRecord) -> lobby_accounts::Result<()> {
        self.inner.save_player(login_name, profile)
    }

    fn register_player(&mut self, login_name: &str, password: &[u8]) -> lobby_accounts::Result<ProfileRecord> {
        self.inner.register_player(login_name, password)
    }
}

struct Harness {
    hub: Hub,
    rx: HubReceiver,
    seq: u32,
}

impl Harness {
    fn new(config: HubConfig) -> Self {
        Self::with_store(config, seeded_store())
    }

    fn with_store(config: HubConfig, store: MemoryStore) -> Self {
        Self::with_parts(config, store, Box::new(LoggingProcessControl))
    }

    fn with_parts(config: HubConfig, store: impl AccountStore + 'static, process: Box<dyn ProcessControl>) -> Self {
        let (tx, rx) = hub_channel();
        let hub = Hub::new(config, Box::new(store), process, MenuData::structured(), tx);
        Self { hub, rx, seq: 0 }
    }

    fn event(&mut self, event: HubEvent) {
        self.hub.handle_event(event).unwrap();
    }

    fn connect_player(&mut self, ip: [u8; 4]) -> (PeerId, Rx<ClientOut>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let addr = SocketAddr::from((Ipv4Addr::from(ip), 40000));
        let handle = PeerHandle::new(next_peer_id(), addr, tx);
        let id = handle.id();
        self.event(HubEvent::PeerConnected(Peer::Player(handle)));
        (id, rx)
    }

    fn connect_launcher(&mut self, max_players: u16) -> (PeerId, Rx<HubToLauncher>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = PeerHandle::new(next_peer_id(), "10.9.9.9:5000".parse().unwrap(), tx);
        let id = handle.id();
        self.event(HubEvent::PeerConnected(Peer::GameServer(handle)));
        self.event(HubEvent::Request(
            id,
            Inbound::Launcher(LauncherToHub::ServerInfo {
                name: "alpha".to_string(),
                description: "CTF".to_string(),
                address: Ipv4Addr::new(10, 9, 9, 9),
                port: 7777,
                max_players,
                password_hash: None,
            }),
        ));
        (id, rx)
    }

    fn send(&mut self, peer: PeerId, record: Field) {
        let seq = self.seq;
        self.seq += 1;
        let packet = Packet {
            records: vec![record],
            trailer: Some(Trailer { seq, ack: 0 }),
        };
        self.event(HubEvent::Request(peer, Inbound::Client(packet)));
    }

    fn login(&mut self, peer: PeerId, name: &str) {
        self.send(
            peer,
            Field::record(
                LOGIN,
                vec![Field::string(LOGIN_NAME, name), Field::password(PASSWORD, password())],
            ),
        );
    }

    fn join(&mut self, peer: PeerId, server: u32) {
        self.send(peer, Field::record(JOIN, vec![Field::int4(SERVER_ID, server)]));
        self.send(
            peer,
            Field::record(JOIN, vec![Field::int4(SERVER_ID, server), Field::int1(CONFIRM, 1)]),
        );
    }

    /// Let timer tasks run, then handle whatever they posted
    async fn pump(&mut self) {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        while let Ok(event) = self.rx.try_recv() {
            self.event(event);
        }
    }
}

fn drain<M>(rx: &mut Rx<M>) -> Vec<Outbound<M>> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        out.push(item);
    }
    out
}

/// Records of every message queued for a player
fn replies(rx: &mut Rx<ClientOut>) -> Vec<Vec<Field>> {
    drain(rx)
        .into_iter()
        .filter_map(|o| match o {
            Outbound::Message(out) => Some(out.records),
            Outbound::Disconnect(_) => None,
        })
        .collect()
}

fn messages<M>(rx: &mut Rx<M>) -> Vec<M> {
    drain(rx)
        .into_iter()
        .filter_map(|o| match o {
            Outbound::Message(m) => Some(m),
            Outbound::Disconnect(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn test_unauthenticated_ignores_lobby_requests() {
    let mut h = Harness::new(HubConfig::default());
    let (peer, mut rx) = h.connect_player([10, 0, 0, 1]);

    h.send(peer, Field::record(SERVER_LIST, vec![]));
    h.send(peer, records::chat("x", 0, "hello?"));

    assert!(replies(&mut rx).is_empty());
    assert_eq!(h.hub.state_of(peer), Some(StateKind::Unauthenticated));
    assert!(h.hub.is_connected(peer));
}

#[tokio::test]
async fn test_hello_is_echoed_with_server_info() {
    let mut h = Harness::new(HubConfig::default());
    let (peer, mut rx) = h.connect_player([10, 0, 0, 1]);

    h.send(peer, Field::record(HELLO, vec![Field::int4(PROTOCOL_VERSION, 0x303)]));
    let out = replies(&mut rx);
    assert_eq!(out.len(), 1);
    let idents: Vec<u16> = out[0].iter().map(|r| r.ident).collect();
    assert_eq!(idents, vec![HELLO, SERVER_INFO]);
}

#[tokio::test]
async fn test_name_only_login_then_credentials() {
    let mut h = Harness::new(HubConfig::default());
    let (peer, mut rx) = h.connect_player([10, 0, 0, 1]);

    h.send(peer, Field::record(LOGIN, vec![Field::string(LOGIN_NAME, "alice")]));
    assert_eq!(replies(&mut rx), vec![vec![records::credentials_request()]]);
    assert_eq!(h.hub.state_of(peer), Some(StateKind::Unauthenticated));

    h.login(peer, "alice");
    let out = replies(&mut rx);
    assert_eq!(out.len(), 1);
    let snapshot = &out[0];
    assert_eq!(snapshot.len(), 12);
    assert_eq!(snapshot[0].ident, MENU_SNAPSHOT);
    assert_eq!(snapshot[0].get_int(PLAYER_ID), Some(12));
    assert_eq!(snapshot[0].get_int(VERIFIED), Some(1));
    assert_eq!(h.hub.state_of(peer), Some(StateKind::Authenticated));
    assert_eq!(h.hub.players.peer_of(PlayerId::new(12)), Some(peer));
}

#[tokio::test]
async fn test_bad_password_leaves_state() {
    let mut h = Harness::new(HubConfig::default());
    let (peer, mut rx) = h.connect_player([10, 0, 0, 1]);

    h.send(
        peer,
        Field::record(
            LOGIN,
            vec![Field::string(LOGIN_NAME, "alice"), Field::password(PASSWORD, vec![b'x'; 72])],
        ),
    );
    assert_eq!(replies(&mut rx), vec![vec![records::login_status(status::BAD_PASSWORD)]]);
    assert_eq!(h.hub.state_of(peer), Some(StateKind::Unauthenticated));
}

#[tokio::test]
async fn test_unknown_account_when_unverified_disabled() {
    let config = HubConfig {
        allow_unverified: false,
        ..Default::default()
    };
    let mut h = Harness::new(config);
    let (peer, mut rx) = h.connect_player([10, 0, 0, 1]);

    h.login(peer, "stranger");
    assert_eq!(replies(&mut rx), vec![vec![records::login_status(status::UNKNOWN_ACCOUNT)]]);
    assert_eq!(h.hub.state_of(peer), Some(StateKind::Unauthenticated));
}

#[tokio::test]
async fn test_unverified_login_keeps_temporary_id() {
    let mut h = Harness::new(HubConfig::default());
    let (peer, mut rx) = h.connect_player([10, 0, 0, 1]);

    h.login(peer, "stranger");
    let out = replies(&mut rx);
    assert_eq!(out[0][0].get_int(VERIFIED), Some(0));
    let id = PlayerId::new(out[0][0].get_int(PLAYER_ID).unwrap());
    assert!(id.is_temporary());
    assert_eq!(h.hub.state_of(peer), Some(StateKind::Authenticated));
}

#[tokio::test]
async fn test_two_step_join_pushes_loadouts_once() {
    let mut h = Harness::new(HubConfig::default());
    let (_launcher, mut launcher_rx) = h.connect_launcher(8);
    let (peer, mut rx) = h.connect_player([10, 0, 0, 1]);
    h.login(peer, "alice");
    replies(&mut rx);

    h.send(peer, Field::record(JOIN, vec![Field::int4(SERVER_ID, 1)]));
    let pick = replies(&mut rx);
    assert_eq!(pick, vec![vec![records::join_info(lobby_core::GameServerId::new(1), status::OK, None)]]);
    assert_eq!(h.hub.state_of(peer), Some(StateKind::Authenticated));

    h.send(
        peer,
        Field::record(JOIN, vec![Field::int4(SERVER_ID, 1), Field::int1(CONFIRM, 1)]),
    );
    assert_eq!(h.hub.state_of(peer), Some(StateKind::OnGameServer));
    let confirm = replies(&mut rx);
    let info = &confirm.last().unwrap()[0];
    assert_eq!(info.ident, JOIN_INFO);
    assert_eq!(info.get(ENDPOINT).and_then(|e| e.get_int(PORT)), Some(7777));

    let pushed = messages(&mut launcher_rx);
    let loadout_pushes = pushed
        .iter()
        .filter(|m| matches!(m, HubToLauncher::Loadouts { .. }))
        .count();
    assert_eq!(loadout_pushes, 1);
    assert!(matches!(pushed[0], HubToLauncher::PlayerJoined { player_id: 12, .. }));
}

#[tokio::test]
async fn test_join_unknown_server_disconnects() {
    let mut h = Harness::new(HubConfig::default());
    let (peer, mut rx) = h.connect_player([10, 0, 0, 1]);
    h.login(peer, "alice");
    replies(&mut rx);

    h.send(peer, Field::record(JOIN, vec![Field::int4(SERVER_ID, 99)]));

    let out = drain(&mut rx);
    assert!(matches!(
        out.last(),
        Some(Outbound::Disconnect(Some(ServerError::ProtocolViolation(_))))
    ));
    assert!(!h.hub.is_connected(peer));
    assert_eq!(h.hub.state_of(peer), None);

    // The reader reports the close afterwards; that is not an error
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let late = Peer::Player(PeerHandle::new(peer, "10.0.0.1:40000".parse().unwrap(), tx));
    h.event(HubEvent::PeerDisconnected(late, None));
}

#[tokio::test]
async fn test_confirm_needs_matching_pick() {
    let mut h = Harness::new(HubConfig::default());
    h.connect_launcher(8);
    let (peer, mut rx) = h.connect_player([10, 0, 0, 1]);
    h.login(peer, "alice");
    replies(&mut rx);

    h.send(
        peer,
        Field::record(JOIN, vec![Field::int4(SERVER_ID, 1), Field::int1(CONFIRM, 1)]),
    );
    assert!(!h.hub.is_connected(peer));
}

#[tokio::test]
async fn test_full_server_refuses_join() {
    let mut h = Harness::new(HubConfig::default());
    h.connect_launcher(1);
    let (first, _rx1) = h.connect_player([10, 0, 0, 1]);
    let (second, mut rx2) = h.connect_player([10, 0, 0, 2]);
    h.login(first, "alice");
    h.login(second, "bob");
    h.join(first, 1);
    replies(&mut rx2);

    h.send(second, Field::record(JOIN, vec![Field::int4(SERVER_ID, 1)]));
    let out = replies(&mut rx2);
    assert_eq!(out[0][0].get_int(STATUS_CODE), Some(status::SERVER_FULL));
    assert_eq!(h.hub.state_of(second), Some(StateKind::Authenticated));
}

#[tokio::test]
async fn test_leave_and_match_end_return_to_lobby() {
    let mut h = Harness::new(HubConfig::default());
    let (launcher, mut launcher_rx) = h.connect_launcher(8);
    let (a, _rxa) = h.connect_player([10, 0, 0, 1]);
    let (b, _rxb) = h.connect_player([10, 0, 0, 2]);
    h.login(a, "alice");
    h.login(b, "bob");
    h.join(a, 1);
    h.join(b, 1);

    h.send(a, Field::record(LEAVE, vec![]));
    assert_eq!(h.hub.state_of(a), Some(StateKind::Authenticated));
    assert!(messages(&mut launcher_rx)
        .iter()
        .any(|m| matches!(m, HubToLauncher::PlayerLeft { player_id: 12 })));

    h.event(HubEvent::Request(launcher, Inbound::Launcher(LauncherToHub::MatchEnd)));
    assert_eq!(h.hub.state_of(b), Some(StateKind::Authenticated));
}

#[tokio::test]
async fn test_launcher_loss_unlists_server() {
    let mut h = Harness::new(HubConfig::default());
    let (launcher, _launcher_rx) = h.connect_launcher(8);
    let (a, _rxa) = h.connect_player([10, 0, 0, 1]);
    h.login(a, "alice");
    h.join(a, 1);
    assert_eq!(h.hub.server_count(), 1);

    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let peer = Peer::GameServer(PeerHandle::new(launcher, "10.9.9.9:5000".parse().unwrap(), tx));
    h.event(HubEvent::PeerDisconnected(peer, None));

    assert_eq!(h.hub.server_count(), 0);
    assert_eq!(h.hub.state_of(a), Some(StateKind::Authenticated));
}

#[tokio::test(start_paused = true)]
async fn test_idle_player_is_disconnected() {
    let mut h = Harness::new(HubConfig::default());
    let (peer, mut rx) = h.connect_player([10, 0, 0, 1]);

    tokio::time::sleep(Duration::from_secs(30)).await;
    h.send(peer, Field::record(PING, vec![]));

    // First check at 60s finds only 30s of silence
    tokio::time::sleep(Duration::from_secs(31)).await;
    h.pump().await;
    assert!(h.hub.is_connected(peer));

    tokio::time::sleep(Duration::from_secs(30)).await;
    h.pump().await;
    assert!(!h.hub.is_connected(peer));
    assert!(drain(&mut rx)
        .iter()
        .any(|o| matches!(o, Outbound::Disconnect(Some(ServerError::IdleTimeout(_))))));
}

#[tokio::test(start_paused = true)]
async fn test_callbacks_of_departed_peer_do_nothing() {
    let mut h = Harness::new(HubConfig::default());
    h.connect_launcher(8);
    let (peer, _rx) = h.connect_player([10, 0, 0, 1]);
    h.login(peer, "alice");
    h.send(peer, Field::record(JOIN, vec![Field::int4(SERVER_ID, 1)]));
    assert_eq!(h.hub.callbacks.pending(), 2);

    let (tx, _rx2) = tokio::sync::mpsc::unbounded_channel();
    let gone = Peer::Player(PeerHandle::new(peer, "10.0.0.1:40000".parse().unwrap(), tx));
    h.event(HubEvent::PeerDisconnected(gone, None));

    // Slots stay taken until the timers fire, then free up without effect
    assert_eq!(h.hub.callbacks.pending(), 2);
    tokio::time::sleep(Duration::from_secs(61)).await;
    h.pump().await;
    assert_eq!(h.hub.callbacks.pending(), 0);
    assert_eq!(h.hub.player_count(), 0);
}

#[tokio::test]
async fn test_vote_kick_majority() {
    let mut store = seeded_store();
    store.register_player("carol", &password()).unwrap();
    let mut h = Harness::with_store(HubConfig::default(), store);
    let (_launcher, mut launcher_rx) = h.connect_launcher(8);

    let (a, _rxa) = h.connect_player([10, 0, 0, 1]);
    let (b, _rxb) = h.connect_player([10, 0, 0, 2]);
    let (c, _rxc) = h.connect_player([10, 0, 0, 3]);
    h.login(a, "alice");
    h.login(b, "bob");
    h.login(c, "carol");
    for p in [a, b, c] {
        h.join(p, 1);
    }
    let carol_id = h.hub.players.get(c).unwrap().player_id.get();
    messages(&mut launcher_rx);

    let vote = Field::record(VOTE_KICK, vec![Field::int4(KICK_TARGET, carol_id), Field::int1(VOTE, 1)]);
    h.send(a, vote.clone());
    assert_eq!(h.hub.state_of(c), Some(StateKind::OnGameServer));

    h.send(b, vote);
    assert_eq!(h.hub.state_of(c), Some(StateKind::Authenticated));
    assert!(messages(&mut launcher_rx)
        .iter()
        .any(|m| matches!(m, HubToLauncher::KickPlayer { player_id } if *player_id == carol_id)));
    assert!(h.hub.firewall.is_blacklisted("10.0.0.3".parse().unwrap()));
    assert_eq!(h.hub.players.get(a).unwrap().vote, None);
}

/// Five players on server 1, so a kick needs three ballots
fn full_vote_room() -> (Harness, Vec<PeerId>, Vec<Rx<ClientOut>>) {
    let mut store = seeded_store();
    for name in ["carol", "dave", "erin"] {
        store.register_player(name, &password()).unwrap();
    }
    let mut h = Harness::with_store(HubConfig::default(), store);
    h.connect_launcher(8);

    let mut peers = Vec::new();
    let mut receivers = Vec::new();
    for (i, name) in ["alice", "bob", "carol", "dave", "erin"].into_iter().enumerate() {
        let (peer, rx) = h.connect_player([10, 0, 0, i as u8 + 1]);
        h.login(peer, name);
        h.join(peer, 1);
        peers.push(peer);
        receivers.push(rx);
    }
    (h, peers, receivers)
}

fn ballot(h: &Harness, target: PeerId, in_favour: bool) -> Field {
    let target_id = h.hub.players.get(target).unwrap().player_id.get();
    Field::record(
        VOTE_KICK,
        vec![Field::int4(KICK_TARGET, target_id), Field::int1(VOTE, in_favour as u8)],
    )
}

fn ballots_against(h: &Harness, target: PeerId) -> usize {
    let server = h.hub.servers.get(lobby_core::GameServerId::new(1)).unwrap();
    server.votes.get(&target).map_or(0, |tally| tally.voters.len())
}

#[tokio::test]
async fn test_vote_withdrawal_removes_ballot() {
    let (mut h, p, _rx) = full_vote_room();
    let erin = p[4];

    h.send(p[0], ballot(&h, erin, true));
    assert_eq!(ballots_against(&h, erin), 1);
    assert_eq!(h.hub.players.get(p[0]).unwrap().vote, Some(erin));

    h.send(p[0], ballot(&h, erin, false));
    assert_eq!(ballots_against(&h, erin), 0);
    assert_eq!(h.hub.players.get(p[0]).unwrap().vote, None);

    // Withdrawing a vote nobody opened does not open one
    h.send(p[1], ballot(&h, erin, false));
    assert!(h.hub.servers.get(lobby_core::GameServerId::new(1)).unwrap().votes.is_empty());

    h.send(p[1], ballot(&h, erin, true));
    h.send(p[2], ballot(&h, erin, true));
    assert_eq!(ballots_against(&h, erin), 2);
    assert_eq!(h.hub.state_of(erin), Some(StateKind::OnGameServer));
}

#[tokio::test]
async fn test_switching_target_moves_the_ballot() {
    let (mut h, p, _rx) = full_vote_room();
    let (dave, erin) = (p[3], p[4]);

    h.send(p[0], ballot(&h, erin, true));
    h.send(p[0], ballot(&h, dave, true));
    assert_eq!(ballots_against(&h, erin), 0);
    assert_eq!(ballots_against(&h, dave), 1);
    assert_eq!(h.hub.players.get(p[0]).unwrap().vote, Some(dave));

    // Alice's earlier ballot no longer counts towards erin
    h.send(p[1], ballot(&h, erin, true));
    h.send(p[2], ballot(&h, erin, true));
    assert_eq!(ballots_against(&h, erin), 2);
    assert_eq!(h.hub.state_of(erin), Some(StateKind::OnGameServer));

    h.send(p[0], ballot(&h, erin, true));
    assert_eq!(h.hub.state_of(erin), Some(StateKind::Authenticated));
    assert_eq!(ballots_against(&h, dave), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unfinished_vote_expires() {
    let (mut h, p, _rx) = full_vote_room();
    let erin = p[4];

    h.send(p[0], ballot(&h, erin, true));
    h.send(p[1], ballot(&h, erin, true));
    assert_eq!(ballots_against(&h, erin), 2);

    tokio::time::sleep(Duration::from_secs(29)).await;
    h.pump().await;
    assert_eq!(ballots_against(&h, erin), 2);

    tokio::time::sleep(Duration::from_secs(2)).await;
    h.pump().await;
    assert_eq!(ballots_against(&h, erin), 0);
    assert_eq!(h.hub.players.get(p[0]).unwrap().vote, None);
    assert_eq!(h.hub.players.get(p[1]).unwrap().vote, None);

    // A late third ballot starts over instead of completing the old vote
    h.send(p[2], ballot(&h, erin, true));
    assert_eq!(ballots_against(&h, erin), 1);
    assert_eq!(h.hub.state_of(erin), Some(StateKind::OnGameServer));
}

#[tokio::test(start_paused = true)]
async fn test_reopened_vote_outlives_the_first_timer() {
    let (mut h, p, _rx) = full_vote_room();
    let erin = p[4];

    // t=0 alice opens a vote, t=10 she withdraws it
    h.send(p[0], ballot(&h, erin, true));
    tokio::time::sleep(Duration::from_secs(10)).await;
    h.send(p[0], ballot(&h, erin, false));
    assert_eq!(ballots_against(&h, erin), 0);

    // t=25 bob opens a new one
    tokio::time::sleep(Duration::from_secs(15)).await;
    h.send(p[1], ballot(&h, erin, true));

    // t=31 alice's timer has fired
    tokio::time::sleep(Duration::from_secs(6)).await;
    h.pump().await;
    assert_eq!(ballots_against(&h, erin), 1);
    assert_eq!(h.hub.players.get(p[1]).unwrap().vote, Some(erin));

    h.send(p[2], ballot(&h, erin, true));
    h.send(p[3], ballot(&h, erin, true));
    assert_eq!(h.hub.state_of(erin), Some(StateKind::Authenticated));

    // t=56 bob's timer finds nothing left to close
    tokio::time::sleep(Duration::from_secs(25)).await;
    h.pump().await;
    assert!(h.hub.servers.get(lobby_core::GameServerId::new(1)).unwrap().votes.is_empty());
}

#[tokio::test]
async fn test_duplicate_login_replaces_session() {
    let mut h = Harness::new(HubConfig::default());
    let (old, mut old_rx) = h.connect_player([10, 0, 0, 1]);
    let (new, _new_rx) = h.connect_player([10, 0, 0, 2]);
    h.login(old, "alice");
    h.login(new, "alice");

    assert!(!h.hub.is_connected(old));
    assert!(matches!(drain(&mut old_rx).last(), Some(Outbound::Disconnect(Some(_)))));
    assert_eq!(h.hub.players.peer_of(PlayerId::new(12)), Some(new));
}

#[tokio::test]
async fn test_login_reads_the_store_once() {
    let store = RationedStore {
        inner: seeded_store(),
        loads_left: Cell::new(1),
    };
    let mut h = Harness::with_parts(HubConfig::default(), store, Box::new(LoggingProcessControl));
    let (peer, mut rx) = h.connect_player([10, 0, 0, 1]);

    h.login(peer, "alice");
    assert_eq!(h.hub.state_of(peer), Some(StateKind::Authenticated));
    assert_eq!(h.hub.players.peer_of(PlayerId::new(12)), Some(peer));
    assert_eq!(replies(&mut rx)[0][0].ident, MENU_SNAPSHOT);
}

#[tokio::test]
async fn test_failed_store_read_drops_the_connection() {
    let store = RationedStore {
        inner: seeded_store(),
        loads_left: Cell::new(0),
    };
    let mut h = Harness::with_parts(HubConfig::default(), store, Box::new(LoggingProcessControl));
    let (peer, _rx) = h.connect_player([10, 0, 0, 1]);

    h.login(peer, "alice");
    assert!(!h.hub.is_connected(peer));
    assert_eq!(h.hub.players.peer_of_login("alice"), None);
    assert_eq!(h.hub.player_count(), 0);
}

#[tokio::test]
async fn test_duplicate_login_keeps_unsaved_edits() {
    let mut h = Harness::new(HubConfig::default());
    let (old, _old_rx) = h.connect_player([10, 0, 0, 1]);
    let (new, _new_rx) = h.connect_player([10, 0, 0, 2]);
    h.login(old, "alice");
    h.send(
        old,
        Field::record(
            LOADOUT_CHANGE,
            vec![
                Field::int4(CLASS_ID, 3),
                Field::int1(LOADOUT_INDEX, 0),
                Field::int1(SLOT, 1),
                Field::int4(ITEM_ID, 900),
            ],
        ),
    );
    h.login(new, "alice");

    let profile = h.hub.players.get(new).unwrap().profile.as_ref().unwrap();
    assert_eq!(profile.loadouts.len(), 1);
    assert_eq!(profile.loadouts[0].item_id, 900);
}

#[tokio::test]
async fn test_friends_hear_presence() {
    let mut h = Harness::new(HubConfig::default());
    let (bob, mut bob_rx) = h.connect_player([10, 0, 0, 2]);
    h.login(bob, "bob");
    replies(&mut bob_rx);

    let (alice, _alice_rx) = h.connect_player([10, 0, 0, 1]);
    h.login(alice, "alice");
    assert_eq!(
        replies(&mut bob_rx),
        vec![vec![records::friend_status("alice", presence::ONLINE)]]
    );

    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let gone = Peer::Player(PeerHandle::new(alice, "10.0.0.1:40000".parse().unwrap(), tx));
    h.event(HubEvent::PeerDisconnected(gone, None));
    assert_eq!(
        replies(&mut bob_rx),
        vec![vec![records::friend_status("alice", presence::OFFLINE)]]
    );
}

#[tokio::test]
async fn test_loadout_change_is_saved_on_disconnect() {
    let mut h = Harness::new(HubConfig::default());
    let (peer, _rx) = h.connect_player([10, 0, 0, 1]);
    h.login(peer, "alice");
    h.send(
        peer,
        Field::record(
            LOADOUT_CHANGE,
            vec![
                Field::int4(CLASS_ID, 3),
                Field::int1(LOADOUT_INDEX, 0),
                Field::int1(SLOT, 1),
                Field::int4(ITEM_ID, 900),
            ],
        ),
    );

    let (tx, _rx2) = tokio::sync::mpsc::unbounded_channel();
    let gone = Peer::Player(PeerHandle::new(peer, "10.0.0.1:40000".parse().unwrap(), tx));
    h.event(HubEvent::PeerDisconnected(gone, None));

    let saved = h.hub.store.load_player("alice").unwrap();
    assert_eq!(saved.loadouts.len(), 1);
    assert_eq!(saved.loadouts[0].item_id, 900);
}

#[tokio::test]
async fn test_register_with_auth_code() {
    let mut h = Harness::new(HubConfig::default());
    let (tx, mut bot_rx) = tokio::sync::mpsc::unbounded_channel();
    let bot = PeerHandle::new(next_peer_id(), "127.0.0.1:6000".parse().unwrap(), tx);
    let bot_id = bot.id();
    h.event(HubEvent::PeerConnected(Peer::AuthBot(bot)));
    h.event(HubEvent::Request(
        bot_id,
        Inbound::AuthBot(AuthBotToHub::AuthCodeRequest {
            login_name: "neo".to_string(),
        }),
    ));
    let code = match messages(&mut bot_rx).pop() {
        Some(HubToAuthBot::AuthCode { code, .. }) => code,
        other => panic!("no code issued: {:?}", other),
    };

    let (peer, mut rx) = h.connect_player([10, 0, 0, 1]);
    h.login(peer, "neo");
    replies(&mut rx);

    h.send(peer, records::chat("neo", 0, "/register WRONG123"));
    assert!(!h.hub.players.get(peer).unwrap().verified);

    h.send(peer, records::chat("neo", 0, &format!("/register {}", code)));
    let session = h.hub.players.get(peer).unwrap();
    assert!(session.verified);
    assert!(!session.player_id.is_temporary());
    assert_eq!(h.hub.store.load_player("neo").unwrap().player_id, session.player_id);
}

#[tokio::test]
async fn test_firewall_follows_game_server_membership() {
    let mut h = Harness::new(HubConfig::default());
    let (tx, mut fw_rx) = tokio::sync::mpsc::unbounded_channel();
    let fw = PeerHandle::new(next_peer_id(), "127.0.0.1:9801".parse().unwrap(), tx);
    h.event(HubEvent::PeerConnected(Peer::Firewall(fw)));

    h.connect_launcher(8);
    let (peer, _rx) = h.connect_player([10, 0, 0, 1]);
    h.login(peer, "alice");
    h.join(peer, 1);
    h.send(peer, Field::record(LEAVE, vec![]));

    let address = Some("10.0.0.1".parse().unwrap());
    assert_eq!(
        messages(&mut fw_rx),
        vec![
            HubToFirewall::SetMembership {
                list: FirewallList::Whitelist,
                action: FirewallAction::Add,
                address,
            },
            HubToFirewall::SetMembership {
                list: FirewallList::Whitelist,
                action: FirewallAction::Remove,
                address,
            },
        ]
    );
}

#[tokio::test]
async fn test_oversized_byte_elements_disconnect() {
    let mut h = Harness::new(HubConfig::default());
    let (peer, mut rx) = h.connect_player([10, 0, 0, 1]);
    h.login(peer, "bob");

    // 257 would wrap around to "add"
    h.send(
        peer,
        Field::record(
            FRIEND_EDIT,
            vec![Field::string(FRIEND_NAME, "carol"), Field::int4(FRIEND_ACTION, 257)],
        ),
    );
    assert!(!h.hub.is_connected(peer));
    assert!(drain(&mut rx)
        .iter()
        .any(|o| matches!(o, Outbound::Disconnect(Some(ServerError::ProtocolViolation(_))))));
    assert!(!h.hub.store.load_player("bob").unwrap().friends.contains("carol"));

    let (peer, _rx) = h.connect_player([10, 0, 0, 2]);
    h.login(peer, "alice");
    h.send(
        peer,
        Field::record(
            LOADOUT_CHANGE,
            vec![
                Field::int4(CLASS_ID, 3),
                Field::int4(LOADOUT_INDEX, 256),
                Field::int1(SLOT, 1),
                Field::int4(ITEM_ID, 900),
            ],
        ),
    );
    assert!(!h.hub.is_connected(peer));
    assert!(h.hub.store.load_player("alice").unwrap().loadouts.is_empty());

    let (peer, _rx) = h.connect_player([10, 0, 0, 3]);
    h.login(peer, "alice");
    h.send(
        peer,
        Field::record(CHAT, vec![Field::string(CHAT_TEXT, "hi"), Field::int4(CHAT_CHANNEL, 0x100)]),
    );
    assert!(!h.hub.is_connected(peer));
}

#[tokio::test]
async fn test_only_connection_errors_are_contained() {
    let mut h = Harness::new(HubConfig::default());
    let (peer, _rx) = h.connect_player([10, 0, 0, 1]);

    let bug = ServerError::DuplicateHandlerMatch { ident: PING, state: "Authenticated" };
    assert!(h.hub.contain(peer, Err(bug)).is_err());
    assert!(h.hub.is_connected(peer));

    assert!(h.hub.contain(peer, Err(ServerError::RateLimitExceeded)).is_ok());
    assert!(!h.hub.is_connected(peer));
}

/// Remembers every request instead of acting on it
#[derive(Clone, Default)]
struct RecordingProcessControl {
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingProcessControl {
    fn record(&self, call: String) -> lobby_core::Result<()> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProcessControl for RecordingProcessControl {
    fn start(&mut self, server_name: &str) -> lobby_core::Result<()> {
        self.record(format!("start {}", server_name))
    }

    fn stop(&mut self, server_name: &str) -> lobby_core::Result<()> {
        self.record(format!("stop {}", server_name))
    }

    fn freeze(&mut self, server_name: &str) -> lobby_core::Result<()> {
        self.record(format!("freeze {}", server_name))
    }

    fn unfreeze(&mut self, server_name: &str) -> lobby_core::Result<()> {
        self.record(format!("unfreeze {}", server_name))
    }

    fn inject(&mut self, process_id: u32, module_path: &Path) -> lobby_core::Result<()> {
        self.record(format!("inject {} {}", process_id, module_path.display()))
    }
}

#[tokio::test]
async fn test_process_exit_evacuates_and_restarts() {
    let process = RecordingProcessControl::default();
    let config = HubConfig {
        restart_game_servers: true,
        ..Default::default()
    };
    let mut h = Harness::with_parts(config, seeded_store(), Box::new(process.clone()));
    h.connect_launcher(8);
    let (peer, _rx) = h.connect_player([10, 0, 0, 1]);
    h.login(peer, "alice");
    h.join(peer, 1);
    assert_eq!(h.hub.state_of(peer), Some(StateKind::OnGameServer));

    h.event(HubEvent::LauncherInfo(LauncherInfo::ProcessExited {
        server_name: "alpha".to_string(),
        exit_code: Some(1),
    }));
    assert_eq!(h.hub.state_of(peer), Some(StateKind::Authenticated));
    assert_eq!(process.calls(), vec!["start alpha".to_string()]);
}

#[tokio::test]
async fn test_process_start_injects_configured_module() {
    let process = RecordingProcessControl::default();
    let config = HubConfig {
        inject_module: Some(PathBuf::from("hooks/lobby.dll")),
        ..Default::default()
    };
    let mut h = Harness::with_parts(config, seeded_store(), Box::new(process.clone()));

    h.event(HubEvent::LauncherInfo(LauncherInfo::ProcessStarted {
        server_name: "alpha".to_string(),
        process_id: 4242,
    }));
    assert_eq!(process.calls(), vec!["inject 4242 hooks/lobby.dll".to_string()]);
}

#[tokio::test]
async fn test_launcher_must_register_first() {
    let mut h = Harness::new(HubConfig::default());
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = PeerHandle::new(next_peer_id(), "10.9.9.9:5000".parse().unwrap(), tx);
    let launcher = handle.id();
    h.event(HubEvent::PeerConnected(Peer::GameServer(handle)));

    h.event(HubEvent::Request(launcher, Inbound::Launcher(LauncherToHub::MatchEnd)));
    assert!(!h.hub.is_connected(launcher));
    assert_eq!(h.hub.server_count(), 0);
}
