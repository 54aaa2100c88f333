//! Getting players onto game servers and off them again
//!
//! Joining takes two steps. The pick names a server and makes it the
//! session's candidate; the confirm repeats the id with `CONFIRM` set and,
//! once capacity and password check out, moves the player to OnGameServer.

use crate::callbacks::CallbackAction;
use crate::gameservers::ServerDetails;
use crate::handlers::required;
use crate::hub::Hub;
use crate::states::StateKind;
use lobby_core::{GameServerId, PeerId, PlayerId, Result, ServerError};
use lobby_protocol::control::{HubToLauncher, LauncherToHub};
use lobby_protocol::ident::*;
use lobby_protocol::{records, Field};
use tracing::{debug, info};

fn server_id(request: &Field, hub: &Hub) -> Result<GameServerId> {
    let id = GameServerId::new(required(request, SERVER_ID)?);
    if !hub.servers.contains(id) {
        return Err(ServerError::ProtocolViolation(format!("no game server {}", id)));
    }
    Ok(id)
}

fn reply(hub: &Hub, peer: PeerId, record: Field) {
    if let Some(session) = hub.players.get(peer) {
        session.send(vec![record]);
    }
}

/// First join step: remember the server as the candidate
pub(crate) fn join_pick(hub: &mut Hub, peer: PeerId, request: &Field) -> Result<()> {
    let id = server_id(request, hub)?;
    if hub.servers.get(id).is_some_and(|s| s.is_full()) {
        reply(hub, peer, records::join_info(id, status::SERVER_FULL, None));
        return Ok(());
    }

    if let Some(session) = hub.players.get_mut(peer) {
        session.candidate = Some(id);
    }
    reply(hub, peer, records::join_info(id, status::OK, None));
    let timeout = hub.config.candidate_timeout;
    hub.schedule(Some(peer), timeout, CallbackAction::CandidateExpiry { peer, server: id });
    Ok(())
}

/// Second join step: check the server still takes us, then enter it
pub(crate) fn join_confirm(hub: &mut Hub, peer: PeerId, request: &Field) -> Result<()> {
    let id = server_id(request, hub)?;
    let Some(session) = hub.players.get(peer) else {
        return Ok(());
    };
    if session.candidate != Some(id) {
        return Err(ServerError::ProtocolViolation(format!(
            "join confirm for {} without picking it",
            id
        )));
    }
    if session.game_server == Some(id) {
        debug!("{} already on server {}", peer, id);
        return Ok(());
    }

    let Some(server) = hub.servers.get(id) else {
        return Ok(());
    };
    if server.is_full() {
        if let Some(session) = hub.players.get_mut(peer) {
            session.candidate = None;
        }
        reply(hub, peer, records::join_info(id, status::SERVER_FULL, None));
        return Ok(());
    }
    let password = request.get_bytes(SERVER_PASSWORD).unwrap_or_default();
    if !server.password_matches(password) {
        info!("{} gave a wrong password for server {}", peer, id);
        reply(hub, peer, records::join_info(id, status::BAD_SERVER_PASSWORD, None));
        return Ok(());
    }
    let endpoint = (server.details.address, server.details.port);

    // Switching servers leaves the old one first
    hub.transition(peer, StateKind::Authenticated)?;
    if let Some(session) = hub.players.get_mut(peer) {
        session.candidate = None;
        session.game_server = Some(id);
    }
    hub.transition(peer, StateKind::OnGameServer)?;
    reply(hub, peer, records::join_info(id, status::OK, Some(endpoint)));
    Ok(())
}

pub(crate) fn leave(hub: &mut Hub, peer: PeerId, _request: &Field) -> Result<()> {
    hub.transition(peer, StateKind::Authenticated)
}

/// Count a vote against a player on the same server.
///
/// A strict majority of the server's players kicks and bans the target.
pub(crate) fn vote_kick(hub: &mut Hub, peer: PeerId, request: &Field) -> Result<()> {
    let target_id = PlayerId::new(required(request, KICK_TARGET)?);
    let in_favour = request.get_int(VOTE).unwrap_or(1) != 0;

    let Some(voter) = hub.players.get(peer) else {
        return Ok(());
    };
    let Some(server_id) = voter.game_server else {
        return Ok(());
    };
    let previous = voter.vote;
    let Some(target) = hub.players.peer_of(target_id) else {
        debug!("{} voted against unknown player {}", peer, target_id);
        return Ok(());
    };
    let same_server = hub.players.get(target).and_then(|s| s.game_server) == Some(server_id);
    if target == peer || !same_server {
        debug!("{} vote against {} ignored", peer, target_id);
        return Ok(());
    }

    let Some(server) = hub.servers.get_mut(server_id) else {
        return Ok(());
    };
    // One ballot per voter: a new target withdraws the old vote
    if let Some(previous) = previous.filter(|&p| p != target) {
        server.withdraw(peer, previous);
    }
    let threshold = server.kick_threshold();
    let (count, opened) = if in_favour {
        let (tally, opened) = server.vote_against(target);
        tally.voters.insert(peer);
        (tally.voters.len(), opened.then_some(tally.round))
    } else {
        server.withdraw(peer, target);
        let count = server.votes.get(&target).map_or(0, |tally| tally.voters.len());
        (count, None)
    };

    if let Some(voter) = hub.players.get_mut(peer) {
        voter.vote = in_favour.then_some(target);
    }
    info!("Vote kick against {} on server {}: {}/{}", target_id, server_id, count, threshold);

    if count >= threshold {
        kick(hub, server_id, target)
    } else {
        if let Some(round) = opened {
            let timeout = hub.config.vote_timeout;
            let action = CallbackAction::VoteKickExpire {
                server: server_id,
                target,
                round,
            };
            hub.schedule(None, timeout, action);
        }
        Ok(())
    }
}

fn kick(hub: &mut Hub, server_id: GameServerId, target: PeerId) -> Result<()> {
    let Some(session) = hub.players.get(target) else {
        return Ok(());
    };
    let player_id = session.player_id.get();
    let address = session.ip();

    expire_votes(hub, server_id, target, None);
    if let Some(server) = hub.servers.get(server_id) {
        server.send(HubToLauncher::KickPlayer { player_id });
    }
    info!("Player {} kicked from server {} by vote", player_id, server_id);

    hub.transition(target, StateKind::Authenticated)?;
    hub.firewall.blacklist(address);
    let ban = hub.config.vote_kick_ban;
    hub.schedule(None, ban, CallbackAction::Unblacklist(address));
    Ok(())
}

/// Close the vote against `target`, clearing every ballot cast in it. With a
/// `round`, a vote reopened since that round is left alone.
pub(crate) fn expire_votes(hub: &mut Hub, server_id: GameServerId, target: PeerId, round: Option<u64>) {
    let Some(tally) = hub.servers.get_mut(server_id).and_then(|s| s.close_vote(target, round)) else {
        return;
    };
    for voter in tally.voters {
        if let Some(session) = hub.players.get_mut(voter) {
            if session.vote == Some(target) {
                session.vote = None;
            }
        }
    }
    debug!("Vote against {} on server {} closed", target, server_id);
}

/// Messages from a game-server launcher
pub(crate) fn launcher_message(hub: &mut Hub, peer: PeerId, message: LauncherToHub) -> Result<()> {
    if let LauncherToHub::ServerInfo {
        name,
        description,
        address,
        port,
        max_players,
        password_hash,
    } = message
    {
        let details = ServerDetails {
            name,
            description,
            address,
            port,
            max_players,
            password_hash,
        };
        let (id, new) = hub.servers.register_or_update(peer, details)?;
        if new {
            info!("Game server {} registered by {}", id, peer);
        } else {
            debug!("Game server {} updated", id);
        }
        return Ok(());
    }

    let id = hub.servers.by_peer(peer).ok_or_else(|| {
        ServerError::ProtocolViolation(format!("{} sent {:?} before registering", peer, message))
    })?;

    match message {
        LauncherToHub::ServerInfo { .. } => {}
        LauncherToHub::TeamInfo { teams } => {
            let Some(server) = hub.servers.get_mut(id) else {
                return Ok(());
            };
            let players: Vec<PeerId> = server.players.iter().copied().collect();
            for player in players {
                if let Some(session) = hub.players.get_mut(player) {
                    session.team = teams.get(&session.player_id.get()).copied();
                }
            }
            server.teams = teams;
        }
        LauncherToHub::MatchTime {
            seconds_remaining,
            counting,
        } => {
            if let Some(server) = hub.servers.get_mut(id) {
                server.match_time = Some((seconds_remaining, counting));
            }
        }
        LauncherToHub::MatchEnd => {
            info!("Match ended on game server {}", id);
            hub.evacuate(id);
        }
    }
    Ok(())
}
