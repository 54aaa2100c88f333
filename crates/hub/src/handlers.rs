//! Session setup and lobby request handlers
//!
//! Join, leave and vote kick live in [`matchmaking`](crate::matchmaking).

use crate::hub::Hub;
use crate::states::StateKind;
use lobby_accounts::{AccountError, ProfileRecord};
use lobby_core::{LoadoutSlot, PeerId, Result, ServerError};
use lobby_protocol::control::HubToLauncher;
use lobby_protocol::ident::*;
use lobby_protocol::{records, Field};
use rand::Rng;
use tracing::{debug, error, info};

/// Chat to everybody in the lobby
pub const CHANNEL_LOBBY: u8 = 0;
/// Chat to the players on the sender's game server
pub const CHANNEL_SERVER: u8 = 1;

const SESSION_TOKEN_LEN: usize = 16;

/// An integer element the request cannot do without
pub(crate) fn required(request: &Field, ident: u16) -> Result<u32> {
    request.get_int(ident).ok_or_else(|| {
        ServerError::ProtocolViolation(format!(
            "record {:#06x} lacks element {:#06x}",
            request.ident, ident
        ))
    })
}

/// A one-byte element, which a wider value cannot be
fn byte(request: &Field, ident: u16, value: u32) -> Result<u8> {
    u8::try_from(value).map_err(|_| {
        ServerError::ProtocolViolation(format!(
            "record {:#06x} element {:#06x} out of range: {}",
            request.ident, ident, value
        ))
    })
}

fn reply(hub: &Hub, peer: PeerId, records: Vec<Field>) {
    if let Some(session) = hub.players.get(peer) {
        session.send(records);
    }
}

fn notice(hub: &Hub, peer: PeerId, text: &str) {
    reply(hub, peer, vec![records::chat(&hub.config.server_name, CHANNEL_LOBBY, text)]);
}

/// Answer the hello with our own and the server info, in one untrailered packet
pub(crate) fn hello(hub: &mut Hub, peer: PeerId, _request: &Field) -> Result<()> {
    let mut token = [0u8; SESSION_TOKEN_LEN];
    rand::thread_rng().fill(&mut token);
    reply(
        hub,
        peer,
        vec![records::hello_echo(&token), records::server_info(&hub.config.server_name)],
    );
    Ok(())
}

pub(crate) fn ping(hub: &mut Hub, peer: PeerId, request: &Field) -> Result<()> {
    reply(hub, peer, vec![request.clone()]);
    Ok(())
}

pub(crate) fn login_name_only(hub: &mut Hub, peer: PeerId, _request: &Field) -> Result<()> {
    reply(hub, peer, vec![records::credentials_request()]);
    Ok(())
}

/// Check credentials, then send the menu snapshot and move to Authenticated.
///
/// A failed check answers with a status code and leaves the state alone.
pub(crate) fn login_credentials(hub: &mut Hub, peer: PeerId, request: &Field) -> Result<()> {
    let login_name = request
        .get_str(LOGIN_NAME)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    let password = request.get_bytes(PASSWORD).unwrap_or_default().to_vec();
    if login_name.is_empty() {
        reply(hub, peer, vec![records::login_status(status::UNKNOWN_ACCOUNT)]);
        return Ok(());
    }

    let mut stored = match hub.store.load_player(&login_name) {
        Ok(profile) if profile.password_matches(&password) => Some(profile),
        Ok(_) => {
            info!("Bad password for {} from {}", login_name, peer);
            reply(hub, peer, vec![records::login_status(status::BAD_PASSWORD)]);
            return Ok(());
        }
        Err(e) if e.is_not_found() && hub.config.allow_unverified => None,
        Err(e) if e.is_not_found() => {
            info!("Unknown account {} from {}", login_name, peer);
            reply(hub, peer, vec![records::login_status(status::UNKNOWN_ACCOUNT)]);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let verified = stored.is_some();

    if let Some(previous) = hub.players.peer_of_login(&login_name).filter(|&p| p != peer) {
        // The live session holds edits the store has not seen yet
        let live = hub.players.get(previous).filter(|s| s.verified).and_then(|s| s.profile.clone());
        if verified && live.is_some() {
            stored = live;
        }
        hub.force_disconnect(
            previous,
            ServerError::ProtocolViolation(format!("{} logged in from another connection", login_name)),
        );
    }

    hub.players.set_login(peer, &login_name);
    let profile = match stored {
        Some(profile) => {
            hub.players.reassign_id(peer, profile.player_id);
            profile
        }
        None => {
            let Some(session) = hub.players.get(peer) else {
                return Ok(());
            };
            ProfileRecord::new(&login_name, session.player_id, password.clone())
        }
    };

    let friends: Vec<(String, u8)> = profile
        .friends
        .iter()
        .map(|f| (f.clone(), hub.social.presence_of(f)))
        .collect();
    hub.social.join(peer, &login_name, &profile.friends);

    let Some(session) = hub.players.get_mut(peer) else {
        return Ok(());
    };
    session.display_name = profile.display_name.clone();
    session.verified = verified;
    session.password = password;
    let snapshot = hub
        .menu
        .snapshot(session.player_id, &profile.display_name, verified, &profile, &friends);
    session.profile = Some(profile);
    session.send(snapshot);
    info!(
        "{} logged in as {} ({}, {})",
        peer,
        login_name,
        session.player_id,
        if verified { "verified" } else { "unverified" }
    );

    hub.transition(peer, StateKind::Authenticated)
}

/// Lobby or server chat, plus the `/register <code>` command
pub(crate) fn chat(hub: &mut Hub, peer: PeerId, request: &Field) -> Result<()> {
    let text = request.get_str(CHAT_TEXT).unwrap_or_default();
    let mut words = text.split_whitespace();
    if words.next() == Some("/register") {
        return register(hub, peer, words.next().unwrap_or_default());
    }

    let Some(session) = hub.players.get(peer) else {
        return Ok(());
    };
    let channel = byte(request, CHAT_CHANNEL, request.get_int(CHAT_CHANNEL).unwrap_or_default())?;
    let message = records::chat(&session.display_name, channel, text);

    let recipients: Vec<PeerId> = match (channel, session.game_server) {
        (CHANNEL_SERVER, Some(server)) => hub
            .servers
            .get(server)
            .map(|s| s.players.iter().copied().collect())
            .unwrap_or_default(),
        _ => hub
            .players
            .iter()
            .filter(|s| s.state.is_online())
            .map(|s| s.peer_id())
            .collect(),
    };
    debug!("{} chat on channel {} to {} players", peer, channel, recipients.len());
    for recipient in recipients {
        reply(hub, recipient, vec![message.clone()]);
    }
    Ok(())
}

/// Turn an unverified session into a registered account
fn register(hub: &mut Hub, peer: PeerId, code: &str) -> Result<()> {
    let Some(session) = hub.players.get(peer) else {
        return Ok(());
    };
    if session.verified {
        notice(hub, peer, "This account is already registered");
        return Ok(());
    }
    let login_name = session.login_name.clone();
    let password = session.password.clone();

    if code.is_empty() || !hub.auth_codes.redeem(&login_name, code) {
        notice(hub, peer, "Invalid or expired code");
        return Ok(());
    }

    let mut profile = match hub.store.register_player(&login_name, &password) {
        Ok(profile) => profile,
        Err(AccountError::AlreadyExists(_)) => {
            notice(hub, peer, "That login name is already registered");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(transient) = hub.players.get_mut(peer).and_then(|s| s.profile.take()) {
        profile.loadouts = transient.loadouts;
        profile.friends = transient.friends;
    }
    hub.players.reassign_id(peer, profile.player_id);
    if let Err(e) = hub.store.save_player(&login_name, &profile) {
        error!("Saving new profile of {} failed: {}", login_name, e);
    }
    info!("{} registered as {} ({})", peer, login_name, profile.player_id);

    if let Some(session) = hub.players.get_mut(peer) {
        session.verified = true;
        session.profile = Some(profile);
    }
    notice(hub, peer, "Account registered");
    Ok(())
}

pub(crate) fn server_list(hub: &mut Hub, peer: PeerId, _request: &Field) -> Result<()> {
    reply(hub, peer, vec![records::server_list(&hub.servers.listings())]);
    Ok(())
}

/// Equip an item; a player on a game server has its loadouts pushed again
pub(crate) fn loadout_change(hub: &mut Hub, peer: PeerId, request: &Field) -> Result<()> {
    let slot = LoadoutSlot {
        class_id: required(request, CLASS_ID)?,
        loadout: byte(request, LOADOUT_INDEX, required(request, LOADOUT_INDEX)?)?,
        slot: byte(request, SLOT, required(request, SLOT)?)?,
        item_id: required(request, ITEM_ID)?,
    };

    let Some(session) = hub.players.get_mut(peer) else {
        return Ok(());
    };
    let Some(profile) = session.profile.as_mut() else {
        return Ok(());
    };
    profile.set_loadout(slot);
    debug!("{} equipped {:?}", peer, slot);

    if session.state == StateKind::OnGameServer {
        let loadouts = profile.loadouts.clone();
        let player_id = session.player_id.get();
        if let Some(server) = session.game_server.and_then(|id| hub.servers.get(id)) {
            server.send(HubToLauncher::Loadouts { player_id, loadouts });
        }
    }
    Ok(())
}

/// Add or remove a friend, answering with the updated list
pub(crate) fn friend_edit(hub: &mut Hub, peer: PeerId, request: &Field) -> Result<()> {
    let name = request
        .get_str(FRIEND_NAME)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ServerError::ProtocolViolation("friend edit without a name".into()))?;
    let action = byte(request, FRIEND_ACTION, required(request, FRIEND_ACTION)?)?;

    let Some(session) = hub.players.get_mut(peer) else {
        return Ok(());
    };
    let Some(profile) = session.profile.as_mut() else {
        return Ok(());
    };

    match action {
        friend_action::ADD => {
            if profile.add_friend(name) {
                hub.social.add_friend(peer, name);
            }
        }
        friend_action::REMOVE => {
            if profile.remove_friend(name) {
                hub.social.remove_friend(peer, name);
            }
        }
        other => {
            return Err(ServerError::ProtocolViolation(format!("unknown friend action {}", other)));
        }
    }

    let friends: Vec<(String, u8)> = profile
        .friends
        .iter()
        .map(|f| (f.clone(), hub.social.presence_of(f)))
        .collect();
    session.send(vec![records::friends_list(&friends)]);
    Ok(())
}
