//! # Lobby Networking Layer
//!
//! Tokio-based connection handling for the lobby server. Nothing in here
//! touches shared server state: every connection only talks to the hub
//! through its event queue.
//!
//! ## Modules
//!
//! - [`config`] - Addresses, chunk sizes and rate limits
//! - [`peer`] - The `Peer` tagged union and its outbound queue
//! - [`event`] - Events posted to the hub
//! - [`wire`] - Message encoding per kind of peer
//! - [`actor`] - Reader/writer task pair per connection
//! - [`listener`] - Accept loops for incoming connections
//! - [`connector`] - Outgoing connections with fixed-delay retry
//! - [`ratelimit`] - Token bucket

pub mod actor;
pub mod config;
pub mod connector;
pub mod event;
pub mod listener;
pub mod peer;
pub mod ratelimit;
pub mod wire;

// Re-export commonly used items
pub use actor::{spawn_actor, spawn_actor_on};
pub use config::NetworkConfig;
pub use connector::run_connector;
pub use event::{hub_channel, CallbackId, HubEvent, HubReceiver, HubSender, Inbound, LauncherInfo};
pub use listener::{bind, serve};
pub use peer::{next_peer_id, ClientOut, Outbound, Peer, PeerHandle, PeerRole};
pub use ratelimit::{RateLimit, TokenBucket};
pub use wire::{AuthBotKind, FirewallKind, LauncherKind, PeerKind, PlayerKind};
