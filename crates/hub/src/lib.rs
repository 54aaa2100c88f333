//! # Lobby Hub
//!
//! The central dispatcher: a single task that owns every shared table and
//! handles one event at a time.
//!
//! ## Modules
//!
//! - [`hub`] - Event loop, error containment, state transitions
//! - [`states`] - Per-state request tables
//! - [`handlers`] - Hello, login, chat, loadouts, friends
//! - [`matchmaking`] - Join handshake, leave, vote kick, launcher messages
//! - [`players`] / [`session`] - Connected players
//! - [`gameservers`] - Registered game servers
//! - [`social`] - Presence and friends
//! - [`callbacks`] - Deferred work on the hub queue
//! - [`firewall`] - Firewall collaborator link
//! - [`process`] - Process-lifecycle collaborator
//! - [`authcodes`] - Registration codes
//! - [`menu`] - Menu snapshot assembly
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lobby_accounts::MemoryStore;
//! use lobby_hub::{Hub, HubConfig, LoggingProcessControl, MenuData};
//! use lobby_network::hub_channel;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> lobby_core::Result<()> {
//! let (tx, rx) = hub_channel();
//! let hub = Hub::new(
//!     HubConfig::default(),
//!     Box::new(MemoryStore::new()),
//!     Box::new(LoggingProcessControl),
//!     MenuData::structured(),
//!     tx.clone(),
//! );
//! // hand `tx` to listeners and connectors, then:
//! hub.run(rx, CancellationToken::new()).await
//! # }
//! ```

pub mod authcodes;
pub mod callbacks;
pub mod config;
pub mod firewall;
pub mod gameservers;
pub mod handlers;
pub mod hub;
pub mod matchmaking;
pub mod menu;
pub mod players;
pub mod process;
pub mod session;
pub mod social;
pub mod states;

pub use callbacks::CallbackAction;
pub use config::HubConfig;
pub use gameservers::{hash_password, ServerDetails};
pub use hub::Hub;
pub use menu::MenuData;
pub use process::{LoggingProcessControl, ProcessControl};
pub use states::StateKind;

#[cfg(test)]
mod tests;
