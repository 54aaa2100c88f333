//! # Lobby Account Storage
//!
//! Profiles and the storage collaborator the hub talks to.
//!
//! ## Features
//!
//! - `ProfileRecord`: credentials, stats, loadouts and friends of one account
//! - `AccountStore`: load, save and register, behind a trait
//! - `MemoryStore`: in-process implementation
//!
//! ## Usage
//!
//! ```rust
//! use lobby_accounts::{AccountStore, MemoryStore};
//!
//! let mut store = MemoryStore::new();
//! let profile = store.register_player("neo", b"hunter2").unwrap();
//! assert!(store.load_player("NEO").unwrap().password_matches(b"hunter2"));
//! assert!(!profile.player_id.is_temporary());
//! ```

mod error;
mod profile;
mod store;

pub use error::{AccountError, Result};
pub use profile::{normalize_login, ProfileRecord, MAX_FRIENDS};
pub use store::{AccountStore, MemoryStore};
