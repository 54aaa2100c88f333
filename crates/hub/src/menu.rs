//! Menu snapshot assembly
//!
//! A successful login is answered with one packet: the snapshot head, three
//! structured follow-ups about the player, then the eight menu data records.

use lobby_accounts::ProfileRecord;
use lobby_core::{PlayerId, Result};
use lobby_protocol::ident::MENU_DATA;
use lobby_protocol::{records, CaptureBlob, Field, Verbatim};
use std::collections::HashMap;

/// Bodies for the menu data records, resolved once at startup
#[derive(Debug, Clone, Default)]
pub struct MenuData {
    captured: HashMap<u16, Verbatim>,
}

impl MenuData {
    /// Empty structured bodies for every menu data record
    pub fn structured() -> Self {
        Self::default()
    }

    /// Replay the menu data bodies from a capture.
    ///
    /// Fails if any range lies outside the blob.
    pub fn from_capture(blob: &CaptureBlob) -> Result<Self> {
        let captured = blob.menu_ranges()?.into_iter().collect();
        Ok(Self { captured })
    }

    pub fn is_captured(&self) -> bool {
        !self.captured.is_empty()
    }

    /// The twelve records of a login answer
    pub fn snapshot(
        &self,
        player_id: PlayerId,
        display_name: &str,
        verified: bool,
        profile: &ProfileRecord,
        friends: &[(String, u8)],
    ) -> Vec<Field> {
        let mut out = Vec::with_capacity(1 + 3 + MENU_DATA.len());
        out.push(records::menu_snapshot(player_id, &profile.login_name, display_name, verified));
        out.push(records::profile_stats(profile.xp, profile.rank, profile.gold));
        out.push(records::loadouts(&profile.loadouts));
        out.push(records::friends_list(friends));
        for ident in MENU_DATA {
            out.push(records::menu_data(ident, self.captured.get(&ident).cloned()));
        }
        out
    }
}
