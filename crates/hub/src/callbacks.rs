//! Deferred work
//!
//! Scheduling a callback spawns a timer task that posts `ExecuteCallback(id)`
//! back onto the hub queue, so callback bodies run on the hub like any other
//! event. Ids are slot indices: a slot stays taken until its timer fires,
//! even if the callback was neutralized in the meantime.

use lobby_core::{GameServerId, PeerId};
use lobby_network::{CallbackId, HubEvent, HubSender};
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::sleep;

/// What to do when a callback fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Disconnect the player if it has been idle for the full timeout
    IdleCheck(PeerId),
    /// Forget a picked server that was never confirmed
    CandidateExpiry { peer: PeerId, server: GameServerId },
    /// Close an unfinished vote, unless it was reopened since
    VoteKickExpire { server: GameServerId, target: PeerId, round: u64 },
    Unblacklist(IpAddr),
    AuthCodeExpiry { login_name: String, code: String },
}

#[derive(Debug)]
struct Pending {
    owner: Option<PeerId>,
    /// `None` once neutralized
    action: Option<CallbackAction>,
}

#[derive(Debug, Default)]
pub struct Callbacks {
    slots: Vec<Option<Pending>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` on the hub after `delay`.
    ///
    /// If `owner` disconnects first the callback becomes a no-op.
    pub fn schedule(
        &mut self,
        events: &HubSender,
        owner: Option<PeerId>,
        delay: Duration,
        action: CallbackAction,
    ) -> CallbackId {
        let pending = Pending {
            owner,
            action: Some(action),
        };
        let id = match self.slots.iter().position(Option::is_none) {
            Some(free) => {
                self.slots[free] = Some(pending);
                free
            }
            None => {
                self.slots.push(Some(pending));
                self.slots.len() - 1
            }
        };

        let events = events.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            let _ = events.send(HubEvent::ExecuteCallback(id));
        });

        id
    }

    /// Free the slot and hand back its action, unless it was neutralized
    pub fn fire(&mut self, id: CallbackId) -> Option<CallbackAction> {
        self.slots.get_mut(id)?.take()?.action
    }

    /// Neutralize every pending callback owned by `owner`
    pub fn neutralize_owner(&mut self, owner: PeerId) -> usize {
        let mut count = 0;
        for pending in self.slots.iter_mut().flatten() {
            if pending.owner == Some(owner) && pending.action.is_some() {
                pending.action = None;
                count += 1;
            }
        }
        count
    }

    /// Slots still waiting for their timer
    pub fn pending(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lobby_network::hub_channel;

    #[tokio::test(start_paused = true)]
    async fn test_fires_through_hub_queue() {
        let (tx, mut rx) = hub_channel();
        let mut callbacks = Callbacks::new();
        let id = callbacks.schedule(
            &tx,
            None,
            Duration::from_secs(5),
            CallbackAction::Unblacklist("10.0.0.1".parse().unwrap()),
        );

        match rx.recv().await {
            Some(HubEvent::ExecuteCallback(fired)) => assert_eq!(fired, id),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(callbacks.fire(id), Some(CallbackAction::Unblacklist(_))));
        assert_eq!(callbacks.pending(), 0);
        assert!(callbacks.fire(id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_neutralized_slot_stays_taken_until_fired() {
        let (tx, _rx) = hub_channel();
        let mut callbacks = Callbacks::new();
        let owner = PeerId(7);

        let a = callbacks.schedule(&tx, Some(owner), Duration::from_secs(1), CallbackAction::IdleCheck(owner));
        let b = callbacks.schedule(&tx, None, Duration::from_secs(1), CallbackAction::IdleCheck(PeerId(8)));
        assert_eq!(callbacks.neutralize_owner(owner), 1);

        // The neutralized slot is not reused while its timer is pending
        let c = callbacks.schedule(&tx, None, Duration::from_secs(1), CallbackAction::IdleCheck(PeerId(9)));
        assert_ne!(c, a);
        assert_ne!(c, b);

        assert!(callbacks.fire(a).is_none());
        let d = callbacks.schedule(&tx, None, Duration::from_secs(1), CallbackAction::IdleCheck(PeerId(10)));
        assert_eq!(d, a);
        assert_eq!(callbacks.fire(b), Some(CallbackAction::IdleCheck(PeerId(8))));
    }
}
