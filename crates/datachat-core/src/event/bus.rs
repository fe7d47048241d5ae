//! Broadcast bus carrying per-turn progress.
//!
//! Every update is wrapped in a `TurnProgress` envelope naming the turn and
//! session it belongs to, so observers can tell a superseded turn's final
//! updates apart from the turn that replaced it. Built on
//! `tokio::sync::broadcast`; publishing never waits on a slow or absent UI.

use datachat_types::progress::{TurnProgress, TurnUpdate};
use tokio::sync::broadcast;
use uuid::Uuid;

pub struct ProgressBus {
    sender: broadcast::Sender<TurnProgress>,
}

impl ProgressBus {
    /// `capacity` bounds how far a subscriber may fall behind before it
    /// starts losing the oldest updates.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive updates of every turn published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TurnProgress> {
        self.sender.subscribe()
    }

    /// Publish `update` for `turn_id` in `session_id`. Returns how many
    /// subscribers it reached.
    pub fn publish(&self, turn_id: Uuid, session_id: &str, update: TurnUpdate) -> usize {
        let terminal = update.is_terminal();
        let progress = TurnProgress {
            turn_id,
            session_id: session_id.to_string(),
            update,
        };
        match self.sender.send(progress) {
            Ok(reached) => reached,
            Err(_) => {
                if terminal {
                    tracing::trace!(%turn_id, "turn ended with no progress subscribers");
                }
                0
            }
        }
    }
}

impl std::fmt::Debug for ProgressBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
