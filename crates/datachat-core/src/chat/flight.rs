//! Single-flight cancellation controller.
//!
//! At most one turn is in flight per conversation service. Beginning a new
//! turn cancels the previous one's token, then waits until the previous turn
//! has released the stream slot, so two response streams are never open at
//! once. The last started turn always wins.

use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug)]
struct Flight {
    turn_id: Uuid,
    token: CancellationToken,
}

#[derive(Debug)]
pub struct FlightGuard {
    current: Mutex<Option<Flight>>,
    slot: Arc<Semaphore>,
}

/// A turn's claim on the guard.
///
/// Holds the stream slot until dropped. A ticket without the slot belongs to
/// a turn that was superseded before the previous turn let go.
#[derive(Debug)]
pub struct FlightTicket {
    token: CancellationToken,
    permit: Option<OwnedSemaphorePermit>,
}

impl FlightTicket {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn holds_slot(&self) -> bool {
        self.permit.is_some()
    }
}

impl Default for FlightGuard {
    fn default() -> Self {
        Self {
            current: Mutex::new(None),
            slot: Arc::new(Semaphore::new(1)),
        }
    }
}

impl FlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `turn_id` as the in-flight turn, cancelling any previous one,
    /// and wait for the previous turn to release the stream slot.
    ///
    /// Returns early without the slot if this turn is itself cancelled while
    /// waiting.
    pub async fn begin(&self, turn_id: Uuid) -> FlightTicket {
        let token = self.register(turn_id);
        let permit = tokio::select! {
            biased;
            permit = Arc::clone(&self.slot).acquire_owned() => permit.ok(),
            _ = token.cancelled() => None,
        };
        if permit.is_none() {
            tracing::debug!(%turn_id, "turn superseded before it could start");
        }
        FlightTicket { token, permit }
    }

    fn register(&self, turn_id: Uuid) -> CancellationToken {
        let mut current = self.current.lock().expect("flight guard lock poisoned");
        if let Some(previous) = current.take() {
            tracing::debug!(
                previous_turn = %previous.turn_id,
                %turn_id,
                "new turn supersedes in-flight turn"
            );
            previous.token.cancel();
        }
        let token = CancellationToken::new();
        *current = Some(Flight {
            turn_id,
            token: token.clone(),
        });
        token
    }

    /// Cancel the in-flight turn. Returns `false` if none was running.
    pub fn cancel(&self) -> bool {
        let flight = self
            .current
            .lock()
            .expect("flight guard lock poisoned")
            .take();
        match flight {
            Some(flight) => {
                flight.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Forget `turn_id` if it is still the registered turn. The stream slot
    /// is released when its ticket drops.
    pub fn finish(&self, turn_id: Uuid) {
        let mut current = self.current.lock().expect("flight guard lock poisoned");
        if current.as_ref().is_some_and(|f| f.turn_id == turn_id) {
            *current = None;
        }
    }

    /// Id of the turn currently in flight.
    pub fn in_flight(&self) -> Option<Uuid> {
        self.current
            .lock()
            .expect("flight guard lock poisoned")
            .as_ref()
            .map(|f| f.turn_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn begin_cancels_previous_turn() {
        let guard = Arc::new(FlightGuard::new());
        let first = guard.begin(Uuid::now_v7()).await;
        let second_id = Uuid::now_v7();
        let second = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move { guard.begin(second_id).await })
        };
        first.token().cancelled().await;
        drop(first);

        let second = second.await.unwrap();
        assert!(!second.token().is_cancelled());
        assert!(second.holds_slot());
        assert_eq!(guard.in_flight(), Some(second_id));
    }

    #[tokio::test]
    async fn begin_waits_for_previous_flight_to_release() {
        let guard = Arc::new(FlightGuard::new());
        let first = guard.begin(Uuid::now_v7()).await;
        assert!(first.holds_slot());

        let second = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move { guard.begin(Uuid::now_v7()).await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(first.token().is_cancelled());
        assert!(!second.is_finished());

        drop(first);
        assert!(second.await.unwrap().holds_slot());
    }

    #[tokio::test]
    async fn superseded_waiter_gives_up_without_slot() {
        let guard = Arc::new(FlightGuard::new());
        let first = guard.begin(Uuid::now_v7()).await;

        let second = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move { guard.begin(Uuid::now_v7()).await })
        };
        while !first.token().is_cancelled() {
            tokio::task::yield_now().await;
        }
        let third_id = Uuid::now_v7();
        let third = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move { guard.begin(third_id).await })
        };

        let second = second.await.unwrap();
        assert!(second.token().is_cancelled());
        assert!(!second.holds_slot());

        drop(first);
        let third = third.await.unwrap();
        assert!(third.holds_slot());
        assert_eq!(guard.in_flight(), Some(third_id));
    }

    #[test]
    fn cancel_without_flight_returns_false() {
        let guard = FlightGuard::new();
        assert!(!guard.cancel());
    }

    #[tokio::test]
    async fn cancel_fires_token_and_clears_slot() {
        let guard = FlightGuard::new();
        let ticket = guard.begin(Uuid::now_v7()).await;
        assert!(guard.cancel());
        assert!(ticket.token().is_cancelled());
        assert!(guard.in_flight().is_none());
    }

    #[tokio::test]
    async fn finish_only_forgets_own_turn() {
        let guard = FlightGuard::new();
        let old_id = Uuid::now_v7();
        drop(guard.begin(old_id).await);
        let new_id = Uuid::now_v7();
        let ticket = guard.begin(new_id).await;

        guard.finish(old_id);
        assert_eq!(guard.in_flight(), Some(new_id));

        guard.finish(new_id);
        assert!(guard.in_flight().is_none());
        assert!(!ticket.token().is_cancelled());
    }
}
