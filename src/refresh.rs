use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::{ApiError, Result};
use crate::store::CredentialPair;

pub(crate) const REFRESH_PATH: &str = "auth/refresh/";

/// Body of `POST auth/refresh/`.
#[derive(Debug, Serialize)]
pub(crate) struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Token fields as the backend returns them: either flat, or nested under `tokens`
/// as the registration endpoint does.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TokenEnvelope {
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    refresh: Option<String>,
    #[serde(default)]
    tokens: Option<Box<TokenEnvelope>>,
}

impl TokenEnvelope {
    pub fn access(&self) -> Option<&str> {
        self.tokens
            .as_ref()
            .and_then(|t| t.access())
            .or(self.access.as_deref())
            .filter(|t| !t.is_empty())
    }

    pub fn refresh(&self) -> Option<&str> {
        self.tokens
            .as_ref()
            .and_then(|t| t.refresh())
            .or(self.refresh.as_deref())
            .filter(|t| !t.is_empty())
    }

    pub fn credentials(&self) -> Option<CredentialPair> {
        Some(CredentialPair::new(self.access()?, self.refresh()?))
    }
}

/// What one refresh wave hands to each of its waiters.
pub(crate) type RefreshOutcome = Result<String>;

#[derive(Default)]
struct WaveState {
    in_flight: bool,
    /// Bumped every time a wave settles.
    generation: u64,
    last: Option<RefreshOutcome>,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// Joining the current wave either makes the caller its leader, responsible
/// for running the exchange, or a follower that only waits.
pub(crate) struct Ticket {
    pub leader: bool,
    pub outcome: oneshot::Receiver<RefreshOutcome>,
}

pub(crate) enum Join {
    /// A wave settled after the rejected request read its token. Its outcome
    /// applies to this request too.
    Settled(RefreshOutcome),
    Wait(Ticket),
}

/// Single-flight gate for the refresh token exchange.
///
/// The lock covers the flag check-and-set, the queue and the generation; it is
/// never held across an await.
#[derive(Default)]
pub(crate) struct RefreshCoordinator {
    state: Mutex<WaveState>,
}

impl RefreshCoordinator {
    fn lock(&self) -> MutexGuard<'_, WaveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read before the access token a request is about to send.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Called after `stale` was rejected. `seen` is the generation read before
    /// `stale` was loaded from the store.
    pub fn join(&self, seen: u64, stale: Option<&str>) -> Join {
        let (tx, rx) = oneshot::channel();
        let mut state = self.lock();
        if state.generation != seen {
            match &state.last {
                // The newest token was rejected as well; it needs a wave of its own.
                Some(Ok(token)) if Some(token.as_str()) == stale => {}
                Some(outcome) => return Join::Settled(outcome.clone()),
                None => {}
            }
        }
        state.waiters.push(tx);
        let leader = !mem::replace(&mut state.in_flight, true);
        Join::Wait(Ticket { leader, outcome: rx })
    }

    /// End the current wave: clear the flag and settle every waiter with the same outcome.
    /// Returns how many waiters were still listening.
    pub fn settle(&self, outcome: &RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.lock();
            state.in_flight = false;
            state.generation += 1;
            state.last = Some(outcome.clone());
            mem::take(&mut state.waiters)
        };
        waiters
            .into_iter()
            .filter_map(|waiter| waiter.send(outcome.clone()).ok())
            .count()
    }

    pub fn in_flight(&self) -> bool {
        self.lock().in_flight
    }
}

/// Settles the wave with an error if the exchange task is torn down before it
/// settles normally, so waiters never hang on a dead wave.
pub(crate) struct WaveGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl<'a> WaveGuard<'a> {
    pub fn new(coordinator: &'a RefreshCoordinator) -> Self {
        Self { coordinator, settled: false }
    }

    pub fn settle(mut self, outcome: &RefreshOutcome) -> usize {
        self.settled = true;
        self.coordinator.settle(outcome)
    }
}

impl Drop for WaveGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let aborted = ApiError::SessionInvalid("token refresh was aborted".to_string());
            self.coordinator.settle(&Err(aborted));
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope(value: serde_json::Value) -> TokenEnvelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn accepts_flat_and_nested_shapes() {
        let flat = envelope(json!({"access": "A2"}));
        assert_eq!(flat.access(), Some("A2"));
        assert_eq!(flat.refresh(), None);

        let nested =
            envelope(json!({"user": {"id": 1}, "tokens": {"access": "A2", "refresh": "R2"}}));
        assert_eq!(nested.access(), Some("A2"));
        assert_eq!(nested.credentials(), Some(CredentialPair::new("A2", "R2")));
    }

    #[test]
    fn empty_tokens_count_as_missing() {
        let env = envelope(json!({"access": "", "refresh": "R1"}));
        assert_eq!(env.access(), None);
        assert_eq!(env.credentials(), None);
        assert_eq!(envelope(json!({"detail": "ok"})).access(), None);
    }

    #[test]
    fn refresh_request_body_shape() {
        let body = serde_json::to_value(RefreshRequest { refresh: "R1" }).unwrap();
        assert_eq!(body, json!({"refresh": "R1"}));
    }

    fn ticket(join: Join) -> Ticket {
        match join {
            Join::Wait(ticket) => ticket,
            Join::Settled(_) => panic!("expected to wait on a wave"),
        }
    }

    #[tokio::test]
    async fn first_joiner_leads_and_all_are_settled_together() {
        let coordinator = RefreshCoordinator::default();
        let first = ticket(coordinator.join(0, Some("A1")));
        let second = ticket(coordinator.join(0, Some("A1")));
        let third = ticket(coordinator.join(0, Some("A1")));
        assert!(first.leader);
        assert!(!second.leader && !third.leader);
        assert!(coordinator.in_flight());

        assert_eq!(coordinator.settle(&Ok("A2".to_string())), 3);
        assert!(!coordinator.in_flight());
        assert_eq!(coordinator.generation(), 1);
        for ticket in [first, second, third] {
            assert_eq!(ticket.outcome.await.unwrap().unwrap(), "A2");
        }
    }

    #[test]
    fn late_joiner_takes_the_settled_outcome() {
        let coordinator = RefreshCoordinator::default();
        let _leader = coordinator.join(0, Some("A1"));
        coordinator.settle(&Ok("A2".to_string()));

        match coordinator.join(0, Some("A1")) {
            Join::Settled(outcome) => assert_eq!(outcome.unwrap(), "A2"),
            Join::Wait(_) => panic!("a settled wave must not be joined again"),
        }
        assert!(!coordinator.in_flight());
    }

    #[test]
    fn rejected_replacement_starts_a_new_wave() {
        let coordinator = RefreshCoordinator::default();
        let _leader = coordinator.join(0, Some("A1"));
        coordinator.settle(&Ok("A2".to_string()));

        assert!(ticket(coordinator.join(0, Some("A2"))).leader);
        assert!(!ticket(coordinator.join(1, Some("A2"))).leader);
    }

    #[test]
    fn late_joiner_after_failure_sees_the_failure() {
        let coordinator = RefreshCoordinator::default();
        let _leader = coordinator.join(0, Some("A1"));
        coordinator.settle(&Err(ApiError::SessionInvalid("rejected".into())));

        match coordinator.join(0, Some("A1")) {
            Join::Settled(outcome) => assert!(outcome.unwrap_err().is_session_invalid()),
            Join::Wait(_) => panic!("a settled wave must not be joined again"),
        }
    }

    #[tokio::test]
    async fn abandoned_waiters_do_not_block_settlement() {
        let coordinator = RefreshCoordinator::default();
        let leader = ticket(coordinator.join(0, None));
        drop(coordinator.join(0, None));

        assert_eq!(coordinator.settle(&Err(ApiError::SessionInvalid("rejected".into()))), 1);
        assert!(leader.outcome.await.unwrap().unwrap_err().is_session_invalid());
    }

    #[tokio::test]
    async fn dropped_guard_fails_the_wave() {
        let coordinator = RefreshCoordinator::default();
        let waiter = ticket(coordinator.join(0, None));
        drop(WaveGuard::new(&coordinator));

        assert!(!coordinator.in_flight());
        assert!(waiter.outcome.await.unwrap().unwrap_err().is_session_invalid());
    }
}
