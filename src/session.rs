//! Per-operator session store
//!
//! Process-lifetime only. Callers serialize access per operator (see
//! `runtime::Dispatcher`); the store itself only guards the map.

use crate::intake::{IntakeState, OperatorId, Step};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// An operator's in-progress intake
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub state: IntakeState,
    pub started_at: Instant,
    pub updated_at: Instant,
}

impl Session {
    fn new(now: Instant) -> Self {
        Self {
            state: IntakeState::AwaitingBatch,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn step(&self) -> Option<Step> {
        self.state.step()
    }

    fn is_expired(&self, ttl: Option<Duration>, now: Instant) -> bool {
        ttl.is_some_and(|ttl| now.saturating_duration_since(self.updated_at) >= ttl)
    }
}

/// Map from operator to session
pub struct SessionStore {
    sessions: RwLock<HashMap<OperatorId, Session>>,
    /// Sessions idle this long are dropped; `None` keeps them forever
    ttl: Option<Duration>,
}

impl SessionStore {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Current session, if any. An expired session is removed and reported absent.
    pub async fn get(&self, operator: OperatorId, now: Instant) -> Option<Session> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(&operator) {
                None => return None,
                Some(session) if !session.is_expired(self.ttl, now) => {
                    return Some(session.clone());
                }
                Some(_) => {}
            }
        }

        let mut sessions = self.sessions.write().await;
        // Re-check under the write lock; the session may have been replaced
        if sessions
            .get(&operator)
            .is_some_and(|s| s.is_expired(self.ttl, now))
        {
            sessions.remove(&operator);
            tracing::info!(%operator, "Session expired");
            return None;
        }
        sessions.get(&operator).cloned()
    }

    /// Start a fresh session, replacing any existing one
    pub async fn create(&self, operator: OperatorId, now: Instant) -> Session {
        let session = Session::new(now);
        let previous = self
            .sessions
            .write()
            .await
            .insert(operator, session.clone());

        if let Some(previous) = previous {
            tracing::info!(
                %operator,
                previous_step = ?previous.step(),
                "Replaced in-progress session"
            );
        }
        session
    }

    /// Store the state reached by a transition. Returns the now-current step,
    /// or `None` when the operator has no session to update.
    pub async fn update(
        &self,
        operator: OperatorId,
        state: IntakeState,
        now: Instant,
    ) -> Option<Step> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(&operator)?;
        session.state = state;
        session.updated_at = now;
        session.step()
    }

    /// Drop the operator's session, returning it if there was one
    pub async fn discard(&self, operator: OperatorId) -> Option<Session> {
        self.sessions.write().await.remove(&operator)
    }

    /// Remove every expired session; returns how many were removed
    pub async fn sweep_expired(&self, now: Instant) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(self.ttl, now));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    #[allow(dead_code)] // API completeness
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Sweep expired sessions every `period` until cancelled
pub async fn run_sweeper(store: Arc<SessionStore>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let removed = store.sweep_expired(Instant::now()).await;
                if removed > 0 {
                    let remaining = store.len().await;
                    tracing::info!(removed, remaining, "Swept expired sessions");
                }
            }
        }
    }
}
