//! Call session records and their state machine.
//!
//! Sessions are keyed by correlation id (the value both signaling peers use
//! as their room key). Expiry is discovered lazily: `get` on a session past
//! its deadline transitions it to `Failed` and reports it as absent, so the
//! registry behaves correctly whether or not an external sweep has deleted
//! the row.
//!
//! All transitions are fire-and-forget with respect to the relay: the relay
//! observes joins and drives `mark_waiting_peers`/`mark_connected`, and the
//! registry never blocks on relay state.

use crate::models::{CallSession, CallState};
use crate::observability::metrics;
use chrono::{DateTime, Duration, Utc};
use common::types::OwnerId;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Minimum session TTL regardless of configuration.
const MIN_SESSION_TTL_SECONDS: i64 = 60;

/// Owner of all [`CallSession`] records.
pub struct SessionRegistry {
    ttl: Duration,
    inner: RwLock<HashMap<String, CallSession>>,
}

impl SessionRegistry {
    /// Create a registry with the configured session TTL in seconds.
    /// A floor of 60 seconds is applied so peers always have time to
    /// complete a connection attempt.
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_seconds.max(MIN_SESSION_TTL_SECONDS)),
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new session in `Requested` state with a fresh correlation id.
    pub async fn create(
        &self,
        owner_id: OwnerId,
        caller_id: Option<OwnerId>,
        origin_tag_value: &str,
    ) -> CallSession {
        self.create_at(owner_id, caller_id, origin_tag_value, Utc::now())
            .await
    }

    /// Clock-explicit variant of [`Self::create`].
    pub async fn create_at(
        &self,
        owner_id: OwnerId,
        caller_id: Option<OwnerId>,
        origin_tag_value: &str,
        now: DateTime<Utc>,
    ) -> CallSession {
        let session = CallSession {
            correlation_id: Uuid::new_v4().to_string(),
            owner_id,
            caller_id,
            origin_tag_value: origin_tag_value.to_string(),
            state: CallState::Requested,
            started_at: now,
            ends_at: now + self.ttl,
            ended_at: None,
        };

        let mut sessions = self.inner.write().await;
        sessions.insert(session.correlation_id.clone(), session.clone());
        metrics::record_session_transition(CallState::Requested);

        debug!(
            target: "cc.services.sessions",
            correlation_id = %session.correlation_id,
            owner_id = %owner_id,
            "Call session created"
        );
        session
    }

    /// Reuse a live, non-terminal session for the same owner and origin tag
    /// if one exists (repeated scans of the same tag), else create one.
    pub async fn create_or_reuse(
        &self,
        owner_id: OwnerId,
        caller_id: Option<OwnerId>,
        origin_tag_value: &str,
    ) -> CallSession {
        self.create_or_reuse_at(owner_id, caller_id, origin_tag_value, Utc::now())
            .await
    }

    /// Clock-explicit variant of [`Self::create_or_reuse`].
    pub async fn create_or_reuse_at(
        &self,
        owner_id: OwnerId,
        caller_id: Option<OwnerId>,
        origin_tag_value: &str,
        now: DateTime<Utc>,
    ) -> CallSession {
        {
            let sessions = self.inner.read().await;
            if let Some(existing) = sessions.values().find(|s| {
                s.owner_id == owner_id
                    && s.origin_tag_value == origin_tag_value
                    && !s.state.is_terminal()
                    && s.ends_at > now
            }) {
                return existing.clone();
            }
        }
        self.create_at(owner_id, caller_id, origin_tag_value, now)
            .await
    }

    /// Fetch a session by correlation id.
    ///
    /// A session past its deadline is transitioned to `Failed`, stamped, and
    /// reported as absent.
    pub async fn get(&self, correlation_id: &str) -> Option<CallSession> {
        self.get_at(correlation_id, Utc::now()).await
    }

    /// Clock-explicit variant of [`Self::get`].
    pub async fn get_at(&self, correlation_id: &str, now: DateTime<Utc>) -> Option<CallSession> {
        let mut sessions = self.inner.write().await;
        let session = sessions.get_mut(correlation_id)?;

        if !session.state.is_terminal() && now > session.ends_at {
            session.state = CallState::Failed;
            session.ended_at = Some(now);
            metrics::record_session_transition(CallState::Failed);
            debug!(
                target: "cc.services.sessions",
                correlation_id,
                "Session expired lazily, marked failed"
            );
            return None;
        }

        Some(session.clone())
    }

    /// Record that the first signaling peer is waiting in the room.
    /// No-op for unknown or terminal sessions; idempotent.
    pub async fn mark_waiting_peers(&self, correlation_id: &str) {
        self.transition(correlation_id, CallState::WaitingPeers, &[CallState::Requested])
            .await;
    }

    /// Record that both signaling peers have joined.
    /// No-op for unknown or terminal sessions; idempotent.
    pub async fn mark_connected(&self, correlation_id: &str) {
        self.transition(
            correlation_id,
            CallState::Connected,
            &[CallState::Requested, CallState::WaitingPeers],
        )
        .await;
    }

    /// Terminate a session: `Ended` on a normal hang-up, `Failed` otherwise.
    ///
    /// Idempotent; ending an already-terminal session changes nothing and
    /// re-fires no side effects. Returns the (possibly unchanged) session,
    /// or `None` if the correlation id is unknown.
    pub async fn end(&self, correlation_id: &str, ok: bool) -> Option<CallSession> {
        self.end_at(correlation_id, ok, Utc::now()).await
    }

    /// Clock-explicit variant of [`Self::end`].
    pub async fn end_at(
        &self,
        correlation_id: &str,
        ok: bool,
        now: DateTime<Utc>,
    ) -> Option<CallSession> {
        let mut sessions = self.inner.write().await;
        let session = sessions.get_mut(correlation_id)?;

        if !session.state.is_terminal() {
            session.state = if ok { CallState::Ended } else { CallState::Failed };
            session.ended_at = Some(now);
            metrics::record_session_transition(session.state);
            debug!(
                target: "cc.services.sessions",
                correlation_id,
                state = session.state.as_str(),
                "Call session ended"
            );
        }

        Some(session.clone())
    }

    async fn transition(&self, correlation_id: &str, to: CallState, from: &[CallState]) {
        let mut sessions = self.inner.write().await;
        let Some(session) = sessions.get_mut(correlation_id) else {
            // Tolerated: the WebSocket join can race ahead of session
            // creation becoming visible.
            return;
        };

        if from.contains(&session.state) {
            session.state = to;
            metrics::record_session_transition(to);
            debug!(
                target: "cc.services.sessions",
                correlation_id,
                state = to.as_str(),
                "Call session transition"
            );
        }
    }
}
