//! Short-lived, purpose-scoped relay tickets.
//!
//! Tickets authorize a single follow-up action (call or message) against a
//! tag. The store is process-local and non-durable on purpose: losing
//! tickets on restart is acceptable, promoting them to durable storage is
//! not a requirement. Verification is re-checkable within the TTL; it does
//! not consume the ticket.

use crate::errors::CcError;
use crate::models::TicketPurpose;
use crate::observability::metrics;
use chrono::{DateTime, Duration, Utc};
use common::types::TagId;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A minted ticket handed to a client.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub token: String,
    pub tag_id: TagId,
    pub purpose: TicketPurpose,
    pub expires_at: DateTime<Utc>,
}

impl Ticket {
    /// Remaining lifetime in whole seconds at `now`, clamped at zero.
    pub fn ttl_seconds_remaining_at(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

#[derive(Debug, Clone)]
struct StoredTicket {
    tag_id: TagId,
    purpose: TicketPurpose,
    expires_at: DateTime<Utc>,
}

/// Mints and verifies relay tickets.
pub struct TicketIssuer {
    ttl: Duration,
    store: RwLock<HashMap<String, StoredTicket>>,
}

impl TicketIssuer {
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_seconds),
            store: RwLock::new(HashMap::new()),
        }
    }

    /// Mint a ticket scoped to `tag_id` and `purpose`.
    pub async fn issue(&self, tag_id: TagId, purpose: TicketPurpose) -> Ticket {
        self.issue_at(tag_id, purpose, Utc::now()).await
    }

    /// Clock-explicit variant of [`Self::issue`].
    pub async fn issue_at(
        &self,
        tag_id: TagId,
        purpose: TicketPurpose,
        now: DateTime<Utc>,
    ) -> Ticket {
        let token = format!("{}.{}.{}", purpose.as_str(), tag_id, Uuid::new_v4());
        let expires_at = now + self.ttl;

        let mut store = self.store.write().await;
        store.insert(
            token.clone(),
            StoredTicket {
                tag_id,
                purpose,
                expires_at,
            },
        );

        Ticket {
            token,
            tag_id,
            purpose,
            expires_at,
        }
    }

    /// Verify a ticket against the expected purpose, returning the tag it
    /// was issued for.
    ///
    /// Fails `INVALID_TICKET` for unknown tokens, `TICKET_EXPIRED` (and
    /// evicts) past TTL, and `PURPOSE_MISMATCH` when the encoded purpose
    /// does not match.
    pub async fn verify(
        &self,
        token: &str,
        expected_purpose: TicketPurpose,
    ) -> Result<TagId, CcError> {
        self.verify_at(token, expected_purpose, Utc::now()).await
    }

    /// Clock-explicit variant of [`Self::verify`].
    pub async fn verify_at(
        &self,
        token: &str,
        expected_purpose: TicketPurpose,
        now: DateTime<Utc>,
    ) -> Result<TagId, CcError> {
        let mut store = self.store.write().await;
        let Some(stored) = store.get(token).cloned() else {
            metrics::record_ticket_verification("invalid");
            return Err(CcError::InvalidTicket);
        };

        if now > stored.expires_at {
            store.remove(token);
            metrics::record_ticket_verification("expired");
            return Err(CcError::TicketExpired);
        }

        if stored.purpose != expected_purpose {
            metrics::record_ticket_verification("purpose_mismatch");
            return Err(CcError::PurposeMismatch);
        }

        metrics::record_ticket_verification("ok");
        Ok(stored.tag_id)
    }
}
