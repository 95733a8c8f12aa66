//! Curbcall data models.
//!
//! Owned records (tags, call sessions) reference one another by identifier
//! only; there is no object graph to navigate. Wire DTOs live here too so
//! handlers stay thin.

use chrono::{DateTime, Utc};
use common::types::{OwnerId, TagId};
use serde::{Deserialize, Serialize};

/// Call session state machine.
///
/// `REQUESTED → WAITING_PEERS → CONNECTED → {ENDED, FAILED}`.
/// `Ended` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// Session created; no signaling peer has joined yet.
    Requested,

    /// One peer is in the signaling room, waiting for the other.
    WaitingPeers,

    /// Both peers joined the signaling room.
    Connected,

    /// Call ended normally.
    Ended,

    /// Call failed or timed out.
    Failed,
}

impl CallState {
    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Requested => "requested",
            CallState::WaitingPeers => "waiting_peers",
            CallState::Connected => "connected",
            CallState::Ended => "ended",
            CallState::Failed => "failed",
        }
    }

    /// Terminal states are immutable apart from the `ended_at` stamp.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Ended | CallState::Failed)
    }
}

/// A rotating, short-lived identifier standing in for a vehicle owner.
///
/// Replaced (never edited) on rotation; historical tags stay queryable
/// until reaped but are never revived.
#[derive(Debug, Clone)]
pub struct DynamicTag {
    pub id: TagId,

    /// Opaque random value encoded into the QR image.
    pub value: String,

    pub owner_id: OwnerId,

    pub generated_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,

    /// Per-owner monotonic rotation counter, used for the optimistic
    /// concurrency check during rotation.
    pub version: u64,
}

impl DynamicTag {
    /// Whether the tag is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Remaining lifetime in whole seconds at `now`, clamped at zero.
    pub fn ttl_seconds_at(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// One call attempt, tracked from request through termination.
///
/// `correlation_id` is the value both signaling peers share as their room
/// key. `ends_at` is fixed at creation and never extended implicitly.
#[derive(Debug, Clone)]
pub struct CallSession {
    pub correlation_id: String,

    pub owner_id: OwnerId,

    /// Caller reference; `None` for anonymous visitors.
    pub caller_id: Option<OwnerId>,

    /// Value of the tag that originated this session.
    pub origin_tag_value: String,

    pub state: CallState,

    pub started_at: DateTime<Utc>,

    /// TTL deadline; past this instant the session lazily fails.
    pub ends_at: DateTime<Utc>,

    pub ended_at: Option<DateTime<Utc>>,
}

impl CallSession {
    /// Remaining lifetime in whole seconds at `now`, clamped at zero.
    pub fn ttl_seconds_at(&self, now: DateTime<Utc>) -> i64 {
        (self.ends_at - now).num_seconds().max(0)
    }
}

/// Relay ticket purpose scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPurpose {
    Call,
    Message,
}

impl TicketPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPurpose::Call => "call",
            TicketPurpose::Message => "message",
        }
    }
}

impl std::str::FromStr for TicketPurpose {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "call" => Ok(TicketPurpose::Call),
            "message" => Ok(TicketPurpose::Message),
            _ => Err(()),
        }
    }
}

/// Caller role as resolved by the external identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Public,
    Admin,
}

/// An authenticated (or anonymous) principal attached to a request.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub user_id: OwnerId,
    pub role: Role,
}

// ============================================================================
// Wire DTOs
// ============================================================================

/// Response for `POST /api/tags/issue-or-rotate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueOrRotateResponse {
    pub tag_id: TagId,

    /// Relative (or absolute, when a public base URL is configured) URL of
    /// the tag image endpoint.
    pub image_url: String,

    /// Absolute expiry instant, ISO-8601 UTC.
    pub expires_at: String,

    pub ttl_seconds: i64,
}

/// Response for `GET /api/tags/by-value/{value}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagValidationResponse {
    pub valid: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<OwnerId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<TagId>,
}

/// Relay section of a public scan response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayInfo {
    pub call_ticket: String,
    pub msg_ticket: String,
    pub ttl_sec: i64,
    pub session_id: String,
}

/// Masked permit section of an admin scan response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminInfo {
    pub resident: bool,
    pub maternity: bool,
    pub disabled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticker_no_masked: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_mask: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub building_unit_mask: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Response for `GET /api/tags/{tag_id}/view`.
///
/// `mode` is `"public"` or `"admin"`; exactly one of `relay`/`admin` is
/// present accordingly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub mode: String,
    pub tag_id: TagId,
    pub valid: bool,
    pub vehicle_mask: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay: Option<RelayInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<AdminInfo>,
}

/// Request body for `POST /api/calls/start`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CallStartRequest {
    pub tag_value: String,

    #[serde(default)]
    pub caller_id: Option<OwnerId>,
}

impl CallStartRequest {
    /// Validate the request.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.tag_value.trim().is_empty() {
            return Err("tagValue is required");
        }
        Ok(())
    }
}

/// Response for `POST /api/calls/start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStartResponse {
    pub session_id: String,
    pub ttl_seconds: i64,
}

/// Request body for `POST /api/calls/{session_id}/end`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CallEndRequest {
    /// `true` for a normal hang-up, `false` for an aborted/failed call.
    #[serde(default = "default_true")]
    pub ok: bool,
}

fn default_true() -> bool {
    true
}

/// Request body for `POST /api/relay/verify-ticket`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VerifyTicketRequest {
    pub token: String,
    pub purpose: TicketPurpose,
}

/// Response for `POST /api/relay/verify-ticket`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTicketResponse {
    pub tag_id: TagId,
}

/// One entry of an RTCIceServer list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// Response for `GET /api/ice-config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceConfigResponse {
    pub ice_servers: Vec<IceServer>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

/// Signaling envelope exchanged over `/ws/signaling`.
///
/// `sdp` and `candidate` are opaque to the relay; they are forwarded
/// verbatim and never inspected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEnvelope {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(rename = "sessionId")]
    pub session_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<serde_json::Value>,
}
