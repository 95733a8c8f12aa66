//! Call session lifecycle endpoints.

use crate::errors::CcError;
use crate::models::{CallEndRequest, CallStartRequest, CallStartResponse};
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;

/// `POST /api/calls/start`
///
/// Resolves the scanned tag value to its owner, creates (or reuses) a call
/// session, and kicks off the best-effort owner notification.
#[instrument(skip_all, name = "cc.calls.start")]
pub async fn start_call(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CallStartRequest>,
) -> Result<Json<CallStartResponse>, CcError> {
    request
        .validate()
        .map_err(|msg| CcError::BadRequest(msg.to_string()))?;

    let now = Utc::now();
    let tag = state
        .tags
        .lookup_live_by_value_at(&request.tag_value, now)
        .await?;

    let session = state
        .sessions
        .create_or_reuse_at(tag.owner_id, request.caller_id, &tag.value, now)
        .await;

    state
        .orchestrator
        .notify_owner_of(tag.owner_id, &session.correlation_id)
        .await;

    Ok(Json(CallStartResponse {
        ttl_seconds: session.ttl_seconds_at(now),
        session_id: session.correlation_id,
    }))
}

/// `POST /api/calls/{session_id}/end`
///
/// Terminates a session: `ok: true` (the default, body optional) ends it
/// normally, `ok: false` marks it failed. Idempotent; 404 for unknown
/// correlation ids.
#[instrument(skip_all, name = "cc.calls.end", fields(session_id = %session_id))]
pub async fn end_call(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    body: axum::body::Bytes,
) -> Result<StatusCode, CcError> {
    // Deserialize manually: an absent body defaults to a normal end, but a
    // present, malformed one is a 400 rather than being silently accepted.
    let ok = if body.is_empty() {
        true
    } else {
        let request: CallEndRequest = serde_json::from_slice(&body).map_err(|e| {
            tracing::debug!(target: "cc.handlers.calls", error = %e, "Invalid request body");
            CcError::BadRequest("Invalid request body".to_string())
        })?;
        request.ok
    };

    state
        .sessions
        .end(&session_id, ok)
        .await
        .ok_or_else(|| CcError::NotFound(format!("Unknown call session {session_id}")))?;

    Ok(StatusCode::NO_CONTENT)
}
