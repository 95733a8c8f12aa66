//! Ticket verification boundary for the follow-up call/message services.

use crate::errors::CcError;
use crate::models::{VerifyTicketRequest, VerifyTicketResponse};
use crate::routes::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::instrument;

/// `POST /api/relay/verify-ticket`
///
/// Verifies a relay ticket without consuming it and returns the tag it
/// was issued for.
#[instrument(skip_all, name = "cc.relay.verify_ticket")]
pub async fn verify_ticket(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyTicketRequest>,
) -> Result<Json<VerifyTicketResponse>, CcError> {
    let tag_id = state.tickets.verify(&request.token, request.purpose).await?;
    Ok(Json(VerifyTicketResponse { tag_id }))
}
