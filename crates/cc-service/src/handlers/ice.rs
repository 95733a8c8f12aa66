//! ICE server configuration endpoint.

use crate::models::IceConfigResponse;
use crate::routes::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

/// Query parameters for `GET /api/ice-config`.
#[derive(Debug, Deserialize)]
pub struct IceConfigParams {
    /// Requested credential TTL in seconds; floored server-side.
    pub ttl: Option<i64>,
}

/// `GET /api/ice-config?ttl=`
///
/// STUN servers always; TURN servers with time-boxed credentials when a
/// TURN REST secret is configured.
#[instrument(skip_all, name = "cc.ice.config")]
pub async fn get_ice_config(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IceConfigParams>,
) -> Json<IceConfigResponse> {
    Json(state.credentials.issue(params.ttl))
}
