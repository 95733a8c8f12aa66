//! Tag issuance, image rendering, validation, and the scan view.

use crate::errors::CcError;
use crate::models::{IssueOrRotateResponse, ScanResponse, TagValidationResponse};
use crate::routes::AppState;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use common::types::TagId;
use qrcode::{render::svg, QrCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Query parameters for `POST /api/tags/issue-or-rotate`.
#[derive(Debug, Deserialize)]
pub struct IssueOrRotateParams {
    pub owner_id: Uuid,

    #[serde(default)]
    pub force: bool,
}

/// `POST /api/tags/issue-or-rotate?owner_id=&force=`
///
/// Returns the owner's current tag, rotating it when it is expired, inside
/// the rotation guard window, or when `force` is set.
#[instrument(skip_all, name = "cc.tags.issue_or_rotate", fields(owner_id = %params.owner_id, force = params.force))]
pub async fn issue_or_rotate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IssueOrRotateParams>,
) -> Json<IssueOrRotateResponse> {
    let now = Utc::now();
    let tag = state
        .tags
        .issue_or_rotate_at(common::types::OwnerId(params.owner_id), params.force, now)
        .await;

    Json(IssueOrRotateResponse {
        tag_id: tag.id,
        image_url: format!(
            "{}/api/tags/{}/image",
            state.config.public_base_url, tag.id
        ),
        expires_at: tag.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ttl_seconds: tag.ttl_seconds_at(now),
    })
}

/// `GET /api/tags/{tag_id}/image`
///
/// Renders the tag value as an SVG QR code. Responses must never be
/// cached: the tag rotates underneath the URL. Expired tags answer `410`
/// so renderers refresh instead of treating the tag as bogus.
#[instrument(skip_all, name = "cc.tags.image", fields(tag_id = %tag_id))]
pub async fn tag_image(
    State(state): State<Arc<AppState>>,
    Path(tag_id): Path<Uuid>,
) -> Result<Response, CcError> {
    let now = Utc::now();
    let tag = state.tags.get_or_gone_at(TagId(tag_id), now).await?;

    let code = QrCode::new(tag.value.as_bytes())
        .map_err(|e| CcError::Internal(format!("QR encoding failed: {e}")))?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(240, 240)
        .quiet_zone(true)
        .build();

    let headers = [
        ("content-type", "image/svg+xml".to_string()),
        ("cache-control", "no-store, must-revalidate".to_string()),
        ("pragma", "no-cache".to_string()),
        (
            "expires-at",
            tag.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
        ("x-tag-ttl", tag.ttl_seconds_at(now).to_string()),
    ];

    Ok((headers, image).into_response())
}

/// `GET /api/tags/by-value/{value}`
///
/// Validation for scanned values. Unknown values are 404; known-but-
/// expired values are a 200 with `valid: false`.
#[instrument(skip_all, name = "cc.tags.validate")]
pub async fn validate_by_value(
    State(state): State<Arc<AppState>>,
    Path(value): Path<String>,
) -> Result<Json<TagValidationResponse>, CcError> {
    Ok(Json(state.tags.validate(&value).await?))
}

/// `GET /api/tags/{tag_id}/view`
///
/// The scan endpoint: public viewers get relay tickets and a call session,
/// admins get masked permit fields.
#[instrument(skip_all, name = "cc.tags.view", fields(tag_id = %tag_id))]
pub async fn view_tag(
    State(state): State<Arc<AppState>>,
    Path(tag_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ScanResponse>, CcError> {
    let principal = state.identity.resolve(&headers);
    let response = state.orchestrator.view(TagId(tag_id), principal).await?;
    Ok(Json(response))
}
