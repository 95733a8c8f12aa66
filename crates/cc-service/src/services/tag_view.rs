//! Scan-time orchestration.
//!
//! A scan resolves the tag, decides the viewer's mode from the resolved
//! principal, and assembles everything the client needs next: relay tickets
//! and a call session for public viewers, masked permit fields for admins.
//! Owner notification is best effort; a push failure never fails the scan.

use crate::errors::CcError;
use crate::models::{
    AdminInfo, Principal, RelayInfo, Role, ScanResponse, TicketPurpose,
};
use crate::observability::metrics;
use crate::services::collaborators::{OwnerDirectory, OwnerNotifier, OwnerProfile, PermitLookup};
use crate::services::session_registry::SessionRegistry;
use crate::services::tag_store::TagStore;
use crate::services::ticket_issuer::TicketIssuer;
use chrono::{DateTime, Utc};
use common::types::{OwnerId, TagId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Assembles scan responses for `GET /api/tags/{tag_id}/view`.
pub struct TagViewOrchestrator {
    tags: Arc<TagStore>,
    sessions: Arc<SessionRegistry>,
    tickets: Arc<TicketIssuer>,
    directory: Arc<dyn OwnerDirectory>,
    notifier: Arc<dyn OwnerNotifier>,
    permits: Arc<dyn PermitLookup>,
}

impl TagViewOrchestrator {
    pub fn new(
        tags: Arc<TagStore>,
        sessions: Arc<SessionRegistry>,
        tickets: Arc<TicketIssuer>,
        directory: Arc<dyn OwnerDirectory>,
        notifier: Arc<dyn OwnerNotifier>,
        permits: Arc<dyn PermitLookup>,
    ) -> Self {
        Self {
            tags,
            sessions,
            tickets,
            directory,
            notifier,
            permits,
        }
    }

    /// Handle a scan of `tag_id` by `principal` (or an anonymous viewer).
    pub async fn view(
        &self,
        tag_id: TagId,
        principal: Option<Principal>,
    ) -> Result<ScanResponse, CcError> {
        self.view_at(tag_id, principal, Utc::now()).await
    }

    /// Clock-explicit variant of [`Self::view`].
    pub async fn view_at(
        &self,
        tag_id: TagId,
        principal: Option<Principal>,
        now: DateTime<Utc>,
    ) -> Result<ScanResponse, CcError> {
        let tag = self.tags.get_or_gone_at(tag_id, now).await?;
        let profile = self.directory.profile(tag.owner_id).await;
        let vehicle_mask = profile
            .as_ref()
            .map(|p| mask_plate(&p.vehicle_plate))
            .unwrap_or_else(|| "***".to_string());

        if matches!(principal, Some(Principal { role: Role::Admin, .. })) {
            metrics::record_scan("admin");
            let admin = self.admin_section(&tag.owner_id, &profile).await;
            return Ok(ScanResponse {
                mode: "admin".to_string(),
                tag_id,
                valid: true,
                vehicle_mask,
                relay: None,
                admin: Some(admin),
            });
        }

        metrics::record_scan("public");
        let session = self
            .sessions
            .create_or_reuse_at(
                tag.owner_id,
                principal.map(|p| p.user_id),
                &tag.value,
                now,
            )
            .await;

        let call_ticket = self
            .tickets
            .issue_at(tag_id, TicketPurpose::Call, now)
            .await;
        let msg_ticket = self
            .tickets
            .issue_at(tag_id, TicketPurpose::Message, now)
            .await;

        if let Some(profile) = profile.as_ref() {
            self.notify_owner(profile, &session.correlation_id).await;
        }

        Ok(ScanResponse {
            mode: "public".to_string(),
            tag_id,
            valid: true,
            vehicle_mask,
            relay: Some(RelayInfo {
                ttl_sec: call_ticket.ttl_seconds_remaining_at(now),
                call_ticket: call_ticket.token,
                msg_ticket: msg_ticket.token,
                session_id: session.correlation_id,
            }),
            admin: None,
        })
    }

    /// Best-effort notification of `owner_id`'s push targets (call-start
    /// path). Failures are logged and swallowed.
    pub async fn notify_owner_of(&self, owner_id: OwnerId, correlation_id: &str) {
        if let Some(profile) = self.directory.profile(owner_id).await {
            self.notify_owner(&profile, correlation_id).await;
        }
    }

    async fn admin_section(
        &self,
        owner_id: &OwnerId,
        profile: &Option<OwnerProfile>,
    ) -> AdminInfo {
        let owner_mask = profile.as_ref().map(|p| mask_name(&p.display_name));

        match self.permits.check(*owner_id).await {
            Some(permit) => AdminInfo {
                resident: permit.resident,
                maternity: permit.maternity,
                disabled: permit.disabled,
                sticker_no_masked: permit.sticker_no.as_deref().map(mask_sticker),
                owner_mask,
                building_unit_mask: permit
                    .building_unit
                    .as_deref()
                    .map(mask_building_unit),
                note: permit.note.clone(),
            },
            None => AdminInfo {
                resident: false,
                maternity: false,
                disabled: false,
                sticker_no_masked: None,
                owner_mask,
                building_unit_mask: None,
                note: None,
            },
        }
    }

    async fn notify_owner(&self, profile: &OwnerProfile, correlation_id: &str) {
        for target in &profile.push_targets {
            match self
                .notifier
                .notify_call_request(target, &profile.display_name, correlation_id)
                .await
            {
                Ok(()) => debug!(
                    target: "cc.services.tag_view",
                    correlation_id,
                    "Owner notified"
                ),
                Err(error) => warn!(
                    target: "cc.services.tag_view",
                    correlation_id,
                    error,
                    "Owner notification failed"
                ),
            }
        }
    }
}

/// Keep up to the first four characters of a plate, star the rest.
pub fn mask_plate(plate: &str) -> String {
    let kept: String = plate.chars().take(4).collect();
    format!("{kept}***")
}

/// Keep the first character of a name, star the second.
pub fn mask_name(name: &str) -> String {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(_)) => {
            let rest: String = chars.collect();
            format!("{first}*{rest}")
        }
        (Some(first), None) => first.to_string(),
        (None, _) => String::new(),
    }
}

/// Star the digits of a building/unit designation, keeping separators and
/// non-numeric labels readable.
pub fn mask_building_unit(unit: &str) -> String {
    unit.chars()
        .map(|c| if c.is_ascii_digit() { '*' } else { c })
        .collect()
}

/// Star the last three characters of a sticker number.
pub fn mask_sticker(sticker: &str) -> String {
    let total = sticker.chars().count();
    let kept = total.saturating_sub(3);
    sticker
        .chars()
        .enumerate()
        .map(|(i, c)| if i < kept { c } else { '*' })
        .collect()
}
