//! Seams to systems that live outside this service.
//!
//! The identity gateway, owner directory, push transport, and permit
//! registry are separate deployments; this module defines the traits the
//! orchestrator programs against plus the in-process implementations used
//! by local runs and tests.

use crate::models::{Principal, Role};
use async_trait::async_trait;
use axum::http::HeaderMap;
use common::types::OwnerId;
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Directory entry for a vehicle owner.
#[derive(Debug, Clone)]
pub struct OwnerProfile {
    pub display_name: String,
    pub vehicle_plate: String,

    /// Opaque push destinations (device tokens, webhook URLs).
    pub push_targets: Vec<String>,
}

/// Unmasked permit fields as returned by the permit registry.
#[derive(Debug, Clone)]
pub struct PermitSummary {
    pub resident: bool,
    pub maternity: bool,
    pub disabled: bool,
    pub sticker_no: Option<String>,
    pub building_unit: Option<String>,
    pub note: Option<String>,
}

/// Resolves the principal attached to a request, if any.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Option<Principal>;
}

/// Default resolver reading the gateway-injected `x-user-id` and
/// `x-user-role` headers. Absent or malformed headers mean an anonymous
/// request, not an error.
pub struct HeaderIdentityResolver;

impl IdentityResolver for HeaderIdentityResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<Principal> {
        let user_id = headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::from_str(s).ok())
            .map(OwnerId)?;

        let role = match headers.get("x-user-role").and_then(|v| v.to_str().ok()) {
            Some("admin") => Role::Admin,
            _ => Role::Public,
        };

        Some(Principal { user_id, role })
    }
}

/// Owner profile lookup.
#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    async fn profile(&self, owner_id: OwnerId) -> Option<OwnerProfile>;
}

/// In-memory directory backing local runs and tests.
#[derive(Default)]
pub struct InMemoryOwnerDirectory {
    profiles: RwLock<HashMap<OwnerId, OwnerProfile>>,
}

impl InMemoryOwnerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, owner_id: OwnerId, profile: OwnerProfile) {
        self.profiles.write().await.insert(owner_id, profile);
    }
}

#[async_trait]
impl OwnerDirectory for InMemoryOwnerDirectory {
    async fn profile(&self, owner_id: OwnerId) -> Option<OwnerProfile> {
        self.profiles.read().await.get(&owner_id).cloned()
    }
}

/// Best-effort owner notification. Implementations must not block the scan
/// path on transport latency beyond their own timeouts; failures are
/// reported via `Err` and swallowed by the caller.
#[async_trait]
pub trait OwnerNotifier: Send + Sync {
    async fn notify_call_request(
        &self,
        target: &str,
        owner_name: &str,
        correlation_id: &str,
    ) -> Result<(), String>;
}

/// Log-only notifier; the push transport is a separate deployment.
pub struct LogOnlyNotifier;

#[async_trait]
impl OwnerNotifier for LogOnlyNotifier {
    async fn notify_call_request(
        &self,
        target: &str,
        owner_name: &str,
        correlation_id: &str,
    ) -> Result<(), String> {
        info!(
            target: "cc.services.notify",
            push_target = target,
            owner_name,
            correlation_id,
            "Call request notification"
        );
        Ok(())
    }
}

/// Permit registry lookup used by the admin scan path.
#[async_trait]
pub trait PermitLookup: Send + Sync {
    async fn check(&self, owner_id: OwnerId) -> Option<PermitSummary>;
}

/// In-memory permit registry backing local runs and tests.
#[derive(Default)]
pub struct InMemoryPermitLookup {
    permits: RwLock<HashMap<OwnerId, PermitSummary>>,
}

impl InMemoryPermitLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, owner_id: OwnerId, summary: PermitSummary) {
        self.permits.write().await.insert(owner_id, summary);
    }
}

#[async_trait]
impl PermitLookup for InMemoryPermitLookup {
    async fn check(&self, owner_id: OwnerId) -> Option<PermitSummary> {
        let found = self.permits.read().await.get(&owner_id).cloned();
        if found.is_none() {
            warn!(
                target: "cc.services.permits",
                owner_id = %owner_id,
                "No permit record for owner"
            );
        }
        found
    }
}
