//! Dynamic tag issuance, rotation and validation.
//!
//! Tags are owned records kept in an in-memory arena: a map keyed by tag id,
//! a value index, and a per-owner pointer to the current tag. Durable
//! persistence and bulk reaping of expired rows are external concerns; this
//! store only guarantees correct behavior whether or not a sweep has run.
//!
//! Rotation is guarded by a per-owner monotonic version counter. Two
//! concurrent rotation requests for the same owner race on that counter;
//! the loser observes the bumped version and returns the winner's tag
//! instead of minting a second "current" tag.

use crate::errors::CcError;
use crate::models::{DynamicTag, TagValidationResponse};
use crate::observability::metrics;
use chrono::{DateTime, Duration, Utc};
use common::types::{OwnerId, TagId};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct TagArena {
    by_id: HashMap<TagId, DynamicTag>,
    by_value: HashMap<String, TagId>,
    current: HashMap<OwnerId, TagId>,
    /// Per-owner rotation counter; bumped on every successful rotation.
    versions: HashMap<OwnerId, u64>,
}

impl TagArena {
    fn current_tag(&self, owner_id: OwnerId) -> Option<&DynamicTag> {
        self.current
            .get(&owner_id)
            .and_then(|id| self.by_id.get(id))
    }

    fn version(&self, owner_id: OwnerId) -> u64 {
        self.versions.get(&owner_id).copied().unwrap_or(0)
    }
}

/// Owner of all [`DynamicTag`] records.
pub struct TagStore {
    ttl: Duration,
    rotation_guard: Duration,
    inner: RwLock<TagArena>,
}

impl TagStore {
    /// Create a store with the given tag TTL and rotation guard, both in
    /// seconds.
    pub fn new(ttl_seconds: i64, rotation_guard_seconds: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_seconds),
            rotation_guard: Duration::seconds(rotation_guard_seconds),
            inner: RwLock::new(TagArena::default()),
        }
    }

    /// Issue a tag for `owner_id`, rotating if needed.
    ///
    /// Returns the existing current tag when it is unexpired and its
    /// remaining lifetime exceeds the rotation guard (unless `force`).
    /// Otherwise mints a new tag with a fresh random value and full TTL.
    pub async fn issue_or_rotate(&self, owner_id: OwnerId, force: bool) -> DynamicTag {
        self.issue_or_rotate_at(owner_id, force, Utc::now()).await
    }

    /// Clock-explicit variant of [`Self::issue_or_rotate`].
    pub async fn issue_or_rotate_at(
        &self,
        owner_id: OwnerId,
        force: bool,
        now: DateTime<Utc>,
    ) -> DynamicTag {
        loop {
            // Fast path under the read lock: current tag still has enough
            // life left and the caller is not forcing.
            let observed_version = {
                let arena = self.inner.read().await;
                if !force {
                    if let Some(tag) = arena.current_tag(owner_id) {
                        if self.is_reusable(tag, now) {
                            metrics::record_tag_rotation("reused");
                            return tag.clone();
                        }
                    }
                }
                arena.version(owner_id)
            };

            let mut arena = self.inner.write().await;
            if arena.version(owner_id) != observed_version {
                // Lost the rotation race. If the winner's tag is fresh,
                // return it; otherwise it expired in the meantime and we
                // retry from the top.
                if let Some(tag) = arena.current_tag(owner_id) {
                    if self.is_reusable(tag, now) {
                        debug!(
                            target: "cc.services.tag_store",
                            owner_id = %owner_id,
                            tag_id = %tag.id,
                            "Rotation race lost, returning winner's tag"
                        );
                        metrics::record_tag_rotation("race_lost");
                        return tag.clone();
                    }
                }
                continue;
            }

            let tag = DynamicTag {
                id: TagId::new(),
                value: Uuid::new_v4().to_string(),
                owner_id,
                generated_at: now,
                expires_at: now + self.ttl,
                version: observed_version + 1,
            };

            arena.versions.insert(owner_id, tag.version);
            arena.by_value.insert(tag.value.clone(), tag.id);
            arena.current.insert(owner_id, tag.id);
            arena.by_id.insert(tag.id, tag.clone());

            debug!(
                target: "cc.services.tag_store",
                owner_id = %owner_id,
                tag_id = %tag.id,
                version = tag.version,
                force,
                "Tag rotated"
            );
            metrics::record_tag_rotation("rotated");
            return tag;
        }
    }

    /// Validate a scanned tag value.
    ///
    /// Unknown values are a `NOT_FOUND` failure; known-but-expired values
    /// produce `valid = false` with reason `EXPIRED` (the value existed, so
    /// the lookup itself did not fail).
    pub async fn validate(&self, value: &str) -> Result<TagValidationResponse, CcError> {
        self.validate_at(value, Utc::now()).await
    }

    /// Clock-explicit variant of [`Self::validate`].
    pub async fn validate_at(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<TagValidationResponse, CcError> {
        let arena = self.inner.read().await;
        let tag = arena
            .by_value
            .get(value)
            .and_then(|id| arena.by_id.get(id))
            .ok_or_else(|| CcError::NotFound("Unknown tag value".to_string()))?;

        if tag.is_expired_at(now) {
            return Ok(TagValidationResponse {
                valid: false,
                reason: Some("EXPIRED".to_string()),
                owner_id: Some(tag.owner_id),
                tag_id: Some(tag.id),
            });
        }

        Ok(TagValidationResponse {
            valid: true,
            reason: None,
            owner_id: Some(tag.owner_id),
            tag_id: Some(tag.id),
        })
    }

    /// Fetch a tag by id, failing with `GONE` when it exists but is expired.
    ///
    /// The `GONE`/`NOT_FOUND` distinction is load-bearing: an expired tag
    /// *existed*, and image renderers use the 410 to trigger a refresh
    /// rather than treating the tag as bogus.
    pub async fn get_or_gone(&self, tag_id: TagId) -> Result<DynamicTag, CcError> {
        self.get_or_gone_at(tag_id, Utc::now()).await
    }

    /// Clock-explicit variant of [`Self::get_or_gone`].
    pub async fn get_or_gone_at(
        &self,
        tag_id: TagId,
        now: DateTime<Utc>,
    ) -> Result<DynamicTag, CcError> {
        let arena = self.inner.read().await;
        let tag = arena
            .by_id
            .get(&tag_id)
            .ok_or_else(|| CcError::NotFound(format!("Tag {tag_id} does not exist")))?;

        if tag.is_expired_at(now) {
            return Err(CcError::Gone(format!("Tag {tag_id} has expired")));
        }

        Ok(tag.clone())
    }

    /// Resolve a live tag by its scanned value (call-start path).
    pub async fn lookup_live_by_value(&self, value: &str) -> Result<DynamicTag, CcError> {
        self.lookup_live_by_value_at(value, Utc::now()).await
    }

    /// Clock-explicit variant of [`Self::lookup_live_by_value`].
    pub async fn lookup_live_by_value_at(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<DynamicTag, CcError> {
        let arena = self.inner.read().await;
        let tag = arena
            .by_value
            .get(value)
            .and_then(|id| arena.by_id.get(id))
            .ok_or_else(|| CcError::NotFound("Unknown tag value".to_string()))?;

        if tag.is_expired_at(now) {
            return Err(CcError::Gone("Tag has expired".to_string()));
        }

        Ok(tag.clone())
    }

    fn is_reusable(&self, tag: &DynamicTag, now: DateTime<Utc>) -> bool {
        !tag.is_expired_at(now) && tag.expires_at - now > self.rotation_guard
    }
}
