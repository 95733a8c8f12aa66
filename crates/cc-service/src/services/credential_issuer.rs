//! Time-boxed ICE server credentials.
//!
//! Implements the coturn `use-auth-secret` REST scheme: the username embeds
//! the expiry epoch, and the credential is `base64(HMAC-SHA1(secret,
//! username))`. Credentials are never stored; they are deterministically
//! recomputable from the shared secret and the username, and the TURN
//! server validates them the same way.

use crate::models::{IceConfigResponse, IceServer};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use common::secret::{ExposeSecret, SecretString};
use ring::hmac;

/// Fixed label appended to the expiry in derived usernames.
const TURN_USERNAME_LABEL: &str = "curbcall";

/// Floor for the effective credential TTL. Clients must never be handed
/// credentials that can expire mid connection attempt.
const MIN_CREDENTIAL_TTL_SECONDS: i64 = 60;

/// Issues ICE server descriptors, optionally with TURN credentials.
pub struct CredentialIssuer {
    stun_urls: Vec<String>,
    turn_urls: Vec<String>,
    turn_secret: Option<SecretString>,
    default_ttl_seconds: i64,
}

impl CredentialIssuer {
    pub fn new(
        stun_urls: Vec<String>,
        turn_urls: Vec<String>,
        turn_secret: Option<SecretString>,
        default_ttl_seconds: i64,
    ) -> Self {
        Self {
            stun_urls,
            turn_urls,
            turn_secret,
            default_ttl_seconds,
        }
    }

    /// Issue an ICE configuration.
    ///
    /// STUN URLs are always included verbatim. TURN entries appear only
    /// when both a REST secret and at least one TURN URL are configured;
    /// their absence is not an error.
    pub fn issue(&self, ttl_override: Option<i64>) -> IceConfigResponse {
        self.issue_at(ttl_override, Utc::now())
    }

    /// Clock-explicit variant of [`Self::issue`].
    pub fn issue_at(&self, ttl_override: Option<i64>, now: DateTime<Utc>) -> IceConfigResponse {
        let mut ice_servers: Vec<IceServer> = self
            .stun_urls
            .iter()
            .map(|url| IceServer {
                urls: vec![url.clone()],
                username: None,
                credential: None,
            })
            .collect();

        let requested = ttl_override
            .filter(|ttl| *ttl > 0)
            .unwrap_or(self.default_ttl_seconds);
        let effective_ttl = requested.max(MIN_CREDENTIAL_TTL_SECONDS);

        let mut username = None;
        let mut credential = None;
        let mut ttl = None;

        if let Some(secret) = self.turn_secret.as_ref() {
            if !self.turn_urls.is_empty() {
                let expiry = now.timestamp() + effective_ttl;
                let user = format!("{expiry}:{TURN_USERNAME_LABEL}");
                let cred = hmac_sha1_base64(secret, &user);

                ice_servers.push(IceServer {
                    urls: self.turn_urls.clone(),
                    username: Some(user.clone()),
                    credential: Some(cred.clone()),
                });

                username = Some(user);
                credential = Some(cred);
                ttl = Some(effective_ttl);
            }
        }

        IceConfigResponse {
            ice_servers,
            username,
            credential,
            ttl,
        }
    }
}

/// `base64(HMAC-SHA1(secret, message))` per the coturn REST credential
/// scheme. SHA-1 here is a protocol requirement, not a choice.
fn hmac_sha1_base64(secret: &SecretString, message: &str) -> String {
    let key = hmac::Key::new(
        hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
        secret.expose_secret().as_bytes(),
    );
    let tag = hmac::sign(&key, message.as_bytes());
    BASE64.encode(tag.as_ref())
}
