use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default dynamic tag lifetime.
const DEFAULT_TAG_TTL_SECONDS: i64 = 60;

/// Remaining-lifetime threshold at or below which a non-forced
/// issue-or-rotate call mints a fresh tag.
const DEFAULT_ROTATION_GUARD_SECONDS: i64 = 10;

/// Default call session lifetime.
const DEFAULT_SESSION_TTL_SECONDS: i64 = 300;

/// Default relay ticket lifetime.
const DEFAULT_TICKET_TTL_SECONDS: i64 = 60;

/// Default TURN credential lifetime.
const DEFAULT_TURN_TTL_SECONDS: i64 = 120;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    /// Base URL used when building the tag image URL returned by
    /// issue-or-rotate (e.g. behind a reverse proxy).
    pub public_base_url: String,
    pub tag_ttl_seconds: i64,
    pub rotation_guard_seconds: i64,
    pub session_ttl_seconds: i64,
    pub ticket_ttl_seconds: i64,
    pub stun_urls: Vec<String>,
    pub turn_urls: Vec<String>,
    /// coturn `static-auth-secret`. TURN entries are omitted from ICE
    /// config responses when this is unset.
    pub turn_rest_secret: Option<SecretString>,
    pub turn_ttl_seconds: i64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let public_base_url = vars
            .get("PUBLIC_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_default();

        let tag_ttl_seconds = parse_seconds(vars, "TAG_TTL_SECONDS", DEFAULT_TAG_TTL_SECONDS)?;
        let rotation_guard_seconds = parse_seconds(
            vars,
            "TAG_ROTATION_GUARD_SECONDS",
            DEFAULT_ROTATION_GUARD_SECONDS,
        )?;
        let session_ttl_seconds =
            parse_seconds(vars, "SESSION_TTL_SECONDS", DEFAULT_SESSION_TTL_SECONDS)?;
        let ticket_ttl_seconds =
            parse_seconds(vars, "TICKET_TTL_SECONDS", DEFAULT_TICKET_TTL_SECONDS)?;
        let turn_ttl_seconds = parse_seconds(vars, "TURN_TTL_SECONDS", DEFAULT_TURN_TTL_SECONDS)?;

        let stun_urls = parse_url_list(vars.get("STUN_URLS"));
        let turn_urls = parse_url_list(vars.get("TURN_URLS"));

        let turn_rest_secret = vars
            .get("TURN_REST_SECRET")
            .filter(|s| !s.trim().is_empty())
            .map(|s| SecretString::from(s.clone()));

        Ok(Config {
            bind_address,
            public_base_url,
            tag_ttl_seconds,
            rotation_guard_seconds,
            session_ttl_seconds,
            ticket_ttl_seconds,
            stun_urls,
            turn_urls,
            turn_rest_secret,
            turn_ttl_seconds,
        })
    }
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    name: &'static str,
    default: i64,
) -> Result<i64, ConfigError> {
    match vars.get(name) {
        None => Ok(default),
        Some(raw) => {
            let value: i64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(name, raw.clone()))?;
            if value <= 0 {
                return Err(ConfigError::InvalidValue(name, raw.clone()));
            }
            Ok(value)
        }
    }
}

/// Split a comma-separated URL list, dropping empty entries.
fn parse_url_list(raw: Option<&String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load");

        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.tag_ttl_seconds, 60);
        assert_eq!(config.rotation_guard_seconds, 10);
        assert_eq!(config.session_ttl_seconds, 300);
        assert_eq!(config.ticket_ttl_seconds, 60);
        assert_eq!(config.turn_ttl_seconds, 120);
        assert!(config.stun_urls.is_empty());
        assert!(config.turn_urls.is_empty());
        assert!(config.turn_rest_secret.is_none());
    }

    #[test]
    fn test_from_vars_custom_values() {
        let vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string()),
            ("TAG_TTL_SECONDS".to_string(), "90".to_string()),
            ("TAG_ROTATION_GUARD_SECONDS".to_string(), "15".to_string()),
            (
                "STUN_URLS".to_string(),
                "stun:stun.l.google.com:19302, stun:stun1.example.org".to_string(),
            ),
            (
                "TURN_URLS".to_string(),
                "turn:turn.example.org:3478?transport=udp,turns:turn.example.org:5349".to_string(),
            ),
            ("TURN_REST_SECRET".to_string(), "s3cret".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.tag_ttl_seconds, 90);
        assert_eq!(config.rotation_guard_seconds, 15);
        assert_eq!(config.stun_urls.len(), 2);
        assert_eq!(config.stun_urls[1], "stun:stun1.example.org");
        assert_eq!(config.turn_urls.len(), 2);
        assert_eq!(
            config.turn_rest_secret.unwrap().expose_secret(),
            "s3cret"
        );
    }

    #[test]
    fn test_from_vars_rejects_non_numeric_ttl() {
        let vars = HashMap::from([("TAG_TTL_SECONDS".to_string(), "soon".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(name, _)) if name == "TAG_TTL_SECONDS")
        );
    }

    #[test]
    fn test_from_vars_rejects_zero_ttl() {
        let vars = HashMap::from([("SESSION_TTL_SECONDS".to_string(), "0".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_, _))));
    }

    #[test]
    fn test_blank_turn_secret_treated_as_unset() {
        let vars = HashMap::from([("TURN_REST_SECRET".to_string(), "  ".to_string())]);

        let config = Config::from_vars(&vars).expect("Config should load");
        assert!(config.turn_rest_secret.is_none());
    }

    #[test]
    fn test_public_base_url_trailing_slash_stripped() {
        let vars = HashMap::from([(
            "PUBLIC_BASE_URL".to_string(),
            "https://tags.example.org/".to_string(),
        )]);

        let config = Config::from_vars(&vars).expect("Config should load");
        assert_eq!(config.public_base_url, "https://tags.example.org");
    }
}
