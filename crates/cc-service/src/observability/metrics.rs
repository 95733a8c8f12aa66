//! Metrics definitions for the Curbcall service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `cc_` prefix for the Curbcall service
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `endpoint`: parameterized paths, unknown paths collapse to `/other`
//! - `outcome`: small fixed vocabularies per subsystem
//! - `state`: the five call session states
//! - `kind`: the four relay message types plus `unknown`

use crate::models::CallState;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return the handle for
/// serving metrics via HTTP. Must be called before any metrics are
/// recorded.
///
/// # Errors
///
/// Returns an error if the recorder fails to install (e.g., already
/// installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("cc_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `cc_http_requests_total`, `cc_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status_code`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);

    histogram!("cc_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone()
    )
    .record(duration.as_secs_f64());

    counter!("cc_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Normalize an endpoint path to prevent label cardinality explosion.
///
/// Replaces dynamic segments (tag ids, tag values, session ids) with
/// placeholders.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" => "/health".to_string(),
        "/metrics" => "/metrics".to_string(),
        "/ws/signaling" => "/ws/signaling".to_string(),
        "/api/tags/issue-or-rotate" => "/api/tags/issue-or-rotate".to_string(),
        "/api/calls/start" => "/api/calls/start".to_string(),
        "/api/ice-config" => "/api/ice-config".to_string(),
        "/api/relay/verify-ticket" => "/api/relay/verify-ticket".to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

fn normalize_dynamic_endpoint(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();

    if path.starts_with("/api/tags/by-value/") && parts.len() == 5 {
        return "/api/tags/by-value/{value}".to_string();
    }

    // /api/tags/{tag_id}/image and /api/tags/{tag_id}/view
    if path.starts_with("/api/tags/") && parts.len() == 5 {
        if let Some(action) = parts.get(4) {
            if *action == "image" {
                return "/api/tags/{tag_id}/image".to_string();
            }
            if *action == "view" {
                return "/api/tags/{tag_id}/view".to_string();
            }
        }
    }

    // /api/calls/{session_id}/end
    if path.starts_with("/api/calls/") && parts.len() == 5 {
        if let Some(action) = parts.get(4) {
            if *action == "end" {
                return "/api/calls/{session_id}/end".to_string();
            }
        }
    }

    "/other".to_string()
}

// ============================================================================
// Tag Metrics
// ============================================================================

/// Record the outcome of an issue-or-rotate call.
///
/// Metric: `cc_tag_rotations_total`
/// Labels: `outcome` ("rotated", "reused", "race_lost")
pub fn record_tag_rotation(outcome: &str) {
    counter!("cc_tag_rotations_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a scan of a tag view.
///
/// Metric: `cc_tag_scans_total`
/// Labels: `mode` ("public", "admin")
pub fn record_scan(mode: &str) {
    counter!("cc_tag_scans_total",
        "mode" => mode.to_string()
    )
    .increment(1);
}

// ============================================================================
// Session Metrics
// ============================================================================

/// Record a call session entering `state`.
///
/// Metric: `cc_session_transitions_total`
/// Labels: `state`
pub fn record_session_transition(state: CallState) {
    counter!("cc_session_transitions_total",
        "state" => state.as_str()
    )
    .increment(1);
}

// ============================================================================
// Ticket Metrics
// ============================================================================

/// Record a ticket verification attempt.
///
/// Metric: `cc_ticket_verifications_total`
/// Labels: `outcome` ("ok", "invalid", "expired", "purpose_mismatch")
pub fn record_ticket_verification(outcome: &str) {
    counter!("cc_ticket_verifications_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// ============================================================================
// Relay Metrics
// ============================================================================

/// Record a signaling message handled by the relay.
///
/// Metric: `cc_relay_messages_total`
/// Labels: `kind` ("join", "offer", "answer", "ice", "unknown")
pub fn record_relay_message(kind: &str) {
    let kind = match kind {
        "join" | "offer" | "answer" | "ice" => kind,
        _ => "unknown",
    };
    counter!("cc_relay_messages_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Set the number of currently open signaling rooms.
///
/// Metric: `cc_relay_rooms`
/// Type: Gauge
pub fn set_relay_rooms(count: usize) {
    gauge!("cc_relay_rooms").set(count as f64);
}

// ============================================================================
// Tests
// ============================================================================
