//! HTTP routes for the Curbcall service.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::relay::{socket::signaling_socket, SignalingRelay};
use crate::services::collaborators::{
    HeaderIdentityResolver, IdentityResolver, InMemoryOwnerDirectory, InMemoryPermitLookup,
    LogOnlyNotifier, OwnerDirectory, PermitLookup,
};
use crate::services::credential_issuer::CredentialIssuer;
use crate::services::session_registry::SessionRegistry;
use crate::services::tag_store::TagStore;
use crate::services::tag_view::TagViewOrchestrator;
use crate::services::ticket_issuer::TicketIssuer;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Owner of all dynamic tag records.
    pub tags: Arc<TagStore>,

    /// Owner of all call session records.
    pub sessions: Arc<SessionRegistry>,

    /// Relay ticket mint and verifier.
    pub tickets: Arc<TicketIssuer>,

    /// ICE/TURN credential derivation.
    pub credentials: CredentialIssuer,

    /// Signaling rooms.
    pub relay: SignalingRelay,

    /// Scan-time orchestration.
    pub orchestrator: TagViewOrchestrator,

    /// Principal resolution for incoming requests.
    pub identity: Arc<dyn IdentityResolver>,
}

/// Assembled application state plus handles to the in-process
/// collaborator implementations (seeded by local runs and tests).
pub struct ServiceParts {
    pub state: Arc<AppState>,
    pub directory: Arc<InMemoryOwnerDirectory>,
    pub permits: Arc<InMemoryPermitLookup>,
}

/// Wire up stores, issuers, relay, and orchestrator from configuration.
pub fn build_state(config: Config) -> ServiceParts {
    let tags = Arc::new(TagStore::new(
        config.tag_ttl_seconds,
        config.rotation_guard_seconds,
    ));
    let sessions = Arc::new(SessionRegistry::new(config.session_ttl_seconds));
    let tickets = Arc::new(TicketIssuer::new(config.ticket_ttl_seconds));
    let credentials = CredentialIssuer::new(
        config.stun_urls.clone(),
        config.turn_urls.clone(),
        config.turn_rest_secret.clone(),
        config.turn_ttl_seconds,
    );

    let directory = Arc::new(InMemoryOwnerDirectory::new());
    let permits = Arc::new(InMemoryPermitLookup::new());
    let orchestrator = TagViewOrchestrator::new(
        Arc::clone(&tags),
        Arc::clone(&sessions),
        Arc::clone(&tickets),
        Arc::clone(&directory) as Arc<dyn OwnerDirectory>,
        Arc::new(LogOnlyNotifier),
        Arc::clone(&permits) as Arc<dyn PermitLookup>,
    );

    let state = Arc::new(AppState {
        config,
        tags,
        sessions,
        tickets,
        credentials,
        relay: SignalingRelay::new(),
        orchestrator,
        identity: Arc::new(HeaderIdentityResolver),
    });

    ServiceParts {
        state,
        directory,
        permits,
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe (simple "OK")
/// - `/metrics` - Prometheus metrics endpoint
/// - the `/api` surface (tags, calls, ICE config, ticket verification)
/// - `/ws/signaling` - the WebSocket signaling relay
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout (the WebSocket route sits outside it; the
///   timeout would kill long-lived signaling connections)
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/api/tags/issue-or-rotate",
            post(handlers::issue_or_rotate),
        )
        .route("/api/tags/:tag_id/image", get(handlers::tag_image))
        .route(
            "/api/tags/by-value/:value",
            get(handlers::validate_by_value),
        )
        .route("/api/tags/:tag_id/view", get(handlers::view_tag))
        .route("/api/calls/start", post(handlers::start_call))
        .route("/api/calls/:session_id/end", post(handlers::end_call))
        .route("/api/ice-config", get(handlers::get_ice_config))
        .route(
            "/api/relay/verify-ticket",
            post(handlers::verify_ticket),
        )
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws/signaling", get(signaling_socket))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    api_routes
        .merge(ws_routes)
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}
