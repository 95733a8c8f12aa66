//! Test server harness for E2E testing.
//!
//! Provides `TestServer` for spawning real Curbcall server instances in
//! tests.

use cc_service::config::Config;
use cc_service::routes::{self, AppState, ServiceParts};
use cc_service::services::collaborators::{
    InMemoryOwnerDirectory, InMemoryPermitLookup, OwnerProfile, PermitSummary,
};
use common::types::OwnerId;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the Curbcall server in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_e2e() -> Result<(), anyhow::Error> {
///     let server = TestServer::spawn().await?;
///
///     let response = reqwest::get(&format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    directory: Arc<InMemoryOwnerDirectory>,
    permits: Arc<InMemoryPermitLookup>,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Spawn a test server with default configuration.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(HashMap::new()).await
    }

    /// Spawn a test server with extra configuration variables layered over
    /// the defaults.
    ///
    /// The server binds to a random available port (127.0.0.1:0) and runs
    /// in the background until the harness is dropped.
    pub async fn spawn_with_vars(
        extra_vars: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            (
                "STUN_URLS".to_string(),
                "stun:stun.test.invalid:3478".to_string(),
            ),
        ]);
        vars.extend(extra_vars);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let ServiceParts {
            state,
            directory,
            permits,
        } = routes::build_state(config);

        // A per-server recorder handle; install_recorder() is global and
        // would fail on the second test in the same process.
        let recorder = PrometheusBuilder::new().build_recorder();
        let metrics_handle = recorder.handle();

        let app = routes::build_routes(Arc::clone(&state), metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            directory,
            permits,
            _handle: handle,
        })
    }

    /// Seed an owner profile and return its id.
    pub async fn seed_owner(&self, display_name: &str, vehicle_plate: &str) -> OwnerId {
        let owner_id = OwnerId::new();
        self.directory
            .upsert(
                owner_id,
                OwnerProfile {
                    display_name: display_name.to_string(),
                    vehicle_plate: vehicle_plate.to_string(),
                    push_targets: vec!["test-device".to_string()],
                },
            )
            .await;
        owner_id
    }

    /// Seed a permit record for an owner.
    pub async fn seed_permit(&self, owner_id: OwnerId, summary: PermitSummary) {
        self.permits.upsert(owner_id, summary).await;
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the WebSocket URL of the signaling endpoint.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws/signaling", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get a reference to the shared application state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released as soon as the
        // test completes.
        self._handle.abort();
    }
}
