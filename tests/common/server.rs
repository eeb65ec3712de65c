//! Test server lifecycle management
//!
//! Each test gets an isolated MCP server on a random port, talking to its
//! own [`MockBackend`].

use super::constants::*;
use super::mock_backend::MockBackend;
use adt_mcp_server::adt::{AdtClient, AdtClientConfig, LockRetryPolicy};
use adt_mcp_server::mcp::create_mcp_state;
use adt_mcp_server::server::state::ServerState;
use adt_mcp_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// MCP server wired to a mock backend.
///
/// When dropped, the server and the backend shut down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    pub backend: MockBackend,

    shutdown: CancellationToken,
}

impl TestServer {
    /// Spawns a server with the default lock policy (three attempts).
    pub async fn spawn() -> Self {
        Self::spawn_with_lock_attempts(3).await
    }

    /// # Panics
    ///
    /// Panics if port binding fails or the server doesn't become ready
    /// within [`SERVER_READY_TIMEOUT_MS`].
    pub async fn spawn_with_lock_attempts(max_attempts: u32) -> Self {
        let backend = MockBackend::spawn().await;

        let client = AdtClient::new(AdtClientConfig {
            base_url: backend.base_url.clone(),
            user: BACKEND_USER.to_string(),
            password: BACKEND_PASS.to_string(),
            client: BACKEND_CLIENT.to_string(),
            ..Default::default()
        })
        .expect("Failed to create ADT client");

        let policy = LockRetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(TEST_LOCK_BACKOFF_MS),
        };
        let mcp_state = Arc::new(create_mcp_state(Arc::new(client), policy));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            heartbeat_interval: Duration::from_millis(TEST_HEARTBEAT_MS),
        };

        let shutdown = CancellationToken::new();
        let app = make_app(ServerState::new(config, mcp_state, shutdown.clone()));

        // Spawn server in background task with graceful shutdown
        let token = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            backend,
            shutdown,
        };
        server.wait_for_ready().await;
        server
    }

    async fn wait_for_ready(&self) {
        let client = reqwest::Client::new();
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/health", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
