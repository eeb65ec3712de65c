use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
    },
    middleware,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::{stream, Stream, StreamExt};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use super::{log_requests, state::*, ServerConfig};
use crate::mcp::protocol::{ServerInfo, MCP_PROTOCOL_VERSION, MCP_SESSION_HEADER};
use crate::mcp::{handle_message, McpState};

const SESSION_HEADER: HeaderName = HeaderName::from_static(MCP_SESSION_HEADER);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerStatus {
    name: String,
    version: String,
    protocol: &'static str,
    tools: usize,
    status: &'static str,
    started_at: String,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    tools: usize,
}

fn session_id_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.contains("text/event-stream"))
        .unwrap_or(false)
}

async fn post_mcp(
    State(mcp_state): State<GuardedMcpState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let text = String::from_utf8_lossy(&body);
    let dispatched = handle_message(&mcp_state, &text).await;

    let session_id = dispatched.session_id.or_else(|| session_id_from(&headers));
    let mut response = Json(dispatched.response).into_response();
    if let Some(value) = session_id.and_then(|id| HeaderValue::from_str(&id).ok()) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

/// `: connected`, then a `: ping` comment every `interval` until `shutdown`
/// fires or the peer goes away.
fn heartbeat_stream(
    interval: Duration,
    shutdown: CancellationToken,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let connected = stream::once(async { Ok::<_, Infallible>(Event::default().comment("connected")) });

    let start = tokio::time::Instant::now() + interval;
    let pings = stream::unfold(
        tokio::time::interval_at(start, interval),
        |mut ticker| async move {
            ticker.tick().await;
            Some((Ok(Event::default().comment("ping")), ticker))
        },
    );

    connected
        .chain(pings)
        .take_until(shutdown.cancelled_owned())
}

async fn get_mcp(State(state): State<ServerState>, headers: HeaderMap) -> Response {
    if accepts_event_stream(&headers) {
        debug!("Opening event stream");
        return Sse::new(heartbeat_stream(
            state.config.heartbeat_interval,
            state.shutdown.clone(),
        ))
        .into_response();
    }

    let info = ServerInfo::default();
    Json(ServerStatus {
        name: info.name,
        version: info.version,
        protocol: MCP_PROTOCOL_VERSION,
        tools: state.mcp_state.registry.tool_count(),
        status: "running",
        started_at: state.started_at.to_rfc3339(),
    })
    .into_response()
}

async fn delete_mcp(State(mcp_state): State<GuardedMcpState>, headers: HeaderMap) -> StatusCode {
    if let Some(id) = session_id_from(&headers) {
        if mcp_state.sessions.remove(&id).await {
            info!("MCP session closed: {}", id);
        } else {
            debug!("DELETE for unknown MCP session {}", id);
        }
    }
    StatusCode::OK
}

async fn options_mcp() -> StatusCode {
    StatusCode::OK
}

async fn health(State(mcp_state): State<GuardedMcpState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        tools: mcp_state.registry.tool_count(),
    })
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, SESSION_HEADER])
        .expose_headers([SESSION_HEADER])
}

pub fn make_app(state: ServerState) -> Router {
    let mcp_routes: Router = Router::new()
        .route(
            "/mcp",
            post(post_mcp)
                .get(get_mcp)
                .delete(delete_mcp)
                .options(options_mcp),
        )
        .route("/health", get(health))
        .with_state(state.clone());

    mcp_routes
        .layer(cors_layer())
        .layer(middleware::from_fn_with_state(state.config.clone(), log_requests))
}

/// Serves on `127.0.0.1:<port>` until `shutdown` is cancelled.
pub async fn run_server(
    config: ServerConfig,
    mcp_state: Arc<McpState>,
    shutdown: CancellationToken,
) -> Result<()> {
    let port = config.port;
    let app = make_app(ServerState::new(config, mcp_state, shutdown.clone()));

    let listener = TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Failed to bind 127.0.0.1:{}", port))?;
    info!("MCP server listening on http://127.0.0.1:{}/mcp", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("MCP server stopped");
    Ok(())
}
