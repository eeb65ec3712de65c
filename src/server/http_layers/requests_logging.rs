//! Request logging middleware

use std::time::Instant;

use axum::extract::State;
use axum::{
    body::Body,
    http::{header::HeaderMap, Request, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use tracing::{error, info};

use super::super::ServerConfig;
use crate::mcp::protocol::MCP_SESSION_HEADER;

#[derive(PartialEq, PartialOrd, Clone, Debug, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    Path,
    Headers,
    Body,
}

impl Default for RequestsLoggingLevel {
    fn default() -> Self {
        Self::Path
    }
}

impl std::fmt::Display for RequestsLoggingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

const MAX_LOGGABLE_BODY_LENGTH: usize = 1024;

fn content_length(headers: &HeaderMap) -> Result<usize, &'static str> {
    headers
        .get("content-length")
        .ok_or("Content-length not set.")?
        .to_str()
        .map_err(|_| "Could not get Content-length string value.")?
        .parse::<usize>()
        .map_err(|_| "Could not parse Content-length numeric value.")
}

fn log_headers(label: &str, headers: &HeaderMap) {
    info!("  {} Headers:", label);
    for (name, value) in headers.iter() {
        info!("    {:?}: {:?}", name, value);
    }
}

/// Logs `body` if it is small enough and hands back an equivalent body.
/// Event streams carry no content-length and are never buffered.
async fn log_body(label: &str, headers: &HeaderMap, body: Body) -> Result<Body, axum::Error> {
    let size = match content_length(headers) {
        Ok(size) => size,
        Err(reason) => {
            info!("  {} Body: {}", label, reason);
            return Ok(body);
        }
    };

    if size >= MAX_LOGGABLE_BODY_LENGTH {
        info!(
            "  {} Body: Too big to log ({:#})",
            label,
            byte_unit::Byte::from(size)
        );
        return Ok(body);
    }

    let bytes = axum::body::to_bytes(body, size).await?;
    info!("  {} Body:\n{}", label, String::from_utf8_lossy(&bytes));
    Ok(Body::from(bytes))
}

pub async fn log_requests(
    State(config): State<ServerConfig>,
    request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let level = config.requests_logging_level;
    if level == RequestsLoggingLevel::None {
        return next.run(request).await;
    }

    let start = Instant::now();
    match request
        .headers()
        .get(MCP_SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        Some(session) => info!(">>> {} {} [{}]", request.method(), request.uri(), session),
        None => info!(">>> {} {}", request.method(), request.uri()),
    }

    let request = if level >= RequestsLoggingLevel::Headers {
        log_headers("Req", request.headers());
        if level >= RequestsLoggingLevel::Body {
            let (parts, body) = request.into_parts();
            match log_body("Req", &parts.headers, body).await {
                Ok(body) => Request::from_parts(parts, body),
                Err(err) => {
                    error!("Failed to read request body: {:?}", err);
                    return StatusCode::BAD_REQUEST.into_response();
                }
            }
        } else {
            request
        }
    } else {
        request
    };

    let mut response = next.run(request).await;

    if level >= RequestsLoggingLevel::Headers {
        log_headers("Resp", response.headers());
    }
    if level >= RequestsLoggingLevel::Body {
        let (parts, body) = response.into_parts();
        let body = log_body("Resp", &parts.headers, body)
            .await
            .unwrap_or_else(|err| {
                error!("Failed to read response body: {:?}", err);
                Body::empty()
            });
        response = Response::from_parts(parts, body);
    }

    info!(
        "<<< {} ({}ms)",
        response.status().as_u16(),
        start.elapsed().as_millis()
    );

    response
}
