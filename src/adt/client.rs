//! Stateful HTTP session against the ADT REST API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::HeaderMap;
use reqwest::Method;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::error::AdtError;

pub const CSRF_TOKEN_HEADER: &str = "x-csrf-token";
pub const SESSION_TYPE_HEADER: &str = "X-sap-adt-sessiontype";
pub const DISCOVERY_PATH: &str = "/sap/bc/adt/core/discovery";

/// Connection settings for an [`AdtClient`].
#[derive(Debug, Clone)]
pub struct AdtClientConfig {
    pub base_url: String,
    pub user: String,
    pub password: String,
    pub client: String,
    pub language: String,
    /// Accept any server certificate. Off unless explicitly requested.
    pub allow_insecure_tls: bool,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for AdtClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            user: String::new(),
            password: String::new(),
            client: "100".to_string(),
            language: "EN".to_string(),
            allow_insecure_tls: false,
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// A single request against the backend, path relative to the base URL.
#[derive(Debug, Clone)]
pub struct AdtRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<String>,
    pub content_type: Option<String>,
    pub accept: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl AdtRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            content_type: None,
            accept: None,
            headers: Vec::new(),
        }
    }

    pub fn body(mut self, body: impl Into<String>, content_type: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self.content_type = Some(content_type.into());
        self
    }

    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Lock handles are bound to a stateful backend session.
    pub fn stateful(self) -> Self {
        self.header(SESSION_TYPE_HEADER, "stateful")
    }
}

#[derive(Debug, Clone)]
pub struct AdtResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl AdtResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

struct Transport {
    http: reqwest::Client,
    // Kept so the session cookies live exactly as long as this transport.
    _cookies: Arc<Jar>,
}

impl Transport {
    fn build(config: &AdtClientConfig) -> Result<Self, AdtError> {
        let cookies = Arc::new(Jar::default());
        let mut builder = reqwest::Client::builder()
            .cookie_provider(cookies.clone())
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout);

        if config.allow_insecure_tls {
            warn!("TLS certificate validation is disabled for {}", config.base_url);
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder
            .build()
            .map_err(|e| AdtError::Connectivity(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            _cookies: cookies,
        })
    }
}

/// Authenticated session with CSRF token management.
///
/// Every request goes through [`AdtClient::login`] first, so nothing is sent
/// before a token has been obtained. A 403 triggers one token refresh and one
/// retry; concurrent 403s share a single refresh.
pub struct AdtClient {
    config: AdtClientConfig,
    base_url: String,
    transport: RwLock<Transport>,
    csrf_token: RwLock<Option<String>>,
    refresh_lock: Mutex<()>,
    logged_in: AtomicBool,
}

impl AdtClient {
    pub fn new(config: AdtClientConfig) -> Result<Self, AdtError> {
        let transport = Transport::build(&config)?;
        let base_url = config.base_url.trim_end_matches('/').to_string();

        Ok(Self {
            config,
            base_url,
            transport: RwLock::new(transport),
            csrf_token: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            logged_in: AtomicBool::new(false),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Logon language sent with every request.
    pub fn language(&self) -> &str {
        &self.config.language
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    pub async fn csrf_token(&self) -> Option<String> {
        self.csrf_token.read().await.clone()
    }

    /// Fetches the first CSRF token. No-op once logged in.
    pub async fn login(&self) -> Result<(), AdtError> {
        if self.is_logged_in() {
            return Ok(());
        }

        let _guard = self.refresh_lock.lock().await;
        if self.is_logged_in() {
            return Ok(());
        }

        let token = self.fetch_csrf_token().await?;
        *self.csrf_token.write().await = Some(token);
        self.logged_in.store(true, Ordering::SeqCst);

        info!("Logged in to {} as {}", self.base_url, self.config.user);
        Ok(())
    }

    /// Drops token and cookies locally. The server is not contacted.
    pub async fn logout(&self) -> Result<(), AdtError> {
        let _guard = self.refresh_lock.lock().await;
        *self.transport.write().await = Transport::build(&self.config)?;
        *self.csrf_token.write().await = None;
        self.logged_in.store(false, Ordering::SeqCst);

        info!("Logged out from {}", self.base_url);
        Ok(())
    }

    pub async fn get(&self, path: &str, accept: &str) -> Result<AdtResponse, AdtError> {
        self.request(AdtRequest::new(Method::GET, path).accept(accept))
            .await
    }

    pub async fn post(
        &self,
        path: &str,
        body: &str,
        content_type: &str,
        accept: &str,
    ) -> Result<AdtResponse, AdtError> {
        self.request(
            AdtRequest::new(Method::POST, path)
                .body(body, content_type)
                .accept(accept),
        )
        .await
    }

    pub async fn put(
        &self,
        path: &str,
        body: &str,
        content_type: &str,
    ) -> Result<AdtResponse, AdtError> {
        self.request(AdtRequest::new(Method::PUT, path).body(body, content_type))
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<AdtResponse, AdtError> {
        self.request(AdtRequest::new(Method::DELETE, path)).await
    }

    /// Sends a request, refreshing the CSRF token and retrying once on 403.
    /// Anything but a 2xx after that is returned as [`AdtError::Http`].
    pub async fn request(&self, request: AdtRequest) -> Result<AdtResponse, AdtError> {
        self.login().await?;

        let sent_token = self.csrf_token().await;
        let response = self.send(&request, sent_token.as_deref()).await?;
        if response.status != 403 {
            return self.check_status(&request, response);
        }

        debug!(
            "403 on {} {}, refreshing CSRF token",
            request.method, request.path
        );
        let token = self.refresh_csrf_token(sent_token).await?;
        let retried = self.send(&request, token.as_deref()).await?;
        self.check_status(&request, retried)
    }

    pub fn build_url(&self, path: &str) -> String {
        let separator = if path.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}sap-client={}&sap-language={}",
            self.base_url,
            path,
            separator,
            urlencoding::encode(&self.config.client),
            urlencoding::encode(&self.config.language)
        )
    }

    /// Replaces the token unless another request already did so since
    /// `stale` was read.
    async fn refresh_csrf_token(&self, stale: Option<String>) -> Result<Option<String>, AdtError> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.csrf_token().await;
        if current != stale {
            debug!("CSRF token already refreshed by a concurrent request");
            return Ok(current);
        }

        match self.fetch_csrf_token().await {
            Ok(token) => {
                *self.csrf_token.write().await = Some(token.clone());
                Ok(Some(token))
            }
            Err(AdtError::Connectivity(msg)) => Err(AdtError::Connectivity(msg)),
            Err(err) => {
                warn!("CSRF token refresh failed, keeping previous token: {}", err);
                Ok(current)
            }
        }
    }

    async fn fetch_csrf_token(&self) -> Result<String, AdtError> {
        let http = self.transport.read().await.http.clone();
        let response = http
            .get(self.build_url(DISCOVERY_PATH))
            .basic_auth(&self.config.user, Some(&self.config.password))
            .header(CSRF_TOKEN_HEADER, "Fetch")
            .header(reqwest::header::ACCEPT, "application/atomsvc+xml")
            .header(reqwest::header::ACCEPT_LANGUAGE, &self.config.language)
            .send()
            .await?;

        let status = response.status().as_u16();
        let token = response
            .headers()
            .get(CSRF_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .filter(|token| !token.is_empty());

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdtError::Auth { status, body });
        }

        token.ok_or_else(|| {
            AdtError::Protocol(format!(
                "discovery returned {} without a CSRF token",
                status
            ))
        })
    }

    async fn send(
        &self,
        request: &AdtRequest,
        token: Option<&str>,
    ) -> Result<AdtResponse, AdtError> {
        let http = self.transport.read().await.http.clone();
        let mut builder = http
            .request(request.method.clone(), self.build_url(&request.path))
            .basic_auth(&self.config.user, Some(&self.config.password))
            .header(reqwest::header::ACCEPT_LANGUAGE, &self.config.language);

        if let Some(token) = token {
            builder = builder.header(CSRF_TOKEN_HEADER, token);
        }
        if let Some(accept) = &request.accept {
            builder = builder.header(reqwest::header::ACCEPT, accept);
        }
        if let Some(content_type) = &request.content_type {
            builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;

        debug!("{} {} -> {}", request.method, request.path, status);
        Ok(AdtResponse {
            status,
            headers,
            body,
        })
    }

    fn check_status(
        &self,
        request: &AdtRequest,
        response: AdtResponse,
    ) -> Result<AdtResponse, AdtError> {
        if (200..300).contains(&response.status) {
            Ok(response)
        } else {
            Err(AdtError::Http {
                status: response.status,
                method: request.method.to_string(),
                uri: request.path.clone(),
                body: response.body,
            })
        }
    }
}
