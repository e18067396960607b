//! reqwest transport
//!
//! The default backend. The `reqwest::Client` is built on first use (or at
//! [`Backend::startup`]) from the [`BackendConfig`], and dropped again at
//! [`Backend::shutdown`]. A client passed to [`ReqwestBackend::with_client`]
//! is used as is.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use http::HeaderMap;
use tokio::sync::Mutex;

use crate::backend::transport::TransportRequest;
use crate::backend::{Backend, BackendConfig, BackendRequest, BackendType, finish_response};
use crate::defaults;
use crate::error::ApiError;
use crate::types::ApiResponse;

/// Connection settings resolved from a [`BackendConfig`].
#[derive(Debug, Clone, Default)]
struct Settings {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    proxy: Option<String>,
    user_agent: Option<String>,
    headers: HeaderMap,
}

impl Settings {
    fn from_config(config: &BackendConfig) -> Result<Self, ApiError> {
        let settings = Self {
            timeout: config.timeout,
            connect_timeout: config.duration_option("connect_timeout")?,
            proxy: config.string_option("proxy")?,
            user_agent: config.string_option("user_agent")?,
            headers: config.headers_option()?,
        };
        if let Some(proxy) = &settings.proxy {
            reqwest::Proxy::all(proxy)
                .map_err(|e| ApiError::ConfigurationError(format!("Invalid proxy URL: {e}")))?;
        }
        Ok(settings)
    }
}

fn build_client(settings: &Settings) -> Result<reqwest::Client, ApiError> {
    let mut builder = reqwest::Client::builder();

    if let Some(timeout) = settings.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(connect_timeout) = settings.connect_timeout {
        builder = builder.connect_timeout(connect_timeout);
    }

    if let Some(proxy_url) = &settings.proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ApiError::ConfigurationError(format!("Invalid proxy URL: {e}")))?;
        builder = builder.proxy(proxy);
    }

    builder = builder.user_agent(
        settings
            .user_agent
            .as_deref()
            .unwrap_or(defaults::http::USER_AGENT),
    );

    if !settings.headers.is_empty() {
        builder = builder.default_headers(settings.headers.clone());
    }

    builder
        .build()
        .map_err(|e| ApiError::ConfigurationError(format!("Failed to create HTTP client: {e}")))
}

/// Backend sending requests through `reqwest`.
pub struct ReqwestBackend {
    client: Mutex<Option<reqwest::Client>>,
    settings: Settings,
    /// Injected clients survive shutdown.
    injected: Option<reqwest::Client>,
}

impl ReqwestBackend {
    /// Backend with default settings.
    pub fn new() -> Self {
        Self {
            client: Mutex::new(None),
            settings: Settings {
                timeout: Some(defaults::http::REQUEST_TIMEOUT),
                ..Default::default()
            },
            injected: None,
        }
    }

    /// Backend using a caller-provided client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Mutex::new(Some(client.clone())),
            settings: Settings::default(),
            injected: Some(client),
        }
    }

    async fn client(&self) -> Result<reqwest::Client, ApiError> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        let client = match &self.injected {
            Some(client) => client.clone(),
            None => build_client(&self.settings)?,
        };
        tracing::debug!(target: "apiclient::http", backend = Self::NAME, "transport client created");
        *guard = Some(client.clone());
        Ok(client)
    }

    /// Whether a transport client is currently held.
    pub async fn is_started(&self) -> bool {
        self.client.lock().await.is_some()
    }
}

impl Default for ReqwestBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReqwestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestBackend")
            .field("settings", &self.settings)
            .field("injected", &self.injected.is_some())
            .finish()
    }
}

#[async_trait]
impl Backend for ReqwestBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn startup(&self) -> Result<(), ApiError> {
        self.client().await.map(|_| ())
    }

    async fn shutdown(&self) -> Result<(), ApiError> {
        if self.client.lock().await.take().is_some() {
            tracing::debug!(target: "apiclient::http", backend = Self::NAME, "transport client released");
        }
        Ok(())
    }

    async fn request(&self, request: BackendRequest) -> Result<ApiResponse, ApiError> {
        let client = self.client().await?;
        let transport = TransportRequest::from_options(&request.method, &request.url, request.options)?;

        let mut builder = client
            .request(transport.method, transport.url.as_str())
            .headers(transport.headers);
        if let Some(body) = transport.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = transport.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            let err = ApiError::from(e);
            tracing::debug!(target: "apiclient::http", backend = Self::NAME, url = %request.url, error = %err, "transport error");
            err
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ApiError::from))
            .boxed();

        finish_response(Self::NAME, &request.url, request.flags, status, headers, body).await
    }
}

impl BackendType for ReqwestBackend {
    const NAME: &'static str = "reqwest";

    fn from_config(config: BackendConfig) -> Result<Self, ApiError> {
        if let Some(path) = &config.uds {
            return Err(ApiError::ConfigurationError(format!(
                "The {} backend cannot connect through unix socket {}",
                Self::NAME,
                path.display()
            )));
        }
        Ok(Self {
            client: Mutex::new(None),
            settings: Settings::from_config(&config)?,
            injected: None,
        })
    }
}
