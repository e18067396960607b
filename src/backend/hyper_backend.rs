//! hyper transport
//!
//! Plain HTTP/1.1 over TCP, or over a unix domain socket when the client was
//! configured with one. The connection pool is created lazily and dropped on
//! shutdown.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::header::{HeaderValue, USER_AGENT};
use http::{HeaderMap, Request, Response, Uri};
use http_body_util::{BodyDataStream, Full};
use hyper::body::Incoming;
use hyper_util::client::legacy::Client as PoolClient;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio::sync::Mutex;
use tokio::time::Instant;

#[cfg(unix)]
use crate::backend::uds::UdsConnector;
use crate::backend::transport::TransportRequest;
use crate::backend::{Backend, BackendConfig, BackendRequest, BackendType, finish_response};
use crate::defaults;
use crate::error::ApiError;
use crate::types::{ApiResponse, BodyStream};

#[derive(Debug, Clone)]
struct Settings {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    pool_idle_timeout: Option<Duration>,
    pool_max_idle_per_host: Option<usize>,
    user_agent: HeaderValue,
    headers: HeaderMap,
    uds: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: Some(defaults::http::REQUEST_TIMEOUT),
            connect_timeout: None,
            pool_idle_timeout: None,
            pool_max_idle_per_host: None,
            user_agent: HeaderValue::from_static(defaults::http::USER_AGENT),
            headers: HeaderMap::new(),
            uds: None,
        }
    }
}

impl Settings {
    fn from_config(config: BackendConfig) -> Result<Self, ApiError> {
        let user_agent = match config.string_option("user_agent")? {
            Some(agent) => HeaderValue::from_str(&agent).map_err(|e| {
                ApiError::ConfigurationError(format!("Invalid backend option 'user_agent': {e}"))
            })?,
            None => HeaderValue::from_static(defaults::http::USER_AGENT),
        };
        Ok(Self {
            timeout: config.timeout,
            connect_timeout: config.duration_option("connect_timeout")?,
            pool_idle_timeout: config.duration_option("pool_idle_timeout")?,
            pool_max_idle_per_host: config.usize_option("pool_max_idle_per_host")?,
            user_agent,
            headers: config.headers_option()?,
            uds: config.uds,
        })
    }
}

#[derive(Clone)]
enum Transport {
    Tcp(PoolClient<HttpConnector, Full<Bytes>>),
    #[cfg(unix)]
    Uds(PoolClient<UdsConnector, Full<Bytes>>),
}

impl Transport {
    fn build(settings: &Settings) -> Self {
        let mut builder = PoolClient::builder(TokioExecutor::new());
        builder.pool_timer(TokioTimer::new());
        if let Some(idle) = settings.pool_idle_timeout {
            builder.pool_idle_timeout(idle);
        }
        if let Some(max_idle) = settings.pool_max_idle_per_host {
            builder.pool_max_idle_per_host(max_idle);
        }

        #[cfg(unix)]
        {
            if let Some(path) = &settings.uds {
                return Self::Uds(builder.build(UdsConnector::new(path.clone())));
            }
        }

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(settings.connect_timeout);
        Self::Tcp(builder.build(connector))
    }

    async fn send(
        &self,
        request: Request<Full<Bytes>>,
    ) -> Result<Response<Incoming>, hyper_util::client::legacy::Error> {
        match self {
            Self::Tcp(client) => client.request(request).await,
            #[cfg(unix)]
            Self::Uds(client) => client.request(request).await,
        }
    }
}

/// Backend sending requests through a pooled `hyper` client.
pub struct HyperBackend {
    transport: Mutex<Option<Transport>>,
    settings: Settings,
}

impl HyperBackend {
    pub fn new() -> Self {
        Self {
            transport: Mutex::new(None),
            settings: Settings::default(),
        }
    }

    async fn transport(&self) -> Transport {
        let mut guard = self.transport.lock().await;
        match guard.as_ref() {
            Some(transport) => transport.clone(),
            None => {
                let transport = Transport::build(&self.settings);
                tracing::debug!(target: "apiclient::http", backend = Self::NAME, uds = ?self.settings.uds, "transport client created");
                *guard = Some(transport.clone());
                transport
            }
        }
    }

    /// Whether a connection pool is currently held.
    pub async fn is_started(&self) -> bool {
        self.transport.lock().await.is_some()
    }

    fn build_request(&self, transport: TransportRequest) -> Result<Request<Full<Bytes>>, ApiError> {
        let TransportRequest {
            method,
            url,
            mut headers,
            body,
            ..
        } = transport;

        let uri: Uri = url
            .parse()
            .map_err(|e| ApiError::ConfigurationError(format!("Invalid request URL '{url}': {e}")))?;

        headers
            .entry(USER_AGENT)
            .or_insert_with(|| self.settings.user_agent.clone());
        for (name, value) in &self.settings.headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }

        let mut request = Request::new(Full::new(body.unwrap_or_default()));
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.headers_mut() = headers;
        Ok(request)
    }
}

impl Default for HyperBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HyperBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperBackend")
            .field("settings", &self.settings)
            .finish()
    }
}

#[async_trait]
impl Backend for HyperBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn startup(&self) -> Result<(), ApiError> {
        self.transport().await;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ApiError> {
        if self.transport.lock().await.take().is_some() {
            tracing::debug!(target: "apiclient::http", backend = Self::NAME, "transport client released");
        }
        Ok(())
    }

    async fn request(&self, request: BackendRequest) -> Result<ApiResponse, ApiError> {
        let client = self.transport().await;
        let transport = TransportRequest::from_options(&request.method, &request.url, request.options)?;
        let timeout = transport.timeout.or(self.settings.timeout);
        let outgoing = self.build_request(transport)?;

        // One deadline covers the headers and every body chunk.
        let deadline = timeout.map(|limit| (Instant::now() + limit, limit));
        let sent = match deadline {
            Some((at, limit)) => tokio::time::timeout_at(at, client.send(outgoing))
                .await
                .map_err(|_| timed_out(limit))?,
            None => client.send(outgoing).await,
        };
        let response = sent.map_err(|e| {
            let err = ApiError::from(e);
            tracing::debug!(target: "apiclient::http", backend = Self::NAME, url = %request.url, error = %err, "transport error");
            err
        })?;

        let (parts, body) = response.into_parts();
        let body = BodyDataStream::new(body)
            .map(|chunk| chunk.map_err(ApiError::from))
            .boxed();
        let body = match deadline {
            Some((at, limit)) => with_deadline(body, at, limit),
            None => body,
        };

        finish_response(Self::NAME, &request.url, request.flags, parts.status, parts.headers, body).await
    }
}

fn timed_out(limit: Duration) -> ApiError {
    ApiError::HttpError {
        backend: HyperBackend::NAME,
        message: format!("request timed out after {limit:?}"),
    }
}

/// Ends `body` with a timeout error once `deadline` passes.
fn with_deadline(body: BodyStream, deadline: Instant, limit: Duration) -> BodyStream {
    futures::stream::unfold(Some(body), move |body| async move {
        let Some(mut body) = body else {
            return None;
        };
        match tokio::time::timeout_at(deadline, body.next()).await {
            Ok(Some(chunk)) => Some((chunk, Some(body))),
            Ok(None) => None,
            Err(_) => Some((Err(timed_out(limit)), None)),
        }
    })
    .boxed()
}

impl BackendType for HyperBackend {
    const NAME: &'static str = "hyper";
    const SUPPORTS_UDS: bool = cfg!(unix);

    fn from_config(config: BackendConfig) -> Result<Self, ApiError> {
        if !Self::SUPPORTS_UDS
            && let Some(path) = &config.uds
        {
            return Err(ApiError::ConfigurationError(format!(
                "Unix sockets are not available on this platform: {}",
                path.display()
            )));
        }
        Ok(Self {
            transport: Mutex::new(None),
            settings: Settings::from_config(config)?,
        })
    }
}
