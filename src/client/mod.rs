//! Client and request pipeline
//!
//! A [`Client`] owns the root URL, the default options, the response flags,
//! the backend and the middleware chain. Every request goes through the same
//! steps: defaults are merged into the call options, relative URLs are joined
//! to the root, middlewares run (most recently registered first), the
//! reserved flags are resolved against the client defaults and the request is
//! handed to the backend.
//!
//! ```rust,ignore
//! use apiclient::prelude::*;
//!
//! let client = Client::builder()
//!     .root("https://api.github.com")
//!     .header("Accept", "application/vnd.github+json")
//!     .build()?;
//!
//! let user = client.api().at("users").at("octocat").call().await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::backend::{Backend, BackendConfig, BackendRequest, BackendType};
use crate::descriptor::{Descriptor, Dispatch};
use crate::error::ApiError;
use crate::middleware::{Middleware, MiddlewareChain, RequestParts};
use crate::registry::{BackendEntry, BackendRegistry, global_registry};
use crate::types::{ApiResponse, FlagOverrides, Options, ResponseFlags, merge_defaults};

pub mod config;

pub use config::ClientConfig;

/// How a client picks its backend.
#[derive(Clone, Default)]
pub enum BackendSelector {
    /// First registered backend (able to use a socket, when one is configured).
    #[default]
    Default,
    /// Registered backend by name.
    Named(String),
    /// Backend constructor, registered or not.
    Entry(BackendEntry),
    /// Ready-made backend; backend options, timeout and socket are not applied.
    Instance(Arc<dyn Backend>),
}

impl std::fmt::Debug for BackendSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Entry(entry) => f.debug_tuple("Entry").field(&entry.name).finish(),
            Self::Instance(backend) => f.debug_tuple("Instance").field(&backend.name()).finish(),
        }
    }
}

/// Builder for [`Client`].
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    root: String,
    backend: BackendSelector,
    backend_options: Options,
    flags: ResponseFlags,
    timeout: Option<Duration>,
    uds: Option<PathBuf>,
    defaults: Options,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::from_config(ClientConfig::default())
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: ClientConfig) -> Self {
        let flags = config.flags();
        Self {
            root: config.root,
            backend: config
                .backend
                .map(BackendSelector::Named)
                .unwrap_or_default(),
            backend_options: config.backend_options,
            flags,
            timeout: config.timeout,
            uds: config.uds,
            defaults: config.defaults,
        }
    }

    /// Root URL, or `uds://<socket-path>`.
    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    /// Use a registered backend by name.
    pub fn backend(mut self, name: impl Into<String>) -> Self {
        self.backend = BackendSelector::Named(name.into());
        self
    }

    /// Construct a backend of type `T`, whether registered or not.
    pub fn backend_type<T: BackendType>(mut self) -> Self {
        self.backend = BackendSelector::Entry(BackendEntry::of::<T>());
        self
    }

    pub fn backend_instance(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = BackendSelector::Instance(backend);
        self
    }

    pub fn backend_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.backend_options.insert(key.into(), value.into());
        self
    }

    pub fn raise_for_status(mut self, flag: bool) -> Self {
        self.flags.raise_for_status = flag;
        self
    }

    pub fn read_response_body(mut self, flag: bool) -> Self {
        self.flags.read_response_body = flag;
        self
    }

    pub fn parse_response_body(mut self, flag: bool) -> Self {
        self.flags.parse_response_body = flag;
        self
    }

    /// Backend request timeout; `None` disables it.
    pub fn timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.timeout = timeout.into();
        self
    }

    pub fn uds(mut self, path: impl Into<PathBuf>) -> Self {
        self.uds = Some(path.into());
        self
    }

    /// Default header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let headers = self
            .defaults
            .entry("headers")
            .or_insert_with(|| Value::Object(Options::new()));
        if !headers.is_object() {
            *headers = Value::Object(Options::new());
        }
        if let Value::Object(headers) = headers {
            headers.insert(name.into(), Value::String(value.into()));
        }
        self
    }

    /// Default request option merged into every call.
    pub fn default_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// Build against the process-wide registry.
    pub fn build(self) -> Result<Client, ApiError> {
        self.build_with_registry(&global_registry())
    }

    pub fn build_with_registry(self, registry: &BackendRegistry) -> Result<Client, ApiError> {
        let (root, uds) = config::normalize_root(&self.root, self.uds)?;

        let backend = match self.backend {
            BackendSelector::Instance(backend) => backend,
            selector => {
                let entry = match selector {
                    BackendSelector::Named(name) => registry.resolve(Some(&name), uds.is_some())?,
                    BackendSelector::Entry(entry) => entry,
                    _ => registry.resolve(None, uds.is_some())?,
                };
                entry.build(BackendConfig {
                    timeout: self.timeout,
                    uds,
                    options: self.backend_options,
                })?
            }
        };

        tracing::debug!(target: "apiclient::http", root = %root, backend = backend.name(), "client created");

        Ok(Client {
            inner: Arc::new(ClientInner {
                root,
                flags: self.flags,
                defaults: self.defaults,
                backend,
                middlewares: MiddlewareChain::new(),
            }),
        })
    }
}

struct ClientInner {
    root: String,
    flags: ResponseFlags,
    defaults: Options,
    backend: Arc<dyn Backend>,
    middlewares: MiddlewareChain,
}

/// Client for one HTTP API. Cloning shares the backend and the middlewares.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Client for `root` using the default backend.
    pub fn new(root: impl Into<String>) -> Result<Self, ApiError> {
        Self::builder().root(root).build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn from_config(config: ClientConfig) -> Result<Self, ApiError> {
        ClientBuilder::from_config(config).build()
    }

    /// A fresh root descriptor bound to this client.
    pub fn api(&self) -> Descriptor<'_> {
        Descriptor::new(self)
    }

    /// Send a request through the pipeline.
    pub async fn request(
        &self,
        method: impl Into<String>,
        url: impl AsRef<str>,
        mut options: Options,
    ) -> Result<ApiResponse, ApiError> {
        merge_defaults(&self.inner.defaults, &mut options);
        let url = self.absolute_url(url.as_ref());

        let request = self
            .inner
            .middlewares
            .run(RequestParts::new(method, url, options))
            .await?;
        let (method, url, mut options) = request.into_parts();
        let flags = FlagOverrides::take_from(&mut options)?.resolve(self.inner.flags);

        tracing::debug!(target: "apiclient::http", backend = self.inner.backend.name(), method = %method, url = %url, "dispatching request");
        self.inner
            .backend
            .request(BackendRequest {
                method,
                url,
                flags,
                options,
            })
            .await
    }

    /// Register a middleware in front of the chain and hand it back.
    pub fn middleware<M: Middleware + 'static>(&self, middleware: M) -> Arc<M> {
        let middleware = Arc::new(middleware);
        self.inner.middlewares.register(middleware.clone());
        middleware
    }

    pub async fn startup(&self) -> Result<(), ApiError> {
        self.inner.backend.startup().await
    }

    pub async fn shutdown(&self) -> Result<(), ApiError> {
        self.inner.backend.shutdown().await
    }

    pub fn root(&self) -> &str {
        &self.inner.root
    }

    pub fn defaults(&self) -> &Options {
        &self.inner.defaults
    }

    pub fn flags(&self) -> ResponseFlags {
        self.inner.flags
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.inner.backend
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.backend.name()
    }

    pub fn middlewares(&self) -> &MiddlewareChain {
        &self.inner.middlewares
    }

    fn absolute_url(&self, url: &str) -> String {
        if config::has_scheme(url) {
            return url.to_string();
        }
        format!(
            "{}/{}",
            self.inner.root.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Dispatch for Client {
    async fn dispatch(
        &self,
        method: String,
        url: String,
        options: Options,
    ) -> Result<ApiResponse, ApiError> {
        self.request(method, url, options).await
    }

    fn body_option(&self) -> &str {
        self.inner.backend.body_option()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<APIClient {}>", self.inner.root)
    }
}
