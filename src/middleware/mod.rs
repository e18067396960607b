//! Request middleware
//!
//! A middleware is an async transform over the `(method, url, options)` of a
//! request, run by the client after defaults are merged and before the backend
//! is called. The chain is LIFO: the most recently registered middleware runs
//! first. Any error a middleware returns propagates to the caller unchanged.
//!
//! Closures work as middlewares:
//!
//! ```rust,ignore
//! client.middleware(|mut req: RequestParts| async move {
//!     req.header("X-Timestamp", "12345");
//!     Ok::<_, ApiError>(req)
//! });
//! ```

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ApiError;
use crate::types::Options;

pub mod samples;

pub use samples::{HeaderMiddleware, LoggingMiddleware};

/// The request triple a middleware receives and returns.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestParts {
    pub method: String,
    pub url: String,
    pub options: Options,
}

impl RequestParts {
    pub fn new(method: impl Into<String>, url: impl Into<String>, options: Options) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            options,
        }
    }

    /// Set a header in the `headers` option, creating the object if needed.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let headers = self
            .options
            .entry("headers")
            .or_insert_with(|| Value::Object(Options::new()));
        if !headers.is_object() {
            *headers = Value::Object(Options::new());
        }
        if let Value::Object(map) = headers {
            map.insert(name.into(), Value::String(value.into()));
        }
        self
    }

    /// Header value from the `headers` option, if it is a string.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.options
            .get("headers")?
            .as_object()?
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| value.as_str())
    }

    pub fn into_parts(self) -> (String, String, Options) {
        (self.method, self.url, self.options)
    }
}

/// Async transform applied to every request before dispatch.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, request: RequestParts) -> Result<RequestParts, ApiError>;
}

#[async_trait]
impl<F, Fut> Middleware for F
where
    F: Fn(RequestParts) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RequestParts, ApiError>> + Send + 'static,
{
    async fn handle(&self, request: RequestParts) -> Result<RequestParts, ApiError> {
        (self)(request).await
    }
}

/// Ordered middleware list shared by a client.
#[derive(Default)]
pub struct MiddlewareChain {
    middlewares: RwLock<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the front: the newest middleware runs first.
    pub fn register(&self, middleware: Arc<dyn Middleware>) {
        self.middlewares
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(0, middleware);
    }

    pub fn len(&self) -> usize {
        self.middlewares
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current chain, so no lock is held across awaits.
    pub fn snapshot(&self) -> Vec<Arc<dyn Middleware>> {
        self.middlewares
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run every middleware in order, sequentially.
    pub async fn run(&self, mut request: RequestParts) -> Result<RequestParts, ApiError> {
        for (index, middleware) in self.snapshot().iter().enumerate() {
            tracing::trace!(target: "apiclient::middleware", index, method=%request.method, url=%request.url, "running middleware");
            request = middleware.handle(request).await?;
        }
        Ok(request)
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("len", &self.len())
            .finish()
    }
}
