//! Ready-made middlewares.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::middleware::{Middleware, RequestParts};

/// Logs every outgoing request through `tracing` (header values are not logged).
#[derive(Clone, Debug, Default)]
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(&self, request: RequestParts) -> Result<RequestParts, ApiError> {
        let header_names: Vec<&str> = request
            .options
            .get("headers")
            .and_then(|headers| headers.as_object())
            .map(|headers| headers.keys().map(String::as_str).collect())
            .unwrap_or_default();
        tracing::debug!(target: "apiclient::http", method=%request.method, url=%request.url, headers=?header_names, "sending request");
        Ok(request)
    }
}

/// Sets a header on every request that does not already carry it.
#[derive(Clone, Debug)]
pub struct HeaderMiddleware {
    name: String,
    value: String,
}

impl HeaderMiddleware {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// `Authorization: Bearer <token>`.
    pub fn bearer(token: &str) -> Self {
        Self::new("Authorization", format!("Bearer {token}"))
    }
}

#[async_trait]
impl Middleware for HeaderMiddleware {
    async fn handle(&self, mut request: RequestParts) -> Result<RequestParts, ApiError> {
        if request.header_value(&self.name).is_none() {
            request.header(self.name.clone(), self.value.clone());
        }
        Ok(request)
    }
}
