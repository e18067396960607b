//! Error Handling
//!
//! A single error type, [`ApiError`], covers every failure the client can
//! surface. Backends map their transport errors into it, so callers catch one
//! kind regardless of which backend is active.
//!
//! # Example
//!
//! ```rust,ignore
//! use apiclient::ApiError;
//!
//! let error = ApiError::StatusError { code: 404, url: "/users/x".into(), body: None };
//! assert!(error.is_backend_error());
//! assert_eq!(error.status_code(), Some(404));
//! ```

use thiserror::Error;

/// Errors returned by the client, the middlewares and the backends.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The client could not be configured (no backend, bad root URL, ...).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A request option had the wrong shape.
    #[error("Invalid option '{key}': {message}")]
    InvalidOption { key: String, message: String },

    /// Connection-level failure reported by a backend.
    #[error("HTTP error ({backend}): {message}")]
    HttpError {
        backend: &'static str,
        message: String,
    },

    /// The response status indicated failure and `raise_for_status` was on.
    #[error("HTTP status {code} for {url}")]
    StatusError {
        code: u16,
        url: String,
        /// Drained body, present when the request asked to read it.
        body: Option<String>,
    },

    /// Explicit JSON decoding of a response body failed.
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Raised by a middleware.
    #[error("Middleware error: {0}")]
    MiddlewareError(String),
}

impl ApiError {
    /// Build an [`ApiError::InvalidOption`].
    pub fn invalid_option(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Build an [`ApiError::MiddlewareError`] from anything printable.
    pub fn middleware(message: impl std::fmt::Display) -> Self {
        Self::MiddlewareError(message.to_string())
    }

    /// True for the backend's own error kind: transport and status failures.
    pub fn is_backend_error(&self) -> bool {
        matches!(self, Self::HttpError { .. } | Self::StatusError { .. })
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::ConfigurationError(_))
    }

    /// HTTP status code carried by a status error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::StatusError { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Body drained from a failed response, when it was read.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::StatusError { body, .. } => body.as_deref(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::HttpError {
            backend: <crate::backend::ReqwestBackend as crate::backend::BackendType>::NAME,
            message: crate::backend::transport::error_chain(&err),
        }
    }
}

#[cfg(feature = "hyper")]
impl From<hyper_util::client::legacy::Error> for ApiError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        Self::HttpError {
            backend: <crate::backend::HyperBackend as crate::backend::BackendType>::NAME,
            message: crate::backend::transport::error_chain(&err),
        }
    }
}

#[cfg(feature = "hyper")]
impl From<hyper::Error> for ApiError {
    fn from(err: hyper::Error) -> Self {
        Self::HttpError {
            backend: <crate::backend::HyperBackend as crate::backend::BackendType>::NAME,
            message: crate::backend::transport::error_chain(&err),
        }
    }
}
