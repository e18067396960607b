//! Transport backends
//!
//! A backend adapts one HTTP library to the client. It owns its transport
//! client (created lazily or injected), consumes the response-handling flags
//! and turns every other option into a transport request.
//!
//! Built-in backends are compiled behind Cargo features and register
//! themselves in the [`crate::registry`] only when enabled:
//!
//! - `reqwest` (default): [`reqwest_backend::ReqwestBackend`]
//! - `hyper` (default): [`hyper_backend::HyperBackend`], which can also talk over a
//!   unix domain socket

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use serde_json::Value;

use crate::descriptor::DEFAULT_BODY_OPTION;
use crate::error::ApiError;
use crate::types::{ApiResponse, BodyStream, LiveResponse, Options, ResponseFlags};

pub mod transport;

#[cfg(feature = "hyper")]
pub mod hyper_backend;
#[cfg(feature = "reqwest")]
pub mod reqwest_backend;
#[cfg(all(unix, feature = "hyper"))]
pub mod uds;

pub use transport::TransportRequest;

#[cfg(feature = "hyper")]
pub use hyper_backend::HyperBackend;
#[cfg(feature = "reqwest")]
pub use reqwest_backend::ReqwestBackend;

/// What a backend constructor receives from the client.
#[derive(Debug, Clone, Default)]
pub struct BackendConfig {
    /// Default request timeout.
    pub timeout: Option<Duration>,
    /// Unix domain socket to route every request through.
    pub uds: Option<PathBuf>,
    /// Backend specific options.
    pub options: Options,
}

impl BackendConfig {
    pub fn string_option(&self, key: &str) -> Result<Option<String>, ApiError> {
        match self.options.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.clone())),
            Some(other) => Err(backend_option_error(key, format!("expected a string, got {other}"))),
        }
    }

    /// Option given in (fractional) seconds.
    pub fn duration_option(&self, key: &str) -> Result<Option<Duration>, ApiError> {
        match self.options.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => transport::seconds(value)
                .map(Some)
                .ok_or_else(|| backend_option_error(key, format!("expected seconds, got {value}"))),
        }
    }

    pub fn usize_option(&self, key: &str) -> Result<Option<usize>, ApiError> {
        match self.options.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| backend_option_error(key, format!("expected an integer, got {value}"))),
        }
    }

    /// Transport-level default headers from the `headers` option.
    pub fn headers_option(&self) -> Result<HeaderMap, ApiError> {
        match self.options.get("headers") {
            None | Some(Value::Null) => Ok(HeaderMap::new()),
            Some(value) => transport::header_map(value)
                .map_err(|e| ApiError::ConfigurationError(format!("Invalid backend option 'headers': {e}"))),
        }
    }
}

fn backend_option_error(key: &str, message: String) -> ApiError {
    ApiError::ConfigurationError(format!("Invalid backend option '{key}': {message}"))
}

/// A request as handed to a backend, after defaults and middlewares.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendRequest {
    pub method: String,
    pub url: String,
    pub flags: ResponseFlags,
    /// Pass-through options for the transport.
    pub options: Options,
}

/// Capability set every transport adapter implements.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Registry key of this backend.
    fn name(&self) -> &'static str;

    /// Option key the descriptor attaches a positional body under.
    fn body_option(&self) -> &'static str {
        DEFAULT_BODY_OPTION
    }

    /// Prepare the transport client. Idempotent.
    async fn startup(&self) -> Result<(), ApiError> {
        Ok(())
    }

    /// Release the transport client. Safe without a prior startup.
    async fn shutdown(&self) -> Result<(), ApiError> {
        Ok(())
    }

    async fn request(&self, request: BackendRequest) -> Result<ApiResponse, ApiError>;
}

/// A backend the registry can construct from a [`BackendConfig`].
pub trait BackendType: Backend + Sized + 'static {
    const NAME: &'static str;

    /// Whether `BackendConfig::uds` is honoured.
    const SUPPORTS_UDS: bool = false;

    fn from_config(config: BackendConfig) -> Result<Self, ApiError>;
}

/// Apply the response-handling flags to a received response.
///
/// On a failure status with `raise_for_status`, the body is still drained
/// when `read_response_body` is on and carried by the status error.
pub(crate) async fn finish_response(
    backend: &'static str,
    url: &str,
    flags: ResponseFlags,
    status: StatusCode,
    headers: HeaderMap,
    body: BodyStream,
) -> Result<ApiResponse, ApiError> {
    tracing::debug!(target: "apiclient::http", backend, url, status=%status.as_u16(), "response received");
    let live = LiveResponse::new(status, headers, body);

    if flags.raise_for_status && (status.is_client_error() || status.is_server_error()) {
        let body = if flags.read_response_body {
            match live.text().await {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::debug!(target: "apiclient::http", backend, url, error = %e, "failed to read error body");
                    None
                }
            }
        } else {
            live.close();
            None
        };
        tracing::debug!(target: "apiclient::http", backend, url, status=%status.as_u16(), "status error");
        return Err(ApiError::StatusError {
            code: status.as_u16(),
            url: url.to_string(),
            body,
        });
    }

    if !flags.read_response_body {
        return Ok(ApiResponse::Live(live));
    }

    let raw = live.read().await?;
    if flags.parse_response_body {
        Ok(raw.parse())
    } else {
        Ok(ApiResponse::Raw(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::StreamExt;
    use http::{HeaderValue, header::CONTENT_TYPE};
    use serde_json::json;

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn body(bytes: &'static [u8]) -> BodyStream {
        futures::stream::iter(vec![Ok(Bytes::from_static(bytes))]).boxed()
    }

    fn flags(raise: bool, read: bool, parse: bool) -> ResponseFlags {
        ResponseFlags {
            raise_for_status: raise,
            read_response_body: read,
            parse_response_body: parse,
        }
    }

    #[tokio::test]
    async fn test_success_is_parsed() {
        let res = finish_response(
            "test",
            "/x",
            ResponseFlags::default(),
            StatusCode::OK,
            json_headers(),
            body(br#"{"ok": true}"#),
        )
        .await
        .unwrap();
        assert_eq!(res.as_json(), Some(&json!({"ok": true})));
    }

    #[tokio::test]
    async fn test_failure_status_carries_drained_body() {
        let err = finish_response(
            "test",
            "/missing",
            ResponseFlags::default(),
            StatusCode::NOT_FOUND,
            json_headers(),
            body(br#"{"message": "Not Found"}"#),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            ApiError::StatusError {
                code: 404,
                url: "/missing".into(),
                body: Some(r#"{"message": "Not Found"}"#.into()),
            }
        );
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_failure_status_logs_unreadable_body() {
        let chunks = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(ApiError::HttpError {
                backend: "test",
                message: "connection reset".into(),
            }),
        ];
        let err = finish_response(
            "test",
            "/flaky",
            ResponseFlags::default(),
            StatusCode::BAD_GATEWAY,
            HeaderMap::new(),
            futures::stream::iter(chunks).boxed(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), Some(502));
        assert_eq!(err.body(), None);
        assert!(logs_contain("failed to read error body"));
        assert!(logs_contain("connection reset"));
    }

    #[tokio::test]
    async fn test_failure_status_without_reading_body() {
        let err = finish_response(
            "test",
            "/missing",
            flags(true, false, true),
            StatusCode::INTERNAL_SERVER_ERROR,
            HeaderMap::new(),
            body(b"boom"),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(err.body(), None);
    }

    #[tokio::test]
    async fn test_failure_status_not_raised_when_disabled() {
        let res = finish_response(
            "test",
            "/missing",
            flags(false, true, true),
            StatusCode::NOT_FOUND,
            HeaderMap::new(),
            body(b"nothing here"),
        )
        .await
        .unwrap();
        assert_eq!(res.as_text(), Some("nothing here"));
    }

    #[tokio::test]
    async fn test_redirect_status_is_not_an_error() {
        let res = finish_response(
            "test",
            "/moved",
            ResponseFlags::default(),
            StatusCode::FOUND,
            HeaderMap::new(),
            body(b""),
        )
        .await
        .unwrap();
        assert_eq!(res.as_text(), Some(""));
    }

    #[tokio::test]
    async fn test_unparsed_and_live_responses() {
        let raw = finish_response(
            "test",
            "/x",
            flags(true, true, false),
            StatusCode::OK,
            json_headers(),
            body(br#"{"ok": true}"#),
        )
        .await
        .unwrap();
        match raw {
            ApiResponse::Raw(raw) => assert_eq!(raw.body, Bytes::from_static(br#"{"ok": true}"#)),
            other => panic!("expected raw response, got {other:?}"),
        }

        let live = finish_response(
            "test",
            "/x",
            flags(true, false, true),
            StatusCode::OK,
            json_headers(),
            body(br#"{"ok": true}"#),
        )
        .await
        .unwrap();
        assert_eq!(live.status(), Some(StatusCode::OK));
        match live {
            ApiResponse::Live(live) => {
                let value: serde_json::Value = live.json().await.unwrap();
                assert_eq!(value, json!({"ok": true}));
            }
            other => panic!("expected live response, got {other:?}"),
        }
    }

    #[test]
    fn test_backend_config_options() {
        let mut options = Options::new();
        options.insert("user_agent".into(), json!("agent/1.0"));
        options.insert("connect_timeout".into(), json!(1.5));
        options.insert("pool_max_idle_per_host".into(), json!(4));
        options.insert("headers".into(), json!({"X-Api": "v2"}));
        let config = BackendConfig {
            options,
            ..Default::default()
        };
        assert_eq!(config.string_option("user_agent").unwrap().as_deref(), Some("agent/1.0"));
        assert_eq!(
            config.duration_option("connect_timeout").unwrap(),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(config.usize_option("pool_max_idle_per_host").unwrap(), Some(4));
        assert_eq!(config.headers_option().unwrap()["x-api"], "v2");
        assert_eq!(config.string_option("proxy").unwrap(), None);
    }

    #[test]
    fn test_backend_config_rejects_wrong_types() {
        let mut options = Options::new();
        options.insert("user_agent".into(), json!(42));
        options.insert("connect_timeout".into(), json!("soon"));
        let config = BackendConfig {
            options,
            ..Default::default()
        };
        assert!(config.string_option("user_agent").unwrap_err().is_configuration_error());
        assert!(config.duration_option("connect_timeout").unwrap_err().is_configuration_error());
    }
}
