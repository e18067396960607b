//! Serializable client configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::ApiError;
use crate::types::{Options, ResponseFlags};

/// Everything a [`crate::Client`] is built from.
///
/// Keys this struct does not know about are collected into `defaults`, so a
/// JSON document like `{"root": "...", "headers": {...}}` configures default
/// headers for every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root URL, `uds://<socket-path>` for unix sockets.
    #[serde(default)]
    pub root: String,
    /// Registered backend name; the first registered backend when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    /// Options handed to the backend constructor.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub backend_options: Options,
    #[serde(default = "enabled")]
    pub raise_for_status: bool,
    #[serde(default = "enabled")]
    pub read_response_body: bool,
    #[serde(default = "enabled")]
    pub parse_response_body: bool,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout", with = "duration_secs_serde")]
    pub timeout: Option<Duration>,
    /// Socket path, alternative to a `uds://` root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uds: Option<PathBuf>,
    /// Default request options.
    #[serde(flatten)]
    pub defaults: Options,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            root: String::new(),
            backend: None,
            backend_options: Options::new(),
            raise_for_status: true,
            read_response_body: true,
            parse_response_body: true,
            timeout: default_timeout(),
            uds: None,
            defaults: Options::new(),
        }
    }
}

impl ClientConfig {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ApiError> {
        serde_json::from_str(json)
            .map_err(|e| ApiError::ConfigurationError(format!("Invalid client configuration: {e}")))
    }

    pub fn flags(&self) -> ResponseFlags {
        ResponseFlags {
            raise_for_status: self.raise_for_status,
            read_response_body: self.read_response_body,
            parse_response_body: self.parse_response_body,
        }
    }
}

fn enabled() -> bool {
    true
}

fn default_timeout() -> Option<Duration> {
    Some(defaults::http::REQUEST_TIMEOUT)
}

// Durations as (fractional) seconds
mod duration_secs_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => d.as_secs_f64().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<f64> = Option::deserialize(deserializer)?;
        secs.map(|secs| {
            Duration::try_from_secs_f64(secs)
                .map_err(|_| D::Error::custom(format!("invalid timeout: {secs}")))
        })
        .transpose()
    }
}

/// Split a root into the URL requests are built on and an optional socket path.
///
/// `uds:///var/run/app.sock` becomes `("http://socket", Some("/var/run/app.sock"))`.
pub(crate) fn normalize_root(
    root: &str,
    uds: Option<PathBuf>,
) -> Result<(String, Option<PathBuf>), ApiError> {
    if let Some(path) = root.strip_prefix(defaults::http::UDS_SCHEME) {
        if path.is_empty() {
            return Err(ApiError::ConfigurationError(format!(
                "Missing socket path in root '{root}'"
            )));
        }
        return Ok((defaults::http::UDS_ROOT.to_string(), Some(PathBuf::from(path))));
    }

    let root = root.trim_end_matches('/');
    if uds.is_some() && root.is_empty() {
        return Ok((defaults::http::UDS_ROOT.to_string(), uds));
    }
    if !root.is_empty() && !has_scheme(root) {
        return Err(ApiError::ConfigurationError(format!(
            "Root URL '{root}' must be absolute"
        )));
    }
    Ok((root.to_string(), uds))
}

/// Whether `url` starts with `scheme://`.
pub(crate) fn has_scheme(url: &str) -> bool {
    match url.split_once("://") {
        Some((scheme, _)) => {
            let mut chars = scheme.chars();
            chars.next().is_some_and(|c| c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
