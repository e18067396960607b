//! Translation of request options into a transport request.
//!
//! Both built-in backends share this vocabulary so a request means the same
//! thing whichever transport sends it:
//!
//! | option    | meaning                                                        |
//! |-----------|----------------------------------------------------------------|
//! | `headers` | object of header values                                        |
//! | `params`  | object (or `[key, value]` pairs) appended as the query string  |
//! | `json`    | JSON body                                                      |
//! | `data`    | string body, or form-encoded body for objects                  |
//! | `content` | string body sent verbatim                                      |
//! | `timeout` | per-request timeout in seconds                                 |

use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde_json::Value;

use crate::error::ApiError;
use crate::types::Options;

const KNOWN_OPTIONS: [&str; 6] = ["headers", "params", "json", "data", "content", "timeout"];

/// A request ready for a transport library.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    /// Absolute URL including the query string.
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    pub fn from_options(method: &str, url: &str, mut options: Options) -> Result<Self, ApiError> {
        let method = Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|e| ApiError::invalid_option("method", format!("{method:?}: {e}")))?;

        let mut headers = match options.remove("headers") {
            None | Some(Value::Null) => HeaderMap::new(),
            Some(value) => header_map(&value).map_err(|e| ApiError::invalid_option("headers", e))?,
        };

        let mut url = url.to_string();
        if let Some(params) = options.remove("params") {
            let query = query_string(&params).map_err(|e| ApiError::invalid_option("params", e))?;
            if !query.is_empty() {
                url.push(if url.contains('?') { '&' } else { '?' });
                url.push_str(&query);
            }
        }

        let timeout = match options.remove("timeout") {
            None | Some(Value::Null) => None,
            Some(value) => Some(seconds(&value).ok_or_else(|| {
                ApiError::invalid_option("timeout", format!("expected seconds, got {value}"))
            })?),
        };

        let body = body(&mut options, &mut headers)?;

        for key in options.keys() {
            if !KNOWN_OPTIONS.contains(&key.as_str()) {
                tracing::warn!(target: "apiclient::http", option=%key, "ignoring unsupported request option");
            }
        }

        Ok(Self {
            method,
            url,
            headers,
            body,
            timeout,
        })
    }

    /// Set a header unless the request already carries it.
    pub fn default_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.entry(name).or_insert(value);
    }
}

fn body(options: &mut Options, headers: &mut HeaderMap) -> Result<Option<Bytes>, ApiError> {
    let json = options.remove("json");
    let data = options.remove("data");
    let content = options.remove("content");

    let given = [&json, &data, &content]
        .iter()
        .filter(|value| value.is_some())
        .count();
    if given > 1 {
        return Err(ApiError::invalid_option(
            "json",
            "only one of 'json', 'data' and 'content' may be set",
        ));
    }

    if let Some(value) = json {
        return json_body(value, headers).map(Some);
    }

    match data {
        Some(Value::String(text)) => return Ok(Some(Bytes::from(text))),
        Some(Value::Object(fields)) => {
            let form = form_encode(&fields).map_err(|e| ApiError::invalid_option("data", e))?;
            set_content_type(headers, "application/x-www-form-urlencoded");
            return Ok(Some(Bytes::from(form)));
        }
        Some(value) => return json_body(value, headers).map(Some),
        None => {}
    }

    match content {
        None => Ok(None),
        Some(Value::String(text)) => Ok(Some(Bytes::from(text))),
        Some(other) => Err(ApiError::invalid_option(
            "content",
            format!("expected a string, got {other}"),
        )),
    }
}

fn json_body(value: Value, headers: &mut HeaderMap) -> Result<Bytes, ApiError> {
    let bytes = serde_json::to_vec(&value)?;
    set_content_type(headers, "application/json");
    Ok(Bytes::from(bytes))
}

fn set_content_type(headers: &mut HeaderMap, content_type: &'static str) {
    headers
        .entry(CONTENT_TYPE)
        .or_insert(HeaderValue::from_static(content_type));
}

/// Render an error with its source chain, `outer: inner: ...`.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

/// Seconds given as a non-negative number.
pub(crate) fn seconds(value: &Value) -> Option<Duration> {
    value
        .as_f64()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Build a header map from an object of scalar values.
pub(crate) fn header_map(value: &Value) -> Result<HeaderMap, String> {
    let Value::Object(entries) = value else {
        return Err(format!("expected an object, got {value}"));
    };

    let mut headers = HeaderMap::with_capacity(entries.len());
    for (name, value) in entries {
        let Some(value) = scalar(value) else {
            if value.is_null() {
                continue;
            }
            return Err(format!("header '{name}' must be a string, got {value}"));
        };
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| format!("invalid header name '{name}': {e}"))?;
        let header_value = HeaderValue::from_str(&value)
            .map_err(|e| format!("invalid value for header '{name}': {e}"))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn pairs(value: &Value) -> Result<Vec<(String, String)>, String> {
    let mut out = Vec::new();
    let mut push = |key: &str, value: &Value| -> Result<(), String> {
        match value {
            Value::Null => Ok(()),
            Value::Array(items) => {
                for item in items {
                    let item = scalar(item)
                        .ok_or_else(|| format!("value for '{key}' must be a scalar, got {item}"))?;
                    out.push((key.to_string(), item));
                }
                Ok(())
            }
            other => {
                let other = scalar(other)
                    .ok_or_else(|| format!("value for '{key}' must be a scalar, got {other}"))?;
                out.push((key.to_string(), other));
                Ok(())
            }
        }
    };

    match value {
        Value::Null => {}
        Value::Object(entries) => {
            for (key, value) in entries {
                push(key, value)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                match item.as_array().map(Vec::as_slice) {
                    Some([Value::String(key), value]) => push(key, value)?,
                    _ => return Err(format!("expected a [key, value] pair, got {item}")),
                }
            }
        }
        other => return Err(format!("expected an object or a list of pairs, got {other}")),
    }
    Ok(out)
}

fn encode_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn query_string(value: &Value) -> Result<String, String> {
    pairs(value).map(|pairs| encode_pairs(&pairs))
}

fn form_encode(fields: &Options) -> Result<String, String> {
    pairs(&Value::Object(fields.clone())).map(|pairs| encode_pairs(&pairs))
}
