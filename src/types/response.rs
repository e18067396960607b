//! Response values returned by backends.

use std::fmt;

use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use futures::StreamExt;
use futures::stream::BoxStream;
use http::{HeaderMap, StatusCode, header::CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// Body stream of a response that has not been read yet.
pub type BodyStream = BoxStream<'static, Result<Bytes, ApiError>>;

/// Result of a request.
#[derive(Debug)]
pub enum ApiResponse {
    /// Body decoded from an `application/json` response.
    Json(Value),
    /// Body decoded as text.
    Text(String),
    /// Body read but left unparsed.
    Raw(RawResponse),
    /// Body not read; the caller owns the live response.
    Live(LiveResponse),
}

impl ApiResponse {
    /// Status code, for raw and live responses.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Raw(raw) => Some(raw.status),
            Self::Live(live) => Some(live.status),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Deserialize a parsed JSON body into `T`.
    pub fn into_json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        match self {
            Self::Json(value) => Ok(serde_json::from_value(value)?),
            Self::Raw(raw) => raw.json(),
            Self::Text(_) => Err(ApiError::JsonError("response body is not JSON".into())),
            Self::Live(_) => Err(ApiError::JsonError(
                "response body was not read; use LiveResponse::json".into(),
            )),
        }
    }
}

/// A response whose body was read but not parsed.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    /// Body decoded with the content-type charset.
    pub fn text(&self) -> String {
        decode_text(&self.headers, &self.body)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Apply the content-type parsing policy to this response.
    pub fn parse(self) -> ApiResponse {
        parse_body(&self.headers, self.body)
    }
}

/// A response whose body has not been consumed.
///
/// Dropping it (or calling [`LiveResponse::close`]) releases the connection.
pub struct LiveResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body: BodyStream,
}

impl LiveResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: BodyStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Borrow the body stream.
    pub fn body_mut(&mut self) -> &mut BodyStream {
        &mut self.body
    }

    pub fn into_stream(self) -> BodyStream {
        self.body
    }

    /// Drain the body.
    pub async fn bytes(self) -> Result<Bytes, ApiError> {
        let mut body = self.body;
        let mut buf = Vec::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(buf))
    }

    pub async fn text(self) -> Result<String, ApiError> {
        let headers = self.headers.clone();
        let bytes = self.bytes().await?;
        Ok(decode_text(&headers, &bytes))
    }

    pub async fn json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Read the body into a [`RawResponse`].
    pub async fn read(self) -> Result<RawResponse, ApiError> {
        let status = self.status;
        let headers = self.headers.clone();
        let body = self.bytes().await?;
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    /// Release the response without reading the body.
    pub fn close(self) {}
}

impl fmt::Debug for LiveResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// The `charset` parameter of a content-type, unquoted.
fn charset(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

/// Decode a body as text using the content-type charset, UTF-8 when absent or unknown.
pub fn decode_text(headers: &HeaderMap, body: &[u8]) -> String {
    let encoding = charset(content_type(headers))
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

/// Decode a body by the response content-type.
///
/// `application/json` bodies are decoded as JSON and fall back to text when
/// the payload is malformed; everything else is returned as text.
pub fn parse_body(headers: &HeaderMap, body: Bytes) -> ApiResponse {
    let content_type = content_type(headers);

    if content_type.starts_with("application/json") {
        match serde_json::from_slice(&body) {
            Ok(value) => return ApiResponse::Json(value),
            Err(e) => {
                tracing::debug!(target: "apiclient::http", error=%e, "malformed JSON body, returning text");
            }
        }
    }

    ApiResponse::Text(decode_text(headers, &body))
}
