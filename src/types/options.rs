//! Request options.
//!
//! Options travel as a JSON object so arbitrary per-call settings (headers,
//! query params, body, timeout, ...) can flow from client defaults through the
//! middlewares to a backend. Three keys are reserved for response handling and
//! are consumed before the transport sees the request.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

/// Free-form request options.
pub type Options = serde_json::Map<String, Value>;

pub const RAISE_FOR_STATUS: &str = "raise_for_status";
pub const READ_RESPONSE_BODY: &str = "read_response_body";
pub const PARSE_RESPONSE_BODY: &str = "parse_response_body";

/// Option keys consumed by the client and never forwarded to a transport.
pub const RESERVED_OPTIONS: [&str; 3] = [RAISE_FOR_STATUS, READ_RESPONSE_BODY, PARSE_RESPONSE_BODY];

/// Resolved response-handling flags handed to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFlags {
    /// Fail with a status error when the response status is >= 400.
    pub raise_for_status: bool,
    /// Consume the body. When off, the live response is returned.
    pub read_response_body: bool,
    /// Decode the body by content-type instead of returning it raw.
    pub parse_response_body: bool,
}

impl Default for ResponseFlags {
    fn default() -> Self {
        Self {
            raise_for_status: true,
            read_response_body: true,
            parse_response_body: true,
        }
    }
}

/// Per-call flag overrides. `None` means "use the client default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagOverrides {
    pub raise_for_status: Option<bool>,
    pub read_response_body: Option<bool>,
    pub parse_response_body: Option<bool>,
}

impl FlagOverrides {
    /// Remove the reserved keys from `options` and return them as overrides.
    ///
    /// A `null` value counts as absent; anything else that is not a bool is
    /// rejected.
    pub fn take_from(options: &mut Options) -> Result<Self, ApiError> {
        Ok(Self {
            raise_for_status: take_flag(options, RAISE_FOR_STATUS)?,
            read_response_body: take_flag(options, READ_RESPONSE_BODY)?,
            parse_response_body: take_flag(options, PARSE_RESPONSE_BODY)?,
        })
    }

    /// Fill unset overrides from the client defaults.
    pub fn resolve(self, defaults: ResponseFlags) -> ResponseFlags {
        ResponseFlags {
            raise_for_status: self.raise_for_status.unwrap_or(defaults.raise_for_status),
            read_response_body: self
                .read_response_body
                .unwrap_or(defaults.read_response_body),
            parse_response_body: self
                .parse_response_body
                .unwrap_or(defaults.parse_response_body),
        }
    }
}

fn take_flag(options: &mut Options, key: &str) -> Result<Option<bool>, ApiError> {
    match options.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(flag)),
        Some(other) => Err(ApiError::invalid_option(
            key,
            format!("expected a bool, got {other}"),
        )),
    }
}

/// Layer client defaults under the call's options.
///
/// Keys missing from the call get a fresh copy of the default. When both
/// sides hold an object the call's entries are merged over the default's
/// instead of replacing it; for any other shape the call's value wins.
pub fn merge_defaults(defaults: &Options, options: &mut Options) {
    for (key, default) in defaults {
        match options.get_mut(key) {
            None => {
                options.insert(key.clone(), default.clone());
            }
            Some(Value::Object(call)) => {
                if let Value::Object(base) = default {
                    let mut merged = base.clone();
                    merged.extend(std::mem::take(call));
                    *call = merged;
                }
            }
            Some(_) => {}
        }
    }
}
