//! Path descriptors.
//!
//! A [`Descriptor`] is a request under construction: each [`Descriptor::at`]
//! returns a new descriptor with one more path segment, and [`Descriptor::call`]
//! resolves the segments into an HTTP method and URL before handing them to a
//! [`Dispatch`] implementation (usually a [`crate::Client`]).
//!
//! ```rust,ignore
//! let api = client.api();
//! // POST /users/42/repos
//! let repo = api.at("users").at(42).at("repos").at("post")
//!     .call()
//!     .body(json!({"name": "hello"}))
//!     .await?;
//! ```

use std::fmt;
use std::future::IntoFuture;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::ApiError;
use crate::types::{
    ApiResponse, Options, PARSE_RESPONSE_BODY, RAISE_FOR_STATUS, READ_RESPONSE_BODY,
};

/// Verbs recognised as the trailing segment of a path.
pub const HTTP_METHODS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Option under which a positional body is attached unless a backend says otherwise.
pub const DEFAULT_BODY_OPTION: &str = "json";

/// Options that already carry a request body.
pub const BODY_OPTIONS: [&str; 3] = ["json", "data", "content"];

/// The request function a descriptor resolves into.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(
        &self,
        method: String,
        url: String,
        options: Options,
    ) -> Result<ApiResponse, ApiError>;

    /// Option key a positional body is attached under.
    fn body_option(&self) -> &str {
        DEFAULT_BODY_OPTION
    }
}

/// A lazily built request path.
#[derive(Clone)]
pub struct Descriptor<'a> {
    dispatch: &'a dyn Dispatch,
    segments: Vec<String>,
}

impl<'a> Descriptor<'a> {
    /// Root descriptor (`/`) bound to `dispatch`.
    pub fn new(dispatch: &'a dyn Dispatch) -> Self {
        Self {
            dispatch,
            segments: Vec::new(),
        }
    }

    /// Child descriptor with `key` appended as a segment.
    ///
    /// The key is stringified and stripped of surrounding slashes, so
    /// `at("/custom/path")` appends `custom/path`.
    pub fn at(&self, key: impl fmt::Display) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(key.to_string().trim_matches('/').to_string());
        Self {
            dispatch: self.dispatch,
            segments,
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolve the method and path.
    ///
    /// Without an explicit `method`, a trailing segment naming an HTTP verb is
    /// taken as the method and dropped from the path. The descriptor itself is
    /// never modified.
    pub fn render(&self, method: Option<&str>) -> (String, String) {
        let method = method.filter(|m| !m.is_empty());
        let mut parts = self.segments.as_slice();
        let mut verb = None;

        if method.is_none()
            && let Some((last, rest)) = parts.split_last()
            && HTTP_METHODS.contains(&last.to_uppercase().as_str())
        {
            verb = Some(last.as_str());
            parts = rest;
        }

        let url = format!("/{}", parts.join("/"));
        let method = method.or(verb).unwrap_or("GET").to_uppercase();
        (method, url)
    }

    /// Start the terminal call.
    pub fn call(&self) -> Call<'a> {
        Call {
            descriptor: self.clone(),
            body: None,
            method: None,
            options: Options::new(),
        }
    }
}

impl fmt::Display for Descriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (method, url) = self.render(None);
        write!(f, "{method} {url}")
    }
}

impl fmt::Debug for Descriptor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "URL: {self}")
    }
}

/// A pending call on a descriptor. Await it to send the request.
#[must_use = "a call does nothing until it is awaited"]
pub struct Call<'a> {
    descriptor: Descriptor<'a>,
    body: Option<Value>,
    method: Option<String>,
    options: Options,
}

impl<'a> Call<'a> {
    /// Positional body, attached under the dispatcher's body option.
    pub fn body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Explicit method; the trailing segment is then kept as a path segment.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options.extend(options);
        self
    }

    pub fn header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.nested("headers", name.into(), Value::String(value.into()))
    }

    pub fn query(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.nested("params", name.into(), value.into())
    }

    pub fn raise_for_status(self, flag: bool) -> Self {
        self.option(RAISE_FOR_STATUS, flag)
    }

    pub fn read_response_body(self, flag: bool) -> Self {
        self.option(READ_RESPONSE_BODY, flag)
    }

    pub fn parse_response_body(self, flag: bool) -> Self {
        self.option(PARSE_RESPONSE_BODY, flag)
    }

    fn nested(mut self, option: &str, name: String, value: Value) -> Self {
        let entry = self
            .options
            .entry(option)
            .or_insert_with(|| Value::Object(Options::new()));
        if !entry.is_object() {
            *entry = Value::Object(Options::new());
        }
        if let Value::Object(map) = entry {
            map.insert(name, value);
        }
        self
    }

    /// Resolve into the `(method, url, options)` triple handed to the dispatcher.
    pub fn prepare(self) -> (String, String, Options) {
        let (method, url) = self.descriptor.render(self.method.as_deref());
        let mut options = self.options;

        if let Some(body) = self.body.filter(|body| !body.is_null())
            && !BODY_OPTIONS.iter().any(|key| options.contains_key(*key))
        {
            options.insert(self.descriptor.dispatch.body_option().to_string(), body);
        }

        (method, url, options)
    }

    pub fn send(self) -> BoxFuture<'a, Result<ApiResponse, ApiError>> {
        let dispatch = self.descriptor.dispatch;
        let (method, url, options) = self.prepare();
        dispatch.dispatch(method, url, options)
    }
}

impl<'a> IntoFuture for Call<'a> {
    type Output = Result<ApiResponse, ApiError>;
    type IntoFuture = BoxFuture<'a, Result<ApiResponse, ApiError>>;

    fn into_future(self) -> Self::IntoFuture {
        self.send()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, String, Options)>>,
    }

    impl Recorder {
        fn last(&self) -> (String, String, Value) {
            let calls = self.calls.lock().unwrap();
            let (method, url, options) = calls.last().cloned().unwrap();
            (method, url, Value::Object(options))
        }
    }

    #[async_trait]
    impl Dispatch for Recorder {
        async fn dispatch(
            &self,
            method: String,
            url: String,
            options: Options,
        ) -> Result<ApiResponse, ApiError> {
            self.calls.lock().unwrap().push((method, url, options));
            Ok(ApiResponse::Text("ok".into()))
        }
    }

    #[test]
    fn test_render_defaults_to_get_root() {
        let recorder = Recorder::default();
        let api = Descriptor::new(&recorder);
        assert_eq!(api.to_string(), "GET /");
        assert_eq!(api.at("users").to_string(), "GET /users");
    }

    #[test]
    fn test_trailing_verb_becomes_method() {
        let recorder = Recorder::default();
        let api = Descriptor::new(&recorder);
        assert_eq!(
            api.at("groups").at(1).at("users").at("post").to_string(),
            "POST /groups/1/users"
        );
        assert_eq!(
            api.at("users").at(1).at("post").at("post").to_string(),
            "POST /users/1/post"
        );
        assert_eq!(api.at("items").at("Delete").to_string(), "DELETE /items");
        assert_eq!(api.at("get").to_string(), "GET /");
    }

    #[test]
    fn test_explicit_method_keeps_verb_segment() {
        let recorder = Recorder::default();
        let api = Descriptor::new(&recorder);
        let put = api.at("a").at("put");
        assert_eq!(
            put.render(Some("post")),
            ("POST".to_string(), "/a/put".to_string())
        );
        assert_eq!(put.render(Some("")), ("PUT".to_string(), "/a".to_string()));
    }

    #[test]
    fn test_segments_are_stripped_of_slashes() {
        let recorder = Recorder::default();
        let api = Descriptor::new(&recorder);
        let custom = api.at("users").at(42).at("/custom/path/");
        assert_eq!(custom.segments(), ["users", "42", "custom/path"]);
        assert_eq!(custom.to_string(), "GET /users/42/custom/path");
    }

    #[test]
    fn test_each_access_builds_a_new_descriptor() {
        let recorder = Recorder::default();
        let api = Descriptor::new(&recorder);
        let first = api.at("users");
        let second = api.at("users");
        assert_eq!(first.to_string(), second.to_string());
        assert!(!std::ptr::eq(first.segments(), second.segments()));

        let deeper = first.at("42");
        assert_eq!(first.segments(), ["users"]);
        assert_eq!(deeper.segments(), ["users", "42"]);
        assert!(api.segments().is_empty());
    }

    #[tokio::test]
    async fn test_rendering_does_not_consume_the_verb() {
        let recorder = Recorder::default();
        let api = Descriptor::new(&recorder);
        let post = api.at("users").at("post");
        assert_eq!(post.to_string(), "POST /users");
        assert_eq!(post.to_string(), "POST /users");

        post.call().await.unwrap();
        let (method, url, _) = recorder.last();
        assert_eq!((method.as_str(), url.as_str()), ("POST", "/users"));
    }

    #[tokio::test]
    async fn test_call_attaches_body_under_default_option() {
        let recorder = Recorder::default();
        let api = Descriptor::new(&recorder);
        api.at("a")
            .at("b")
            .at("c")
            .at("post")
            .call()
            .body(json!({"test": "ok"}))
            .await
            .unwrap();
        assert_eq!(
            recorder.last(),
            (
                "POST".to_string(),
                "/a/b/c".to_string(),
                json!({"json": {"test": "ok"}})
            )
        );
    }

    #[tokio::test]
    async fn test_call_keeps_explicit_body_option() {
        let recorder = Recorder::default();
        let api = Descriptor::new(&recorder);
        api.at("users")
            .at(42)
            .at("put")
            .call()
            .option("data", json!({"login": "updated"}))
            .body(json!({"ignored": true}))
            .await
            .unwrap();
        assert_eq!(
            recorder.last(),
            (
                "PUT".to_string(),
                "/users/42".to_string(),
                json!({"data": {"login": "updated"}})
            )
        );
    }

    #[tokio::test]
    async fn test_call_with_method_override() {
        let recorder = Recorder::default();
        let api = Descriptor::new(&recorder);
        api.at("users")
            .at(42)
            .at("put")
            .call()
            .method("POST")
            .option("data", json!({"login": "updated"}))
            .await
            .unwrap();
        let (method, url, _) = recorder.last();
        assert_eq!((method.as_str(), url.as_str()), ("POST", "/users/42/put"));
    }

    #[tokio::test]
    async fn test_call_builds_nested_options() {
        let recorder = Recorder::default();
        let api = Descriptor::new(&recorder);
        api.at("search")
            .call()
            .header("X-Trace", "abc")
            .query("q", "rust")
            .query("page", 2)
            .raise_for_status(false)
            .await
            .unwrap();
        let (_, _, options) = recorder.last();
        assert_eq!(
            options,
            json!({
                "headers": {"X-Trace": "abc"},
                "params": {"q": "rust", "page": 2},
                "raise_for_status": false
            })
        );
    }

    #[test]
    fn test_null_body_is_not_attached() {
        let recorder = Recorder::default();
        let api = Descriptor::new(&recorder);
        let (_, _, options) = api.at("ping").call().body(Value::Null).prepare();
        assert!(options.is_empty());
    }
}
