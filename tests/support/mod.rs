//! In-memory backend that records every request it receives.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use apiclient::prelude::*;
use async_trait::async_trait;
use serde_json::{Value, json};

#[derive(Default)]
pub struct RecordingBackend {
    requests: Mutex<Vec<BackendRequest>>,
    config: Option<BackendConfig>,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> BackendRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request recorded")
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn request(&self, request: BackendRequest) -> Result<ApiResponse, ApiError> {
        let echo = json!({
            "method": request.method,
            "url": request.url,
            "uds": self.config.as_ref().and_then(|c| c.uds.as_ref()).map(|p| p.display().to_string()),
        });
        self.requests.lock().unwrap().push(request);
        Ok(ApiResponse::Json(echo))
    }
}

impl BackendType for RecordingBackend {
    const NAME: &'static str = "recording";
    const SUPPORTS_UDS: bool = true;

    fn from_config(config: BackendConfig) -> Result<Self, ApiError> {
        Ok(Self {
            requests: Mutex::new(Vec::new()),
            config: Some(config),
        })
    }
}

/// Client rooted at `root` sending through `backend`.
pub fn client_with(backend: &Arc<RecordingBackend>, root: &str) -> ClientBuilder {
    Client::builder()
        .root(root)
        .backend_instance(backend.clone())
}

pub fn options(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        other => panic!("options must be an object, got {other}"),
    }
}
