//! # apiclient - a descriptor-driven client for HTTP APIs
//!
//! Build request paths fluently, send them through a middleware chain and
//! let a pluggable backend do the transport.
//!
#![deny(unsafe_code)]

//! ## Features
//!
//! - **Path descriptors**: `api.at("users").at(42).at("delete")` resolves to
//!   `DELETE /users/42`; a trailing HTTP verb segment picks the method.
//! - **Default options**: client-level headers, params and timeouts are merged
//!   into every call, nested objects key by key.
//! - **Middlewares**: async transforms over `(method, url, options)`, most
//!   recently registered first.
//! - **Pluggable backends**: `reqwest` and `hyper` (with unix socket support)
//!   are compiled behind features and registered automatically.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use apiclient::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ApiError> {
//!     let client = Client::builder()
//!         .root("https://api.github.com")
//!         .header("Accept", "application/vnd.github+json")
//!         .build()?;
//!
//!     client.middleware(HeaderMiddleware::bearer("token"));
//!
//!     let repos = client.api().at("users").at("octocat").at("repos").call().await?;
//!     println!("{:?}", repos.as_json());
//!
//!     let created = client
//!         .api()
//!         .at("user")
//!         .at("repos")
//!         .at("post")
//!         .call()
//!         .body(json!({"name": "hello-world"}))
//!         .await?;
//!     println!("{:?}", created.as_json());
//!
//!     client.shutdown().await
//! }
//! ```

pub mod backend;
pub mod client;
pub mod defaults;
pub mod descriptor;
pub mod error;
pub mod middleware;
pub mod prelude;
pub mod registry;
pub mod types;

pub use backend::{Backend, BackendConfig, BackendRequest, BackendType};
pub use client::{BackendSelector, Client, ClientBuilder, ClientConfig};
pub use descriptor::{Call, Descriptor, Dispatch};
pub use error::ApiError;
pub use middleware::{Middleware, RequestParts};
pub use registry::{BackendEntry, BackendRegistry, global_registry, register_backend};
pub use types::{ApiResponse, LiveResponse, Options, RawResponse, ResponseFlags};

/// The error kind every backend reports, whichever is active.
pub type Error = ApiError;

/// Result alias used throughout the crate.
pub type Result<T, E = ApiError> = std::result::Result<T, E>;
