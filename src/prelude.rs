//! Convenient re-exports for application code.

pub use crate::backend::{Backend, BackendConfig, BackendRequest, BackendType};
pub use crate::client::{Client, ClientBuilder, ClientConfig};
pub use crate::descriptor::{Call, Descriptor, Dispatch};
pub use crate::error::ApiError;
pub use crate::middleware::{HeaderMiddleware, LoggingMiddleware, Middleware, RequestParts};
pub use crate::types::{ApiResponse, LiveResponse, Options, RawResponse, ResponseFlags};

#[cfg(feature = "hyper")]
pub use crate::backend::HyperBackend;
#[cfg(feature = "reqwest")]
pub use crate::backend::ReqwestBackend;
