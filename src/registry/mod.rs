//! Backend registry
//!
//! Maps backend names to constructors. The registry holds every backend that
//! was compiled in (see the crate features); clients consult it when no
//! backend instance is given. Registering a name that already exists replaces
//! the earlier entry in place, so priority order is kept.

use std::sync::{Arc, OnceLock, RwLock};

use crate::backend::{Backend, BackendConfig, BackendType};
use crate::error::ApiError;

/// Constructor stored for each backend.
pub type BackendFactory = fn(BackendConfig) -> Result<Arc<dyn Backend>, ApiError>;

/// A registered backend.
#[derive(Clone, Copy)]
pub struct BackendEntry {
    pub name: &'static str,
    pub supports_uds: bool,
    pub factory: BackendFactory,
}

impl BackendEntry {
    /// Entry for a [`BackendType`].
    pub fn of<T: BackendType>() -> Self {
        Self {
            name: T::NAME,
            supports_uds: T::SUPPORTS_UDS,
            factory: |config| T::from_config(config).map(|backend| Arc::new(backend) as Arc<dyn Backend>),
        }
    }

    pub fn build(&self, config: BackendConfig) -> Result<Arc<dyn Backend>, ApiError> {
        (self.factory)(config)
    }
}

impl std::fmt::Debug for BackendEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendEntry")
            .field("name", &self.name)
            .field("supports_uds", &self.supports_uds)
            .finish()
    }
}

/// Ordered set of backends, first registered first chosen.
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    entries: Vec<BackendEntry>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the backends enabled at compile time.
    pub fn with_builtin() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "reqwest")]
        registry.register_type::<crate::backend::ReqwestBackend>();
        #[cfg(feature = "hyper")]
        registry.register_type::<crate::backend::HyperBackend>();
        registry
    }

    pub fn register(&mut self, entry: BackendEntry) {
        tracing::debug!(target: "apiclient::registry", backend = entry.name, supports_uds = entry.supports_uds, "backend registered");
        match self.entries.iter_mut().find(|existing| existing.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn register_type<T: BackendType>(&mut self) {
        self.register(BackendEntry::of::<T>());
    }

    pub fn get(&self, name: &str) -> Option<BackendEntry> {
        self.entries.iter().find(|entry| entry.name == name).copied()
    }

    /// Registered names in priority order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pick a backend by name, or the first one able to serve the request.
    pub fn resolve(&self, name: Option<&str>, needs_uds: bool) -> Result<BackendEntry, ApiError> {
        let entry = match name {
            Some(name) => self.get(name).ok_or_else(|| {
                ApiError::ConfigurationError(format!(
                    "Unknown backend '{name}', available: [{}]",
                    self.names().join(", ")
                ))
            })?,
            None => {
                if self.is_empty() {
                    return Err(ApiError::ConfigurationError(
                        "No HTTP backend is available, enable the `reqwest` or `hyper` feature or register one".into(),
                    ));
                }
                self.entries
                    .iter()
                    .find(|entry| !needs_uds || entry.supports_uds)
                    .copied()
                    .ok_or_else(|| {
                        ApiError::ConfigurationError(format!(
                            "No registered backend supports unix sockets, available: [{}]",
                            self.names().join(", ")
                        ))
                    })?
            }
        };
        tracing::debug!(target: "apiclient::registry", backend = entry.name, "backend resolved");
        Ok(entry)
    }
}

static GLOBAL: OnceLock<RwLock<BackendRegistry>> = OnceLock::new();

fn global() -> &'static RwLock<BackendRegistry> {
    GLOBAL.get_or_init(|| RwLock::new(BackendRegistry::with_builtin()))
}

/// A copy of the process-wide registry.
pub fn global_registry() -> BackendRegistry {
    match global().read() {
        Ok(registry) => registry.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Add a backend to the process-wide registry.
pub fn register_backend<T: BackendType>() {
    let mut registry = match global().write() {
        Ok(registry) => registry,
        Err(poisoned) => poisoned.into_inner(),
    };
    registry.register_type::<T>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendRequest;
    use crate::types::ApiResponse;
    use async_trait::async_trait;
    use serde_json::Value;

    struct Echo;

    #[async_trait]
    impl Backend for Echo {
        fn name(&self) -> &'static str {
            Self::NAME
        }

        async fn request(&self, request: BackendRequest) -> Result<ApiResponse, ApiError> {
            Ok(ApiResponse::Text(request.url))
        }
    }

    impl BackendType for Echo {
        const NAME: &'static str = "echo";

        fn from_config(_config: BackendConfig) -> Result<Self, ApiError> {
            Ok(Self)
        }
    }

    struct Socketed;

    #[async_trait]
    impl Backend for Socketed {
        fn name(&self) -> &'static str {
            Self::NAME
        }

        async fn request(&self, _request: BackendRequest) -> Result<ApiResponse, ApiError> {
            Ok(ApiResponse::Json(Value::Null))
        }
    }

    impl BackendType for Socketed {
        const NAME: &'static str = "socketed";
        const SUPPORTS_UDS: bool = true;

        fn from_config(_config: BackendConfig) -> Result<Self, ApiError> {
            Ok(Self)
        }
    }

    #[test]
    fn test_empty_registry_is_configuration_error() {
        let registry = BackendRegistry::new();
        assert!(registry.is_empty());
        let err = registry.resolve(None, false).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_first_registered_wins() {
        let mut registry = BackendRegistry::new();
        registry.register_type::<Echo>();
        registry.register_type::<Socketed>();
        assert_eq!(registry.names(), vec!["echo", "socketed"]);
        assert_eq!(registry.resolve(None, false).unwrap().name, "echo");
        assert_eq!(registry.resolve(Some("socketed"), false).unwrap().name, "socketed");
    }

    #[test]
    fn test_uds_picks_capable_backend() {
        let mut registry = BackendRegistry::new();
        registry.register_type::<Echo>();
        assert!(registry.resolve(None, true).unwrap_err().is_configuration_error());

        registry.register_type::<Socketed>();
        assert_eq!(registry.resolve(None, true).unwrap().name, "socketed");
    }

    #[test]
    fn test_reregistering_keeps_position() {
        let mut registry = BackendRegistry::new();
        registry.register_type::<Echo>();
        registry.register_type::<Socketed>();
        registry.register_type::<Echo>();
        assert_eq!(registry.names(), vec!["echo", "socketed"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_backend_name() {
        let registry = BackendRegistry::new();
        let err = registry.resolve(Some("curl"), false).unwrap_err();
        assert!(err.to_string().contains("Unknown backend 'curl'"));
    }

    #[test]
    fn test_entry_builds_backend() {
        let backend = BackendEntry::of::<Echo>().build(BackendConfig::default()).unwrap();
        assert_eq!(backend.name(), "echo");
        let res = tokio_test::block_on(backend.request(BackendRequest {
            method: "GET".into(),
            url: "http://x/y".into(),
            flags: Default::default(),
            options: Default::default(),
        }))
        .unwrap();
        assert_eq!(res.as_text(), Some("http://x/y"));
    }

    #[cfg(all(feature = "reqwest", feature = "hyper"))]
    #[test]
    fn test_builtin_order() {
        let registry = BackendRegistry::with_builtin();
        assert_eq!(registry.names(), vec!["reqwest", "hyper"]);
        assert_eq!(registry.resolve(None, false).unwrap().name, "reqwest");
        #[cfg(unix)]
        assert_eq!(registry.resolve(None, true).unwrap().name, "hyper");
    }

    #[test]
    fn test_global_registration() {
        register_backend::<Echo>();
        assert!(global_registry().get("echo").is_some());
    }
}
