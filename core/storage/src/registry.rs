//! Backend registry for provider resolution.
//!
//! Built once at process start and injected into the facade; backends are
//! constructed (and their credentials validated) a single time rather than
//! per call.

use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::{ProviderKind, SecureStorageProvider};
use selladoc_common::{Error, Result};

/// Registry of constructed storage backends.
pub struct BackendRegistry {
    providers: HashMap<ProviderKind, Arc<dyn SecureStorageProvider>>,
    default_kind: ProviderKind,
}

impl BackendRegistry {
    /// Create an empty registry with the given default backend kind.
    pub fn new(default_kind: ProviderKind) -> Self {
        Self {
            providers: HashMap::new(),
            default_kind,
        }
    }

    /// Register a backend under its own kind.
    ///
    /// # Errors
    /// - Returns error if the kind is already registered
    pub fn register(&mut self, provider: Arc<dyn SecureStorageProvider>) -> Result<()> {
        let kind = provider.kind();
        if self.providers.contains_key(&kind) {
            return Err(Error::AlreadyExists(format!(
                "Backend '{}' is already registered",
                kind
            )));
        }
        self.providers.insert(kind, provider);
        Ok(())
    }

    /// Resolve a backend by kind.
    ///
    /// Used whenever a storage record pins a provider; this path never falls
    /// back to another backend, since retrieving with the wrong backend
    /// would corrupt results.
    ///
    /// # Errors
    /// - `Configuration` if no backend of that kind is registered
    pub fn resolve(&self, kind: ProviderKind) -> Result<Arc<dyn SecureStorageProvider>> {
        self.providers.get(&kind).cloned().ok_or_else(|| {
            Error::Configuration(format!("Backend '{}' is not registered", kind))
        })
    }

    /// Resolve the default backend.
    pub fn default_provider(&self) -> Result<Arc<dyn SecureStorageProvider>> {
        self.resolve(self.default_kind)
    }

    /// The kind used when no explicit backend is requested.
    pub fn default_kind(&self) -> ProviderKind {
        self.default_kind
    }

    /// Registered backend kinds.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        self.providers.keys().copied().collect()
    }

    /// Check whether a backend kind is registered.
    pub fn has(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }
}
