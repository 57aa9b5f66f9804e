//! Routes model profiles to backends.
//!
//! Pure routing: the router never retries and never invokes a backend.

use crate::agent::ModelProfile;
use crate::core::{Address, Error, Result};
use crate::provider::backend::{BackendError, EchoBackend, LlmBackend};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Outcome of building a backend.
pub type BuildResult = std::result::Result<Arc<dyn LlmBackend>, BackendError>;

/// Builds a backend from a profile's provider locator.
pub trait BackendFactory: Send + Sync {
    fn build(&self, profile: &ModelProfile) -> BuildResult;
}

impl<F> BackendFactory for F
where
    F: Fn(&ModelProfile) -> BuildResult + Send + Sync,
{
    fn build(&self, profile: &ModelProfile) -> BuildResult {
        self(profile)
    }
}

/// Model profile to backend routing table.
pub struct ProviderRouter {
    bindings: RwLock<HashMap<Address, Arc<dyn LlmBackend>>>,
    factories: HashMap<String, Arc<dyn BackendFactory>>,
}

impl ProviderRouter {
    /// Router with no bindings and no schemes.
    pub fn empty() -> Self {
        Self {
            bindings: RwLock::new(HashMap::new()),
            factories: HashMap::new(),
        }
    }

    /// Router that understands `echo://` profiles.
    pub fn new() -> Self {
        let mut router = Self::empty();
        let echo: Arc<dyn LlmBackend> = Arc::new(EchoBackend);
        router.register_scheme("echo", move |_: &ModelProfile| -> BuildResult { Ok(echo.clone()) });
        router
    }

    /// Register a factory for provider locators with `scheme`.
    pub fn register_scheme(&mut self, scheme: &str, factory: impl BackendFactory + 'static) {
        self.factories.insert(scheme.to_string(), Arc::new(factory));
    }

    /// Bind a backend to a profile address explicitly.
    pub async fn bind(&self, profile: Address, backend: Arc<dyn LlmBackend>) {
        info!(profile = %profile, backend = backend.name(), "backend bound");
        self.bindings.write().await.insert(profile, backend);
    }

    pub async fn unbind(&self, profile: &Address) -> Option<Arc<dyn LlmBackend>> {
        self.bindings.write().await.remove(profile)
    }

    /// Build and bind a backend from the profile's provider locator scheme.
    pub async fn bind_profile(&self, profile: &ModelProfile) -> Result<Arc<dyn LlmBackend>> {
        let not_configured = || Error::NoProviderConfigured {
            address: profile.address,
        };
        let scheme = profile.provider_scheme().ok_or_else(not_configured)?;
        let factory = self.factories.get(scheme).ok_or_else(not_configured)?;
        let backend = factory
            .build(profile)
            .map_err(|e| Error::BackendUnavailable {
                address: profile.address,
                reason: e.to_string(),
            })?;
        self.bind(profile.address, backend.clone()).await;
        Ok(backend)
    }

    /// The backend bound to `profile`.
    pub async fn resolve(&self, profile: &Address) -> Result<Arc<dyn LlmBackend>> {
        self.bindings
            .read()
            .await
            .get(profile)
            .cloned()
            .ok_or(Error::NoProviderConfigured { address: *profile })
    }

    /// Resolve an existing binding, building one from the scheme if absent.
    pub async fn resolve_profile(&self, profile: &ModelProfile) -> Result<Arc<dyn LlmBackend>> {
        if let Ok(backend) = self.resolve(&profile.address).await {
            return Ok(backend);
        }
        debug!(profile = %profile.address, uri = %profile.provider_uri, "building backend from scheme");
        self.bind_profile(profile).await
    }

    pub fn schemes(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new()
    }
}
