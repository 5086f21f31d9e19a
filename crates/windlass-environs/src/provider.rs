//! Provider contract and registry

use crate::config::EnvironConfig;
use crate::environ::Environ;
use crate::error::{EnvironError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The backend-specific factory and validator for [`Environ`] handles.
///
/// One stateless value exists per backend kind; it never holds
/// bootstrap state itself.
#[async_trait]
pub trait EnvironProvider: Send + Sync {
    /// The provider type name environments select this backend by.
    fn name(&self) -> &str;

    /// First-time setup for an environment. Backend-generated
    /// attributes are persisted into the returned environ's config so a
    /// later [`EnvironProvider::open`] with that config is equivalent.
    async fn prepare(&self, config: EnvironConfig) -> Result<Arc<dyn Environ>>;

    /// Open an environment whose config has already been through
    /// `prepare`/`validate`.
    async fn open(&self, config: EnvironConfig) -> Result<Arc<dyn Environ>>;

    /// Enforce backend-specific required and immutable attributes,
    /// merging backend defaults. `old` is the previous config when this
    /// is an update rather than a first validation.
    fn validate(
        &self,
        new: &EnvironConfig,
        old: Option<&EnvironConfig>,
    ) -> Result<EnvironConfig>;

    /// A config template for this backend. Pure; no side effects.
    fn boilerplate_config(&self) -> String;

    /// The subset of attributes considered sensitive, all rendered as
    /// strings.
    fn secret_attrs(&self, config: &EnvironConfig) -> Result<BTreeMap<String, String>>;

    /// Best-effort address of the executing host as reachable from
    /// outside the backend.
    async fn public_address(&self) -> Result<String>;

    /// Best-effort address of the executing host on the backend's
    /// internal network.
    async fn private_address(&self) -> Result<String>;
}

/// Address of the executing host, preferring the public source and
/// falling back to the private one when the public source has nothing.
pub async fn self_address(provider: &dyn EnvironProvider) -> Result<String> {
    match provider.public_address().await {
        Ok(addr) if !addr.is_empty() => Ok(addr),
        _ => provider.private_address().await,
    }
}

/// Explicit name-to-provider table, built once at process
/// initialization and passed to whatever drives environments. There is
/// no ambient global registry.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn EnvironProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn EnvironProvider>) -> Result<()> {
        let name = provider.name().to_string();
        if self.providers.contains_key(&name) {
            return Err(EnvironError::DuplicateProvider(name));
        }
        tracing::debug!(provider = %name, "registered environ provider");
        self.providers.insert(name, provider);
        Ok(())
    }

    pub fn provider(&self, type_name: &str) -> Result<Arc<dyn EnvironProvider>> {
        self.providers
            .get(type_name)
            .cloned()
            .ok_or_else(|| EnvironError::UnknownProvider(type_name.to_string()))
    }

    /// Open an environment with the provider its config names.
    pub async fn open(&self, config: EnvironConfig) -> Result<Arc<dyn Environ>> {
        let provider = self.provider(config.provider_type())?;
        provider.open(config).await
    }

    /// Prepare an environment with the provider its config names.
    pub async fn prepare(&self, config: EnvironConfig) -> Result<Arc<dyn Environ>> {
        let provider = self.provider(config.provider_type())?;
        provider.prepare(config).await
    }

    /// Registered provider type names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}
