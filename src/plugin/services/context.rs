//! Boot-time wiring for the plugin subsystem.
//!
//! [`PluginHostContext`] is built once at startup and hands the catalog
//! client, plugin store, clock, and install paths to every service that needs
//! them.

use crate::config::PluginHostConfig;
use crate::plugin::{
    ports::{CatalogClient, PluginStore},
    services::{
        catalog::CachedCatalog, installer::ArchiveInstaller, lifecycle::LifecycleManager,
    },
    units::PluginUnits,
};
use mockable::Clock;
use std::sync::Arc;

/// Shared collaborators of the plugin services.
pub struct PluginHostContext<S, C, K>
where
    S: PluginStore,
    C: CatalogClient,
    K: Clock + Send + Sync,
{
    config: PluginHostConfig,
    store: Arc<S>,
    catalog: Arc<C>,
    clock: Arc<K>,
    units: PluginUnits,
}

impl<S, C, K> PluginHostContext<S, C, K>
where
    S: PluginStore,
    C: CatalogClient,
    K: Clock + Send + Sync,
{
    /// Creates a context with no plugin units registered.
    #[must_use]
    pub fn new(config: PluginHostConfig, store: Arc<S>, catalog: Arc<C>, clock: Arc<K>) -> Self {
        Self {
            config,
            store,
            catalog,
            clock,
            units: PluginUnits::new(),
        }
    }

    /// Sets the units compiled into this host.
    #[must_use]
    pub fn with_units(mut self, units: PluginUnits) -> Self {
        self.units = units;
        self
    }

    /// Returns the host configuration.
    #[must_use]
    pub const fn config(&self) -> &PluginHostConfig {
        &self.config
    }

    /// Returns the plugin store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the catalog client.
    #[must_use]
    pub const fn catalog(&self) -> &Arc<C> {
        &self.catalog
    }

    /// Returns the plugin units.
    #[must_use]
    pub const fn units(&self) -> &PluginUnits {
        &self.units
    }

    /// Builds an installer over the configured roots.
    #[must_use]
    pub fn installer(&self) -> ArchiveInstaller<C> {
        ArchiveInstaller::from_config(Arc::clone(&self.catalog), &self.config)
    }

    /// Builds the cached catalog view.
    #[must_use]
    pub fn cached_catalog(&self) -> CachedCatalog<C, S, K> {
        CachedCatalog::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
        )
    }

    /// Builds the lifecycle manager.
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleManager<S, C, K> {
        LifecycleManager::new(
            Arc::clone(&self.store),
            Arc::clone(&self.catalog),
            Arc::clone(&self.clock),
            self.installer(),
            self.units.clone(),
        )
    }
}
