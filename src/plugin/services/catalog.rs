//! Offline-tolerant access to the remote catalog.
//!
//! Provides [`CachedCatalog`], which downgrades an unreachable catalog to an
//! empty listing plus a reachability flag, and keeps per-plugin presentation
//! rows cached for installed plugins so they can still be described offline.

use crate::plugin::{
    domain::{CatalogCacheEntry, CatalogEntry, CatalogPresentation, PluginId},
    ports::{CatalogCacheRepository, CatalogClient, CatalogError, PluginStoreError},
};
use mockable::Clock;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by [`CachedCatalog`].
#[derive(Debug, Clone, Error)]
pub enum CachedCatalogError {
    /// The catalog answered with an error other than being unreachable.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// The cache table could not be read or written.
    #[error(transparent)]
    Store(#[from] PluginStoreError),
}

/// Result type for cached catalog operations.
pub type CachedCatalogResult<T> = Result<T, CachedCatalogError>;

/// A catalog listing together with whether the catalog answered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogListing {
    /// Whether the catalog was reachable.
    pub reachable: bool,
    /// Listed plugins, empty when unreachable.
    pub entries: Vec<CatalogEntry>,
}

impl CatalogListing {
    /// Returns the listed entry for `plugin_id`.
    #[must_use]
    pub fn entry(&self, plugin_id: &PluginId) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| &entry.id == plugin_id)
    }
}

/// Result of looking up a single plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogLookup {
    /// The catalog answered; `None` means it does not list the plugin.
    Online(Option<CatalogEntry>),
    /// The catalog could not be reached.
    Offline,
}

/// Catalog client wrapped with the presentation cache policy.
#[derive(Clone)]
pub struct CachedCatalog<C, S, K>
where
    C: CatalogClient,
    S: CatalogCacheRepository,
    K: Clock + Send + Sync,
{
    client: Arc<C>,
    store: Arc<S>,
    clock: Arc<K>,
}

impl<C, S, K> CachedCatalog<C, S, K>
where
    C: CatalogClient,
    S: CatalogCacheRepository,
    K: Clock + Send + Sync,
{
    /// Creates the cached catalog.
    #[must_use]
    pub const fn new(client: Arc<C>, store: Arc<S>, clock: Arc<K>) -> Self {
        Self {
            client,
            store,
            clock,
        }
    }

    /// Returns the wrapped catalog client.
    #[must_use]
    pub const fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Fetches the listing, downgrading an unreachable catalog to an empty
    /// offline listing.
    ///
    /// # Errors
    ///
    /// Returns [`CachedCatalogError::Catalog`] for catalog failures other than
    /// being unreachable.
    pub async fn listing(&self) -> CachedCatalogResult<CatalogListing> {
        match self.client.list_plugins().await {
            Ok(entries) => Ok(CatalogListing {
                reachable: true,
                entries,
            }),
            Err(err) if err.is_unreachable() => {
                tracing::warn!(error = %err, "plugin catalog unreachable; using cached metadata");
                Ok(CatalogListing::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Looks up one plugin.
    ///
    /// # Errors
    ///
    /// Returns [`CachedCatalogError::Catalog`] for catalog failures other than
    /// being unreachable.
    pub async fn lookup(&self, plugin_id: &PluginId) -> CachedCatalogResult<CatalogLookup> {
        match self.client.get_plugin(plugin_id).await {
            Ok(entry) => Ok(CatalogLookup::Online(entry)),
            Err(err) if err.is_unreachable() => {
                tracing::warn!(%plugin_id, error = %err, "plugin catalog unreachable");
                Ok(CatalogLookup::Offline)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Refreshes cache rows from a reachable listing, for installed plugins
    /// only. Offline listings change nothing. Returns the refreshed ids.
    ///
    /// # Errors
    ///
    /// Returns [`CachedCatalogError::Store`] when a cache row cannot be
    /// written.
    pub async fn refresh(
        &self,
        listing: &CatalogListing,
        installed: &BTreeSet<PluginId>,
    ) -> CachedCatalogResult<Vec<PluginId>> {
        if !listing.reachable {
            return Ok(Vec::new());
        }
        let cached_at = self.clock.utc();
        let mut refreshed = Vec::new();
        for entry in listing
            .entries
            .iter()
            .filter(|entry| installed.contains(&entry.id))
        {
            self.store
                .upsert_cache_entry(&CatalogCacheEntry {
                    plugin_id: entry.id.clone(),
                    presentation: entry.presentation.clone(),
                    cached_at,
                })
                .await?;
            refreshed.push(entry.id.clone());
        }
        tracing::debug!(count = refreshed.len(), "refreshed plugin catalog cache");
        Ok(refreshed)
    }

    /// Caches a single entry fetched from a reachable catalog, for a plugin
    /// that has just been installed.
    ///
    /// # Errors
    ///
    /// Returns [`CachedCatalogError::Store`] when the row cannot be written.
    pub async fn remember(&self, entry: &CatalogEntry) -> CachedCatalogResult<()> {
        self.store
            .upsert_cache_entry(&CatalogCacheEntry {
                plugin_id: entry.id.clone(),
                presentation: entry.presentation.clone(),
                cached_at: self.clock.utc(),
            })
            .await?;
        Ok(())
    }

    /// Returns the cached presentation for a plugin, or the default when no
    /// row exists.
    ///
    /// # Errors
    ///
    /// Returns [`CachedCatalogError::Store`] when the cache cannot be read.
    pub async fn cached_presentation(
        &self,
        plugin_id: &PluginId,
    ) -> CachedCatalogResult<CatalogPresentation> {
        Ok(self
            .store
            .find_cache_entry(plugin_id)
            .await?
            .map(|entry| entry.presentation)
            .unwrap_or_default())
    }

    /// Drops the cache row of a plugin that is no longer installed.
    ///
    /// # Errors
    ///
    /// Returns [`CachedCatalogError::Store`] when the row cannot be deleted.
    pub async fn forget(&self, plugin_id: &PluginId) -> CachedCatalogResult<bool> {
        Ok(self.store.delete_cache_entry(plugin_id).await?)
    }
}
