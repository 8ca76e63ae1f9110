//! In-memory plugin state store.

use crate::plugin::{
    domain::{ActivationRecord, CatalogCacheEntry, PluginId, StatusFlag},
    ports::{
        ActivationRepository, CatalogCacheRepository, PluginStoreError, PluginStoreResult,
        StatusFlagRepository,
    },
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe in-memory store for activation records, status flags, and
/// the catalog cache.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPluginStore {
    state: Arc<RwLock<InMemoryStoreState>>,
}

#[derive(Debug, Default)]
struct InMemoryStoreState {
    activations: BTreeMap<PluginId, ActivationRecord>,
    flags: HashMap<String, StatusFlag>,
    cache: BTreeMap<PluginId, CatalogCacheEntry>,
}

impl InMemoryPluginStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> PluginStoreResult<RwLockReadGuard<'_, InMemoryStoreState>> {
        self.state
            .read()
            .map_err(|err| PluginStoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> PluginStoreResult<RwLockWriteGuard<'_, InMemoryStoreState>> {
        self.state
            .write()
            .map_err(|err| PluginStoreError::persistence(std::io::Error::other(err.to_string())))
    }
}

#[async_trait]
impl ActivationRepository for InMemoryPluginStore {
    async fn find_activation(
        &self,
        plugin_id: &PluginId,
    ) -> PluginStoreResult<Option<ActivationRecord>> {
        Ok(self.read()?.activations.get(plugin_id).cloned())
    }

    async fn upsert_activation(&self, record: &ActivationRecord) -> PluginStoreResult<()> {
        self.write()?
            .activations
            .insert(record.plugin_id().clone(), record.clone());
        Ok(())
    }

    async fn list_active(&self) -> PluginStoreResult<Vec<ActivationRecord>> {
        Ok(self
            .read()?
            .activations
            .values()
            .filter(|record| record.is_active())
            .cloned()
            .collect())
    }

    async fn list_activations(&self) -> PluginStoreResult<Vec<ActivationRecord>> {
        Ok(self.read()?.activations.values().cloned().collect())
    }
}

#[async_trait]
impl StatusFlagRepository for InMemoryPluginStore {
    async fn get_flag(&self, key: &str) -> PluginStoreResult<Option<StatusFlag>> {
        Ok(self.read()?.flags.get(key).cloned())
    }

    async fn set_flag(&self, flag: &StatusFlag) -> PluginStoreResult<()> {
        self.write()?.flags.insert(flag.key.clone(), flag.clone());
        Ok(())
    }

    async fn delete_flag(&self, key: &str) -> PluginStoreResult<bool> {
        Ok(self.write()?.flags.remove(key).is_some())
    }
}

#[async_trait]
impl CatalogCacheRepository for InMemoryPluginStore {
    async fn find_cache_entry(
        &self,
        plugin_id: &PluginId,
    ) -> PluginStoreResult<Option<CatalogCacheEntry>> {
        Ok(self.read()?.cache.get(plugin_id).cloned())
    }

    async fn upsert_cache_entry(&self, entry: &CatalogCacheEntry) -> PluginStoreResult<()> {
        self.write()?
            .cache
            .insert(entry.plugin_id.clone(), entry.clone());
        Ok(())
    }

    async fn delete_cache_entry(&self, plugin_id: &PluginId) -> PluginStoreResult<bool> {
        Ok(self.write()?.cache.remove(plugin_id).is_some())
    }
}
