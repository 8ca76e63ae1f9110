//! Persistence ports for activation records, status flags, and the catalog
//! cache.
//!
//! Writes are plain upserts. Read-modify-write sequences built on these ports
//! (toggling one plugin, appending to a list-valued flag) are last-write-wins
//! when two callers race on the same row.

use crate::plugin::domain::{ActivationRecord, CatalogCacheEntry, PluginId, StatusFlag};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for plugin state persistence.
pub type PluginStoreResult<T> = Result<T, PluginStoreError>;

/// Persistence contract for per-plugin activation records.
#[async_trait]
pub trait ActivationRepository: Send + Sync {
    /// Finds the record for a plugin.
    async fn find_activation(
        &self,
        plugin_id: &PluginId,
    ) -> PluginStoreResult<Option<ActivationRecord>>;

    /// Inserts the record or replaces the existing row for the same plugin.
    async fn upsert_activation(&self, record: &ActivationRecord) -> PluginStoreResult<()>;

    /// Returns records with `is_active = true`, ordered by plugin id.
    async fn list_active(&self) -> PluginStoreResult<Vec<ActivationRecord>>;

    /// Returns every record, ordered by plugin id.
    async fn list_activations(&self) -> PluginStoreResult<Vec<ActivationRecord>>;
}

/// Persistence contract for the generic key/value status-flag table.
#[async_trait]
pub trait StatusFlagRepository: Send + Sync {
    /// Reads a flag.
    async fn get_flag(&self, key: &str) -> PluginStoreResult<Option<StatusFlag>>;

    /// Creates or overwrites a flag.
    async fn set_flag(&self, flag: &StatusFlag) -> PluginStoreResult<()>;

    /// Deletes a flag. Returns whether a row existed.
    async fn delete_flag(&self, key: &str) -> PluginStoreResult<bool>;
}

/// Persistence contract for cached catalog metadata of installed plugins.
#[async_trait]
pub trait CatalogCacheRepository: Send + Sync {
    /// Reads the cached entry for a plugin.
    async fn find_cache_entry(
        &self,
        plugin_id: &PluginId,
    ) -> PluginStoreResult<Option<CatalogCacheEntry>>;

    /// Creates or refreshes a cached entry.
    async fn upsert_cache_entry(&self, entry: &CatalogCacheEntry) -> PluginStoreResult<()>;

    /// Deletes the cached entry for a plugin. Returns whether a row existed.
    async fn delete_cache_entry(&self, plugin_id: &PluginId) -> PluginStoreResult<bool>;
}

/// Every persisted table owned by the plugin lifecycle.
pub trait PluginStore: ActivationRepository + StatusFlagRepository + CatalogCacheRepository {}

impl<T> PluginStore for T where
    T: ActivationRepository + StatusFlagRepository + CatalogCacheRepository
{
}

/// Errors returned by plugin store implementations.
#[derive(Debug, Clone, Error)]
pub enum PluginStoreError {
    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted plugin data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl PluginStoreError {
    /// Wraps persisted-data decoding or validation failures.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
