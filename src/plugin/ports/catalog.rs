//! Remote plugin catalog port.

use crate::plugin::domain::{
    CatalogCategory, CatalogEntry, CatalogProfile, LicenceRecord, PluginArchive, PluginId,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for catalog calls.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Contract for the remote service listing distributable plugins.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Lists every plugin visible to the caller.
    async fn list_plugins(&self) -> CatalogResult<Vec<CatalogEntry>>;

    /// Fetches one plugin, `None` when the catalog does not list it.
    async fn get_plugin(&self, plugin_id: &PluginId) -> CatalogResult<Option<CatalogEntry>>;

    /// Downloads the plugin's archive. Requires a licence.
    async fn download_archive(&self, plugin_id: &PluginId) -> CatalogResult<PluginArchive>;

    /// Lists catalog categories.
    async fn list_categories(&self) -> CatalogResult<Vec<CatalogCategory>>;

    /// Lists licences held by this installation.
    async fn own_licences(&self) -> CatalogResult<Vec<LicenceRecord>>;

    /// Returns this installation's catalog profile.
    async fn own_profile(&self) -> CatalogResult<CatalogProfile>;
}

/// Errors returned by catalog adapters.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// The catalog could not be reached at all.
    #[error("plugin catalog is unreachable: {0}")]
    Unreachable(String),

    /// The catalog rejected the API key.
    #[error("plugin catalog rejected the configured credentials")]
    Unauthorized,

    /// The caller holds no licence for the plugin.
    #[error("no licence to download plugin {0}")]
    LicenceRequired(PluginId),

    /// The catalog does not know the plugin.
    #[error("plugin {0} is not listed in the catalog")]
    NotFound(PluginId),

    /// The catalog answered with something this client cannot interpret.
    #[error("unexpected catalog response: {0}")]
    Protocol(Arc<dyn std::error::Error + Send + Sync>),
}

impl CatalogError {
    /// Wraps a response decoding or protocol failure.
    pub fn protocol(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Protocol(Arc::new(err))
    }

    /// Returns whether the failure means the catalog is offline.
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}
