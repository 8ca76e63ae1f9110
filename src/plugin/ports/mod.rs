//! Port contracts for plugin lifecycle orchestration.

mod catalog;
mod host;
mod repository;

pub use catalog::{CatalogClient, CatalogError, CatalogResult};
pub use host::{HostApp, HostError, HostResult, RouteResolver};
pub use repository::{
    ActivationRepository, CatalogCacheRepository, PluginStore, PluginStoreError,
    PluginStoreResult, StatusFlagRepository,
};
