//! Application services for plugin lifecycle orchestration.

mod catalog;
mod context;
mod installer;
mod lifecycle;
mod registry;
mod slots;

pub use catalog::{
    CachedCatalog, CachedCatalogError, CachedCatalogResult, CatalogListing, CatalogLookup,
};
pub use context::PluginHostContext;
pub use installer::{ArchiveInstaller, InstallerError, InstallerResult};
pub use lifecycle::{
    BootReport, DiscoveredPlugin, Discovery, LifecycleError, LifecycleManager, LifecycleResult,
    SkippedPlugin,
};
pub use registry::{DependencyRegistry, RegistryError, RegistryResult};
pub use slots::{
    AdminMenuGroup, PLUGIN_MANAGEMENT_ENDPOINT, PLUGIN_MANAGEMENT_PERMISSION, RenderedSlotItem,
    UiSlotComposer,
};
